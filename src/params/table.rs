//! Parameter table
//!
//! Every operating parameter is described once here: its long name, its
//! short letter, what kind of value it takes (and how that value is parsed
//! into [`Settings`]), who may set it, and its help text. The command-line
//! parser is generated from this table in table order.

use crate::params::settings::{Settings, Source, APP_NAME, APP_VERSION};
use bitflags::bitflags;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use thiserror::Error;

bitflags! {
    /// Who may set a parameter, whether it must end up set, and whether it has been
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        const REQUIRED    = 1 << 0;
        const FROM_FILE   = 1 << 1;
        const FROM_CLI    = 1 << 2;
        const ALREADY_SET = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("'{0}' is not a number")]
    NotNumeric(String),
    #[error("{value} is outside the range {min}..={max}")]
    OutOfRange { value: u64, min: u64, max: u64 },
    #[error("'{value}' is not one of [{expected}]")]
    UnknownChoice { value: String, expected: String },
    #[error("'{0}' is not true/false")]
    NotBoolean(String),
    #[error("a value is required")]
    MissingValue,
}

/// How a parameter's raw text is interpreted.
///
/// Each variant carries a pure setter producing the next `Settings` from the
/// current one and the already-validated value.
#[derive(Clone, Copy)]
pub enum ParamKind {
    Text(fn(Settings, String) -> Settings),
    Integer {
        min: u64,
        max: u64,
        apply: fn(Settings, u64) -> Settings,
    },
    Choice {
        choices: &'static [&'static str],
        apply: fn(Settings, &str) -> Settings,
    },
    Flag(fn(Settings, bool) -> Settings),
    /// Acted on by the resolver itself (help, version); never changes settings
    Directive,
}

impl std::fmt::Debug for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamKind::Text(_) => write!(f, "Text"),
            ParamKind::Integer { min, max, .. } => write!(f, "Integer({}..={})", min, max),
            ParamKind::Choice { choices, .. } => write!(f, "Choice({:?})", choices),
            ParamKind::Flag(_) => write!(f, "Flag"),
            ParamKind::Directive => write!(f, "Directive"),
        }
    }
}

impl ParamKind {
    pub fn takes_value(&self) -> bool {
        matches!(
            self,
            ParamKind::Text(_) | ParamKind::Integer { .. } | ParamKind::Choice { .. }
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub short: char,
    pub kind: ParamKind,
    pub permissions: Permissions,
    pub description: &'static str,
}

impl ParamSpec {
    /// Parse `raw` for this parameter and return the updated settings.
    ///
    /// `raw` is `None` for a command-line flag; a flag given with text (from
    /// the file or a prompt) is read as a boolean, empty meaning true.
    pub fn apply(&self, current: &Settings, raw: Option<&str>) -> Result<Settings, SettingError> {
        let next = current.clone();
        match self.kind {
            ParamKind::Text(apply) => {
                let value = raw.ok_or(SettingError::MissingValue)?;
                Ok(apply(next, value.to_string()))
            }
            ParamKind::Integer { min, max, apply } => {
                let value = raw.ok_or(SettingError::MissingValue)?;
                let number = parse_unsigned(value)?;
                if number < min || number > max {
                    return Err(SettingError::OutOfRange { value: number, min, max });
                }
                Ok(apply(next, number))
            }
            ParamKind::Choice { choices, apply } => {
                let value = raw.ok_or(SettingError::MissingValue)?;
                let choice = choices
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(value))
                    .ok_or_else(|| SettingError::UnknownChoice {
                        value: value.to_string(),
                        expected: choices.join(" | "),
                    })?;
                Ok(apply(next, choice))
            }
            ParamKind::Flag(apply) => {
                let enabled = match raw {
                    None => true,
                    Some(text) => parse_bool(text)?,
                };
                Ok(apply(next, enabled))
            }
            ParamKind::Directive => Ok(next),
        }
    }
}

fn parse_unsigned(value: &str) -> Result<u64, SettingError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SettingError::NotNumeric(value.to_string()));
    }
    value
        .parse::<u64>()
        .map_err(|_| SettingError::NotNumeric(value.to_string()))
}

fn parse_bool(value: &str) -> Result<bool, SettingError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(SettingError::NotBoolean(value.to_string())),
    }
}

fn set_config(s: Settings, v: String) -> Settings {
    Settings { config_path: Some(PathBuf::from(v)), ..s }
}

fn set_host(s: Settings, v: String) -> Settings {
    Settings { host: v, ..s }
}

fn set_port(s: Settings, v: u64) -> Settings {
    // Range checked against the table entry before we get here
    Settings { port: v as u16, ..s }
}

fn set_topic(s: Settings, v: String) -> Settings {
    Settings { topic: v, ..s }
}

fn set_sql3_path(s: Settings, v: String) -> Settings {
    Settings { sql3_path: v, ..s }
}

fn set_sql3_file(s: Settings, v: String) -> Settings {
    Settings { sql3_file: v, ..s }
}

fn set_alias_file(s: Settings, v: String) -> Settings {
    Settings { alias_file: v, ..s }
}

fn set_source(s: Settings, v: &str) -> Settings {
    let source = if v == "http" { Source::Http } else { Source::Mqtt };
    Settings { source, ..s }
}

fn set_interval(s: Settings, v: u64) -> Settings {
    Settings { recording_interval_secs: v, ..s }
}

fn set_dup_window(s: Settings, v: u64) -> Settings {
    Settings { duplicate_window_secs: v, ..s }
}

fn set_debug(s: Settings, v: bool) -> Settings {
    Settings { debug: v, ..s }
}

fn set_resolver_debug(s: Settings, v: bool) -> Settings {
    Settings { resolver_debug: v, ..s }
}

const RQD: Permissions = Permissions::REQUIRED;
const INI: Permissions = Permissions::FROM_FILE;
const CLI: Permissions = Permissions::FROM_CLI;
const SET: Permissions = Permissions::ALREADY_SET;

/// The logger's parameters, in help and command-line order.
///
/// `ALREADY_SET` marks parameters whose compiled-in default is usable.
pub static PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "config",
        short: 'c',
        kind: ParamKind::Text(set_config),
        permissions: CLI,
        description: "Path/name for configuration file",
    },
    ParamSpec {
        name: "host",
        short: 'H',
        kind: ParamKind::Text(set_host),
        permissions: RQD.union(INI).union(CLI),
        description: "Name or IP of MQTT host",
    },
    ParamSpec {
        name: "port",
        short: 'P',
        kind: ParamKind::Integer { min: 1, max: 65_535, apply: set_port },
        permissions: RQD.union(INI).union(CLI).union(SET),
        description: "Port number of MQTT host",
    },
    ParamSpec {
        name: "topic",
        short: 'T',
        kind: ParamKind::Text(set_topic),
        permissions: RQD.union(INI).union(CLI),
        description: "MQTT publisher topic to monitor",
    },
    ParamSpec {
        name: "sql3path",
        short: 'q',
        kind: ParamKind::Text(set_sql3_path),
        permissions: RQD.union(INI).union(CLI).union(SET),
        description: "Path to sqlite3 database file",
    },
    ParamSpec {
        name: "sql3file",
        short: 's',
        kind: ParamKind::Text(set_sql3_file),
        permissions: RQD.union(INI).union(CLI).union(SET),
        description: "Name of sqlite3 database file",
    },
    ParamSpec {
        name: "alias",
        short: 'a',
        kind: ParamKind::Text(set_alias_file),
        permissions: INI.union(CLI).union(SET),
        description: "Path/name of sensor-name alias file",
    },
    ParamSpec {
        name: "source",
        short: 'S',
        kind: ParamKind::Choice { choices: &["mqtt", "http"], apply: set_source },
        permissions: INI.union(CLI).union(SET),
        description: "Source protocol [ mqtt | http ]",
    },
    ParamSpec {
        name: "interval",
        short: 'i',
        kind: ParamKind::Integer { min: 1, max: 86_400, apply: set_interval },
        permissions: INI.union(CLI).union(SET),
        description: "Minimum seconds between stored records per sensor",
    },
    ParamSpec {
        name: "dupwindow",
        short: 'w',
        kind: ParamKind::Integer { min: 0, max: 3_600, apply: set_dup_window },
        permissions: INI.union(CLI).union(SET),
        description: "Seconds within which a repeated reading is a duplicate",
    },
    ParamSpec {
        name: "debug",
        short: 'D',
        kind: ParamKind::Flag(set_debug),
        permissions: INI.union(CLI),
        description: "Print WDL debugging information",
    },
    ParamSpec {
        name: "Gdebug",
        short: 'G',
        kind: ParamKind::Flag(set_resolver_debug),
        permissions: INI.union(CLI),
        description: "Print parameter-resolution debugging information",
    },
    ParamSpec {
        name: "help",
        short: 'h',
        kind: ParamKind::Directive,
        permissions: CLI,
        description: "This help message",
    },
    ParamSpec {
        name: "version",
        short: 'v',
        kind: ParamKind::Directive,
        permissions: CLI,
        description: "Print program version number",
    },
];

/// Case-insensitive lookup by long name
pub fn find_by_name(table: &[ParamSpec], name: &str) -> Option<usize> {
    table.iter().position(|p| p.name.eq_ignore_ascii_case(name))
}

/// Build the command-line parser, one argument per table row in table order.
///
/// clap's own help and version flags are disabled: `-h` and `-v` are rows of
/// the table like everything else.
pub fn build_command(table: &[ParamSpec]) -> Command {
    let mut command = Command::new(APP_NAME)
        .version(APP_VERSION)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .args_override_self(true);

    for spec in table {
        let arg = Arg::new(spec.name)
            .short(spec.short)
            .long(spec.name)
            .help(spec.description);
        let arg = if spec.kind.takes_value() {
            arg.num_args(1).value_name("VALUE").action(ArgAction::Append)
        } else {
            arg.num_args(0).action(ArgAction::SetTrue)
        };
        command = command.arg(arg);
    }

    command
}

/// Help text derived from the table
pub fn usage(table: &[ParamSpec]) -> String {
    let mut text = format!(
        "{} {}: Log weather data from rtl_433 to an SQL database\n",
        APP_NAME, APP_VERSION
    );
    text.push_str(&format!("    Usage: {} [OPTIONS]\n", APP_NAME));
    text.push_str("    [OPTIONS] are any combination of\n");
    text.push_str("    Long form       Short    Option invoked\n");
    for spec in table {
        text.push_str(&format!(
            "    --{:<15}-{}      {}\n",
            spec.name, spec.short, spec.description
        ));
    }
    text
}
