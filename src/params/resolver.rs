//! Parameter resolution
//!
//! Merges, in increasing precedence: compiled-in defaults, a config file,
//! the command line, and finally interactive prompts for any required
//! parameter still unset. Each source is gated by the parameter's
//! permissions; a value from a source that may not set it is reported and
//! dropped.
//!
//! Stages, in order:
//! 1. the table and the generated command-line parser are checked row by row
//! 2. a pre-scan of the arguments picks out `--config`, `--debug`,
//!    `--Gdebug`, `--help` and `--version`
//! 3. the config file is located (explicit path or search path) and merged
//! 4. the command line is merged in argument order
//! 5. required parameters that are still unset are prompted for

use crate::params::ini::{self, IniError};
use crate::params::prompt::Prompter;
use crate::params::settings::{Settings, APP_NAME, APP_VERSION, DEFAULT_CONFIG_FILE, SEARCH_PATH};
use crate::params::table::{build_command, find_by_name, usage, ParamSpec, Permissions};
use clap::{ArgMatches, Command};
use std::collections::TryReserveError;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Options acted on during the pre-scan and skipped by the command-line merge
const PRESCAN_OPTIONS: &[&str] = &["config", "debug", "Gdebug", "help", "version"];

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(
        "parameter table and command-line options are misaligned at position {position} \
         (option {option}, parameter {parameter})"
    )]
    Misaligned {
        position: usize,
        option: String,
        parameter: String,
    },
    #[error("out of memory reading config file '{path}': {source}")]
    Capacity {
        path: PathBuf,
        source: TryReserveError,
    },
    #[error("no usable answer for required parameter '{name}': {reason}")]
    Prompt { name: &'static str, reason: String },
}

/// What the pre-scan found
#[derive(Debug, Clone, PartialEq)]
pub enum PreScan {
    /// Help or version was requested: print the text and stop successfully
    Exit(String),
    Proceed(Directives),
}

/// Command-line options that take effect before anything else is merged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    pub config_path: Option<PathBuf>,
    pub debug: bool,
    pub resolver_debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Unset,
    Default,
    File,
    CommandLine,
    Prompt,
}

/// Per-parameter outcome, aligned with the table
#[derive(Debug, Clone, PartialEq)]
pub struct ParamState {
    pub name: &'static str,
    pub permissions: Permissions,
    pub source: ValueSource,
}

impl ParamState {
    pub fn is_set(&self) -> bool {
        self.permissions.contains(Permissions::ALREADY_SET)
    }

    fn mark(&mut self, source: ValueSource) {
        self.permissions.insert(Permissions::ALREADY_SET);
        self.source = source;
    }
}

/// A value that was reported as an error and left unapplied
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub source: ValueSource,
    pub key: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    UnknownKeyword,
    NotPermitted,
    InvalidValue(String),
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub settings: Settings,
    pub states: Vec<ParamState>,
    /// The config file that was merged, if one was found
    pub config_file: Option<PathBuf>,
    pub rejected: Vec<Rejection>,
}

impl Resolution {
    pub fn state(&self, name: &str) -> Option<&ParamState> {
        self.states.iter().find(|s| s.name == name)
    }
}

/// One option occurrence on the command line
#[derive(Debug)]
struct Occurrence {
    index: usize,
    row: usize,
    value: Option<String>,
}

pub struct Resolver<'t> {
    table: &'t [ParamSpec],
    command: Command,
    search_path: String,
    config_name: String,
}

impl<'t> Resolver<'t> {
    pub fn new(table: &'t [ParamSpec]) -> Result<Self, ResolveError> {
        Self::with_command(table, build_command(table))
    }

    /// Use a prebuilt command-line parser; its arguments must follow the table row for row
    pub fn with_command(table: &'t [ParamSpec], command: Command) -> Result<Self, ResolveError> {
        check_alignment(table, &command)?;
        Ok(Self {
            table,
            command,
            search_path: SEARCH_PATH.to_string(),
            config_name: DEFAULT_CONFIG_FILE.to_string(),
        })
    }

    /// Colon-separated directories searched for the default config file
    pub fn search_path(mut self, search_path: impl Into<String>) -> Self {
        self.search_path = search_path.into();
        self
    }

    pub fn config_name(mut self, config_name: impl Into<String>) -> Self {
        self.config_name = config_name.into();
        self
    }

    /// First look at the arguments (`args[0]` is the program name).
    ///
    /// Only the directive options are examined; every other option is left
    /// for [`Resolver::resolve`], and parse errors are left for it to report.
    /// Unrecognised options anywhere on the line are stepped over.
    pub fn prescan(&self, args: &[String]) -> PreScan {
        let matches = match self.lenient_matches(&self.recognised_args(args)) {
            Some(matches) => matches,
            None => return PreScan::Proceed(Directives::default()),
        };

        let mut directives = Directives::default();
        for occurrence in self.occurrences(&matches) {
            match self.table[occurrence.row].name {
                "help" => return PreScan::Exit(usage(self.table)),
                "version" => return PreScan::Exit(format!("{} {}\n", APP_NAME, APP_VERSION)),
                "debug" => directives.debug = true,
                "Gdebug" => directives.resolver_debug = true,
                "config" => directives.config_path = occurrence.value.map(PathBuf::from),
                _ => {}
            }
        }
        log::trace!("Pre-scan found {:?}", directives);
        PreScan::Proceed(directives)
    }

    /// Merge file, command line and prompts over `defaults`.
    pub fn resolve(
        &self,
        args: &[String],
        defaults: Settings,
        directives: &Directives,
        prompter: &mut dyn Prompter,
    ) -> Result<Resolution, ResolveError> {
        let mut settings = defaults;
        let mut states: Vec<ParamState> = self
            .table
            .iter()
            .map(|spec| ParamState {
                name: spec.name,
                permissions: spec.permissions,
                source: if spec.permissions.contains(Permissions::ALREADY_SET) {
                    ValueSource::Default
                } else {
                    ValueSource::Unset
                },
            })
            .collect();

        let mut rejected = Vec::new();
        let config_file = match self.open_config(directives) {
            Some((path, file)) => {
                log::trace!("Using config file {}", path.display());
                self.merge_file(&path, file, &mut settings, &mut states, &mut rejected)?;
                Some(path)
            }
            None => {
                log::trace!("No config file merged");
                None
            }
        };

        self.merge_command_line(args, directives, &mut settings, &mut states, &mut rejected);
        self.complete_required(&mut settings, &mut states, prompter)?;

        Ok(Resolution {
            settings,
            states,
            config_file,
            rejected,
        })
    }

    fn open_config(&self, directives: &Directives) -> Option<(PathBuf, File)> {
        match &directives.config_path {
            Some(path) => match File::open(path) {
                Ok(file) => Some((path.clone(), file)),
                Err(e) => {
                    log::error!("Configuration file '{}' not opened: {}", path.display(), e);
                    None
                }
            },
            None => {
                log::trace!("Searching {} for {}", self.search_path, self.config_name);
                locate_file(&self.config_name, &self.search_path)
            }
        }
    }

    fn merge_file(
        &self,
        path: &Path,
        file: File,
        settings: &mut Settings,
        states: &mut [ParamState],
        rejected: &mut Vec<Rejection>,
    ) -> Result<(), ResolveError> {
        let entries = match ini::parse(BufReader::new(file)) {
            Ok(entries) => entries,
            Err(IniError::Capacity(source)) => {
                return Err(ResolveError::Capacity {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(e) => {
                log::error!("Could not parse config file '{}': {}", path.display(), e);
                return Ok(());
            }
        };

        for entry in entries {
            let key = entry.key.to_lowercase();
            log::trace!("   [{}] {} = {}", entry.section, key, entry.value);

            let Some(row) = find_by_name(self.table, &key) else {
                log::error!("Unrecognized keyword '{}' in config file '{}'", key, path.display());
                rejected.push(Rejection {
                    source: ValueSource::File,
                    key,
                    reason: RejectReason::UnknownKeyword,
                });
                continue;
            };
            let spec = &self.table[row];

            if !states[row].permissions.contains(Permissions::FROM_FILE) {
                log::error!(
                    "Setting '{}' from config file '{}' not permitted",
                    spec.name,
                    path.display()
                );
                rejected.push(Rejection {
                    source: ValueSource::File,
                    key,
                    reason: RejectReason::NotPermitted,
                });
                continue;
            }

            match spec.apply(settings, Some(&entry.value)) {
                Ok(next) => {
                    *settings = next;
                    states[row].mark(ValueSource::File);
                    log::trace!("From config file, set {} to {}", spec.name, entry.value);
                }
                Err(e) => {
                    log::error!(
                        "Invalid value for '{}' in config file '{}': {}",
                        spec.name,
                        path.display(),
                        e
                    );
                    rejected.push(Rejection {
                        source: ValueSource::File,
                        key,
                        reason: RejectReason::InvalidValue(e.to_string()),
                    });
                }
            }
        }
        Ok(())
    }

    fn merge_command_line(
        &self,
        args: &[String],
        directives: &Directives,
        settings: &mut Settings,
        states: &mut [ParamState],
        rejected: &mut Vec<Rejection>,
    ) {
        // Pre-scanned toggles hold over anything the file said
        if let Some(path) = &directives.config_path {
            settings.config_path = Some(path.clone());
        }
        settings.debug |= directives.debug;
        settings.resolver_debug |= directives.resolver_debug;

        let matches = match self.command.clone().try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(e) => {
                let message = e.to_string();
                log::error!(
                    "Command line: {}; options from that point on are ignored",
                    message.lines().next().unwrap_or_default().trim_start_matches("error: ")
                );
                match self.lenient_matches(args) {
                    Some(matches) => matches,
                    None => return,
                }
            }
        };

        for occurrence in self.occurrences(&matches) {
            let spec = &self.table[occurrence.row];
            if PRESCAN_OPTIONS.contains(&spec.name) {
                states[occurrence.row].mark(ValueSource::CommandLine);
                continue;
            }

            if !states[occurrence.row].permissions.contains(Permissions::FROM_CLI) {
                log::error!("Setting '--{}' from command line not permitted", spec.name);
                rejected.push(Rejection {
                    source: ValueSource::CommandLine,
                    key: spec.name.to_string(),
                    reason: RejectReason::NotPermitted,
                });
                continue;
            }

            match spec.apply(settings, occurrence.value.as_deref()) {
                Ok(next) => {
                    *settings = next;
                    states[occurrence.row].mark(ValueSource::CommandLine);
                    log::trace!(
                        "Setting --{} to {} from command line",
                        spec.name,
                        occurrence.value.as_deref().unwrap_or("")
                    );
                }
                Err(e) => {
                    log::error!("Invalid value for '--{}' on command line: {}", spec.name, e);
                    rejected.push(Rejection {
                        source: ValueSource::CommandLine,
                        key: spec.name.to_string(),
                        reason: RejectReason::InvalidValue(e.to_string()),
                    });
                }
            }
        }
    }

    fn complete_required(
        &self,
        settings: &mut Settings,
        states: &mut [ParamState],
        prompter: &mut dyn Prompter,
    ) -> Result<(), ResolveError> {
        for (row, spec) in self.table.iter().enumerate() {
            let state = &mut states[row];
            if !state.permissions.contains(Permissions::REQUIRED) || state.is_set() {
                continue;
            }

            let answer = prompter
                .prompt(spec.description)
                .map_err(|e| ResolveError::Prompt {
                    name: spec.name,
                    reason: e.to_string(),
                })?;
            *settings = spec
                .apply(settings, Some(&answer))
                .map_err(|e| ResolveError::Prompt {
                    name: spec.name,
                    reason: e.to_string(),
                })?;
            state.mark(ValueSource::Prompt);
            log::trace!("Setting {} to {} from prompt", spec.name, answer);
        }
        Ok(())
    }

    /// Parse as far as possible, stopping quietly at the first error
    fn lenient_matches(&self, args: &[String]) -> Option<ArgMatches> {
        self.command
            .clone()
            .ignore_errors(true)
            .try_get_matches_from(args)
            .ok()
    }

    /// `args` with unknown options and stray words removed, getopt style: an
    /// unknown option takes no value, and a known one that takes a value
    /// keeps its argument whether attached or separate.
    fn recognised_args(&self, args: &[String]) -> Vec<String> {
        let mut kept: Vec<String> = args.iter().take(1).cloned().collect();
        let mut rest = args.iter().skip(1);

        while let Some(arg) = rest.next() {
            if arg == "--" {
                break;
            }

            if let Some(long) = arg.strip_prefix("--") {
                let (name, attached) = match long.split_once('=') {
                    Some((name, _)) => (name, true),
                    None => (long, false),
                };
                let Some(spec) = self.table.iter().find(|spec| spec.name == name) else {
                    log::trace!("Pre-scan skips unknown option {}", arg);
                    continue;
                };
                kept.push(arg.clone());
                if spec.kind.takes_value() && !attached {
                    kept.extend(rest.next().cloned());
                }
            } else if let Some(letters) = arg.strip_prefix('-').filter(|l| !l.is_empty()) {
                let mut cluster = String::from("-");
                let mut value_follows = false;
                for (i, letter) in letters.char_indices() {
                    let Some(spec) = self.table.iter().find(|spec| spec.short == letter) else {
                        log::trace!("Pre-scan skips unknown option -{}", letter);
                        continue;
                    };
                    cluster.push(letter);
                    if spec.kind.takes_value() {
                        let value = &letters[i + letter.len_utf8()..];
                        cluster.push_str(value);
                        value_follows = value.is_empty();
                        break;
                    }
                }
                if cluster.len() > 1 {
                    kept.push(cluster);
                    if value_follows {
                        kept.extend(rest.next().cloned());
                    }
                }
            }
        }
        kept
    }

    /// Every recognised option in command-line order
    fn occurrences(&self, matches: &ArgMatches) -> Vec<Occurrence> {
        let mut found = Vec::new();
        for (row, spec) in self.table.iter().enumerate() {
            if spec.kind.takes_value() {
                let values = matches.try_get_many::<String>(spec.name).ok().flatten();
                let indices = matches.indices_of(spec.name);
                if let (Some(values), Some(indices)) = (values, indices) {
                    for (index, value) in indices.zip(values) {
                        found.push(Occurrence {
                            index,
                            row,
                            value: Some(value.clone()),
                        });
                    }
                }
            } else if matches!(matches.try_get_one::<bool>(spec.name), Ok(Some(true))) {
                if let Some(index) = matches.index_of(spec.name) {
                    found.push(Occurrence {
                        index,
                        row,
                        value: None,
                    });
                }
            }
        }
        found.sort_by_key(|o| o.index);
        found
    }
}

/// Walk the table and the parser's arguments in lock-step, comparing short letters
pub fn check_alignment(table: &[ParamSpec], command: &Command) -> Result<(), ResolveError> {
    let options: Vec<_> = command.get_arguments().collect();
    let rows = options.len().max(table.len());

    for position in 0..rows {
        let option = options.get(position).and_then(|arg| arg.get_short());
        let parameter = table.get(position).map(|spec| spec.short);
        if option.is_none() || option != parameter {
            return Err(ResolveError::Misaligned {
                position,
                option: describe_letter(option, options.get(position).map(|a| a.get_id().as_str())),
                parameter: describe_letter(parameter, table.get(position).map(|s| s.name)),
            });
        }
    }
    Ok(())
}

fn describe_letter(letter: Option<char>, name: Option<&str>) -> String {
    match (letter, name) {
        (Some(letter), Some(name)) => format!("-{} --{}", letter, name),
        (None, Some(name)) => format!("--{}", name),
        _ => "<none>".to_string(),
    }
}

/// Find `name` in the first directory of `search_path` where it can be opened.
///
/// `~` expands to `$HOME`; directories that cannot be expanded are skipped.
pub fn locate_file(name: &str, search_path: &str) -> Option<(PathBuf, File)> {
    for dir in search_path.split(':').filter(|d| !d.is_empty()) {
        let Some(dir) = expand_home(dir) else {
            continue;
        };
        let candidate = dir.join(name);
        log::trace!("Try {}", candidate.display());
        if let Ok(file) = File::open(&candidate) {
            if candidate.is_file() {
                return Some((candidate, file));
            }
        }
    }
    None
}

fn expand_home(dir: &str) -> Option<PathBuf> {
    if dir == "~" {
        return std::env::var_os("HOME").map(PathBuf::from);
    }
    match dir.strip_prefix("~/") {
        Some(rest) => std::env::var_os("HOME").map(|home| PathBuf::from(home).join(rest)),
        None => Some(PathBuf::from(dir)),
    }
}
