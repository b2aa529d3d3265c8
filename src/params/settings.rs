use chrono::TimeDelta;
use std::path::PathBuf;

pub const APP_NAME: &str = "WDL_433";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directories searched, in order, for the config and alias files
pub const SEARCH_PATH: &str = ".:~:/usr/local/etc:/etc";
pub const DEFAULT_CONFIG_FILE: &str = "WDL_433.ini";
pub const DEFAULT_ALIAS_FILE: &str = "WDL_433.alias";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Mqtt,
    Http,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Mqtt => "mqtt",
            Source::Http => "http",
        }
    }
}

/// Operating parameters for the logger.
///
/// Built from defaults, then rewritten by each resolution stage through the
/// parameter table. Treated as read-only once resolution returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub config_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub sql3_path: String,
    pub sql3_file: String,
    pub alias_file: String,
    pub source: Source,
    /// Seconds between stored records for one sensor
    pub recording_interval_secs: u64,
    /// Seconds within which a repeat of the last reading is a duplicate
    pub duplicate_window_secs: u64,
    pub debug: bool,
    pub resolver_debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: None,
            host: String::new(),
            port: 1883,
            topic: String::new(),
            sql3_path: "/var/databases/".to_string(),
            sql3_file: "Weather.db".to_string(),
            alias_file: DEFAULT_ALIAS_FILE.to_string(),
            source: Source::Mqtt,
            recording_interval_secs: 5 * 60,
            duplicate_window_secs: 2,
            debug: false,
            resolver_debug: false,
        }
    }
}

impl Settings {
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.sql3_path).join(&self.sql3_file)
    }

    pub fn recording_interval(&self) -> TimeDelta {
        TimeDelta::seconds(self.recording_interval_secs as i64)
    }

    pub fn duplicate_window(&self) -> TimeDelta {
        TimeDelta::seconds(self.duplicate_window_secs as i64)
    }

    /// Dump every parameter at debug level
    pub fn log_summary(&self, header: &str) {
        log::debug!("{}", header);
        log::debug!("   ├─ debug    = {}", self.debug);
        log::debug!("   ├─ Gdebug   = {}", self.resolver_debug);
        let config = self.config_path.as_ref().map(|p| p.display().to_string());
        log::debug!("   ├─ config   = {}", config.unwrap_or_default());
        log::debug!("   ├─ alias    = {}", self.alias_file);
        log::debug!("   ├─ source   = {}", self.source.as_str());
        log::debug!("   ├─ host     = {}", self.host);
        log::debug!("   ├─ port     = {}", self.port);
        log::debug!("   ├─ topic    = {}", self.topic);
        log::debug!("   ├─ sql3path = {}", self.sql3_path);
        log::debug!("   ├─ sql3file = {}", self.sql3_file);
        log::debug!("   ├─ interval = {}s", self.recording_interval_secs);
        log::debug!("   └─ dupwindow= {}s", self.duplicate_window_secs);
    }
}
