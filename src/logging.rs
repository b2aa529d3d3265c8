use env_logger::{Env, Target};
use log::LevelFilter;

/// Everything from this crate; dependencies only when they warn
const DEFAULT_FILTER: &str = "wdl433=trace,warn";

/// Install the stderr logger.
///
/// `RUST_LOG` takes full control when set. Otherwise verbosity follows the
/// debug switches and can be raised later with [`apply_verbosity`] once the
/// config file has been read.
pub fn init_logging(debug: bool, resolver_debug: bool) {
    env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .target(Target::Stderr)
        .init();
    apply_verbosity(debug, resolver_debug);
}

pub fn apply_verbosity(debug: bool, resolver_debug: bool) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    log::set_max_level(level_for(debug, resolver_debug));
}

pub fn level_for(debug: bool, resolver_debug: bool) -> LevelFilter {
    if resolver_debug {
        LevelFilter::Trace
    } else if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(false, false), LevelFilter::Info);
        assert_eq!(level_for(true, false), LevelFilter::Debug);
        assert_eq!(level_for(false, true), LevelFilter::Trace);
        assert_eq!(level_for(true, true), LevelFilter::Trace);
    }
}
