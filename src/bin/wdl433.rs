//! WDL_433 weather data logger
//!
//! Resolves its parameters (defaults, `WDL_433.ini`, command line, prompts),
//! loads the sensor alias table, opens the SQLite database and then records
//! rtl_433 readings from MQTT until SIGINT or SIGTERM.

use std::process::ExitCode;
use wdl433::ingest::{run_with_reconnect, BrokerConfig, ReadingProcessor};
use wdl433::logging::{apply_verbosity, init_logging};
use wdl433::params::settings::{APP_NAME, APP_VERSION, SEARCH_PATH};
use wdl433::params::{PreScan, Resolver, Settings, Source, TerminalPrompter, PARAMS};
use wdl433::sensor::{bootstrap_aliases, DedupEngine, SensorTree};
use wdl433::store::{RecordWriter, SqliteWriter};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let resolver = match Resolver::new(PARAMS) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = std::env::args().collect();
    let directives = match resolver.prescan(&args) {
        PreScan::Exit(text) => {
            print!("{}", text);
            return ExitCode::SUCCESS;
        }
        PreScan::Proceed(directives) => directives,
    };

    init_logging(directives.debug, directives.resolver_debug);
    log::info!("🚀 {} {}: weather data logger for rtl_433", APP_NAME, APP_VERSION);

    let defaults = Settings::default();
    defaults.log_summary("Operating parameters before config file and command line:");

    let resolution = match resolver.resolve(&args, defaults, &directives, &mut TerminalPrompter) {
        Ok(resolution) => resolution,
        Err(e) => {
            log::error!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };
    let settings = resolution.settings;
    apply_verbosity(settings.debug, settings.resolver_debug);
    settings.log_summary("Operating parameters after config file and command line:");

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    if settings.source != Source::Mqtt {
        let source = settings.source.as_str();
        return Err(format!("source '{}' is not supported, use mqtt", source).into());
    }

    let mut sensors = SensorTree::new();
    bootstrap_aliases(&mut sensors, &settings.alias_file, SEARCH_PATH);

    let db_path = settings.database_path();
    let writer: Box<dyn RecordWriter> = Box::new(SqliteWriter::new(&db_path)?);
    log::info!("📊 Backend: {} ({})", writer.backend_type(), db_path.display());

    let engine = DedupEngine::new(
        sensors,
        settings.duplicate_window(),
        settings.recording_interval(),
    );
    let mut processor = ReadingProcessor::new(engine, writer);

    let broker = BrokerConfig::from(&settings);
    let result = run_with_reconnect(&broker, &mut processor, shutdown_signal()).await;

    let stats = processor.stats();
    log::info!(
        "📈 {} messages: {} recorded, {} duplicates, {} rate limited, {} filtered, {} undecodable",
        stats.received,
        stats.recorded,
        stats.duplicates,
        stats.rate_limited,
        stats.skipped,
        stats.undecodable
    );
    processor.engine().sensors().log_sensors("Sensors seen in this session");

    result?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                log::warn!("SIGTERM handler not installed: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    log::info!("🛑 Shutdown signal received");
}
