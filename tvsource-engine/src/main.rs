//! tvsourced: source/signal engine daemon.
//!
//! Runs the engine against the null hardware backend with persisted
//! settings, logging every outbound event, until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use tvsource_engine::config::{load_config, ConfigFile};
use tvsource_engine::database::Database;
use tvsource_engine::logging;
use tvsource_engine::{Devices, LogObserver, SourceEngine};
use tvsource_protocol::SourceInput;

/// tvsourced - TV source/signal engine daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Path to the settings database file
    #[arg(short, long, default_value = "tvsourced.db")]
    database: PathBuf,

    /// Source to select after start (e.g. HDMI1, DTV)
    #[arg(short, long)]
    source: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory where log files are stored
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Number of days to keep log files
    #[arg(long, default_value = "7")]
    log_retention_days: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Explicit path > auto-detect > defaults
    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from("tvsourced.toml");
        default_path.exists().then_some(default_path)
    });
    let file_config = match &config_path {
        Some(path) => match load_config(path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        },
        None => ConfigFile::default(),
    };

    // Command line takes precedence over the file when it differs from its default
    let log_dir = if args.log_dir.to_string_lossy() != "logs" {
        args.log_dir.clone()
    } else {
        PathBuf::from(file_config.logging.log_dir.as_deref().unwrap_or("logs"))
    };
    let log_retention_days = if args.log_retention_days != 7 {
        args.log_retention_days
    } else {
        file_config.logging.retention_days.unwrap_or(7)
    };
    logging::init_logging(
        &log_dir,
        log_retention_days,
        args.verbose,
        file_config.logging.level.as_deref(),
    )?;

    let requested_source = match args.source.as_deref() {
        Some(name) => match SourceInput::from_name(name) {
            Some(source) => Some(source),
            None => {
                error!("Unknown source: {}", name);
                return Err(format!("unknown source: {}", name).into());
            }
        },
        None => None,
    };

    let db_path = file_config
        .database
        .path
        .map(PathBuf::from)
        .unwrap_or(args.database);
    info!("Opening database: {:?}", db_path);
    let db = match Database::open(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let engine = SourceEngine::new(Devices::null(db.clone(), db), file_config.engine);
    engine.set_observer(Some(Arc::new(LogObserver)));

    engine.open()?;
    if let Err(e) = engine.start() {
        warn!("Engine start reported: {}", e);
    }
    if let Some(source) = requested_source {
        if let Err(e) = engine.switch_source(source, source) {
            warn!("Failed to switch to {}: {}", source, e);
        }
    }
    info!(
        "tvsourced running on {} (Ctrl+C to stop)",
        engine.current_source_input()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    engine.stop()?;
    engine.close()?;
    Ok(())
}
