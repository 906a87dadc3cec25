//! ## Sets up logging by reading configuration from environment variables.
//!
//! The crate emits `tracing` events; with the `log` feature they are forwarded to
//! the `log` facade, which is served by `simplelog` here.
//!
//! Environment variables used:
//! - LOG_MODE: "stdout" (default) or "file"
//! - LOG_LEVEL: log level ("trace", "debug", "info", "warn", "error"); default is "info"
//! - LOG_FILE_PATH: when using file mode, the path of the log file (default "logs/ledger-executor.log")

use chrono::Utc;
use eyre::{Result, WrapErr};
use log::info;
use simplelog::{Config, LevelFilter, SimpleLogger, WriteLogger};
use std::{
    env,
    fs::{create_dir_all, File},
    path::Path,
};

use crate::constants::{DEFAULT_LOG_FILE_PATH, DEFAULT_LOG_LEVEL, DEFAULT_LOG_MODE};

/// Maps a textual level to a `LevelFilter`, defaulting to `Info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

/// Appends the date to a log file path (`logs/app.log` -> `logs/app-2024-01-31.log`).
pub fn compute_rolled_file_path(base_file_path: &str, date_str: &str) -> String {
    match base_file_path.strip_suffix(".log") {
        Some(trimmed) => format!("{trimmed}-{date_str}.log"),
        None => format!("{base_file_path}-{date_str}.log"),
    }
}

pub fn setup_logging() -> Result<()> {
    let log_mode = env::var("LOG_MODE").unwrap_or_else(|_| DEFAULT_LOG_MODE.to_string());
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    let level_filter = parse_level(&log_level);

    if log_mode.to_lowercase() == "file" {
        let base_file_path =
            env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE_PATH.to_string());

        let date_str = Utc::now().format("%Y-%m-%d").to_string();
        let rolled_file_path = compute_rolled_file_path(&base_file_path, &date_str);

        if let Some(parent) = Path::new(&rolled_file_path).parent() {
            create_dir_all(parent).wrap_err("Failed to create log directory")?;
        }

        let log_file = File::create(&rolled_file_path)
            .wrap_err_with(|| format!("Unable to create log file {rolled_file_path}"))?;

        WriteLogger::init(level_filter, Config::default(), log_file)
            .wrap_err("Failed to initialize file logger")?;
    } else {
        SimpleLogger::init(level_filter, Config::default())
            .wrap_err("Failed to initialize simple logger")?;
    }

    info!("Logging is successfully configured (mode: {})", log_mode);
    Ok(())
}
