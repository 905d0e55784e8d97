// Logging Setup
//
// Installs the process-wide tracing subscriber. Console output always goes to
// stderr so stdout stays clean for results and the MCP stdio channel.

use crate::config::{data_dir, LoggingConfig};
use lerelais::{RelaisError, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Console filter directive for a configured level
///
/// `verbose` forces `debug`. Python-style names (`WARNING`, `CRITICAL`) map
/// onto their tracing equivalents.
pub fn level_directive(level: &str, verbose: bool) -> &'static str {
    if verbose {
        return "debug";
    }
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" => "error",
        _ => "info",
    }
}

/// Log file used when file logging is on: `log_file`, or a dated file under
/// the data directory.
pub fn log_file_path(config: &LoggingConfig) -> PathBuf {
    config.log_file.clone().unwrap_or_else(|| {
        let date = chrono::Local::now().format("%Y%m%d");
        data_dir().join(format!("dockerfile_ai_{}.log", date))
    })
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured console level. Returns
/// the log file path when file logging is enabled. Calling this twice leaves
/// the first subscriber in place.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<PathBuf>> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&config.level, config.verbose)));

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let (file_layer, file_path) = if config.file_logging {
        let path = log_file_path(config);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RelaisError::io("Failed to create log directory", Some(parent.to_path_buf()), e)
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RelaisError::io("Failed to open log file", Some(path.clone()), e))?;

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_filter(LevelFilter::DEBUG);
        (Some(layer), Some(path))
    } else {
        (None, None)
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    Ok(file_path)
}
