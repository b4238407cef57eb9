//! Logging initialization.
//!
//! Builds a `tracing-subscriber` registry with an `EnvFilter`, an optional
//! console layer (plain or JSON) and an optional file layer, driven by the
//! `LoggingConfig` category and the `--log-level` / `--json-logs` flags.

use anyhow::{Context, Result};
use server_manager::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `level_override`, which takes precedence
/// over `LoggingConfig.LogLevel`. If the log file cannot be opened, console
/// output is forced on and a warning is emitted once logging is up.
pub fn setup_logging(
    config: &LoggingConfig,
    level_override: Option<&str>,
    json_format: bool,
) -> Result<()> {
    let level = level_override.unwrap_or_else(|| config.log_level.as_filter());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut file_error = None;

    if config.log_to_file {
        let path = PathBuf::from(&config.log_file_path);
        match open_log_file(&path, config.max_log_file_size) {
            Ok(file) => layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            ),
            Err(e) => file_error = Some((path, e)),
        }
    }

    if config.log_to_console || file_error.is_some() || layers.is_empty() {
        layers.push(console_layer(json_format));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some((path, e)) = file_error {
        warn!(
            "Could not open log file {} ({}), logging to console only",
            path.display(),
            e
        );
    }
    info!("🔧 Logging initialized with level: {}", level);
    Ok(())
}

fn console_layer(json_format: bool) -> BoxedLayer {
    if json_format {
        fmt::layer()
            .json()
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(true)
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    }
}

/// Opens the log file for appending, rotating it to `<name>.1` first when it
/// has grown past `max_size_mb`.
pub fn open_log_file(path: &Path, max_size_mb: i32) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let limit = u64::try_from(max_size_mb).unwrap_or(0) * 1024 * 1024;
    if let Ok(metadata) = std::fs::metadata(path) {
        if limit > 0 && metadata.len() > limit {
            let mut rotated = path.as_os_str().to_owned();
            rotated.push(".1");
            std::fs::rename(path, PathBuf::from(rotated))?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}
