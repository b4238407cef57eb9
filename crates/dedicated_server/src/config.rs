//! Configuration loading for the dedicated server binary.
//!
//! Loads the JSON configuration file, writing a default one first when it
//! does not exist, and applies command-line overrides through the validated
//! per-category setters.

use crate::cli::CliArgs;
use anyhow::{Context, Result};
use server_manager::{ConfigError, ConfigStore, ServerConfiguration};
use std::path::Path;
use tracing::info;

/// Where the configuration came from, reported once logging is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Loaded,
    CreatedDefault,
}

/// Loads `path`, or writes and returns the defaults if the file is missing.
///
/// Malformed or invalid files are an error; the server never starts on a
/// configuration it could not read.
pub async fn load_or_create(path: &Path) -> Result<(ServerConfiguration, ConfigSource)> {
    match ServerConfiguration::read_from(path).await {
        Ok(config) => Ok((config, ConfigSource::Loaded)),
        Err(ConfigError::NotFound(_)) => {
            let config = ServerConfiguration::default();
            config
                .write_to(path)
                .await
                .with_context(|| format!("Failed to create default config at {}", path.display()))?;
            Ok((config, ConfigSource::CreatedDefault))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config from {}", path.display())),
    }
}

/// Applies `--bind` and `--port` to the network category.
pub fn apply_overrides(store: &mut ConfigStore, args: &CliArgs) -> Result<()> {
    if args.bind_ip.is_none() && args.port.is_none() {
        return Ok(());
    }

    let mut network = store.config().network.clone();
    if let Some(ip) = &args.bind_ip {
        network.server_ip = ip.clone();
    }
    if let Some(port) = args.port {
        network.server_port = port;
    }
    store
        .update_network_config(network)
        .context("Invalid command-line network override")?;

    info!(
        "Network override: {}:{}",
        store.config().network.server_ip,
        store.config().network.server_port
    );
    Ok(())
}
