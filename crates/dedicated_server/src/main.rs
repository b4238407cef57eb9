//! Dedicated server entry point.
//!
//! Loads (or creates) the JSON configuration, applies command-line overrides,
//! initializes logging, starts the server manager and drives it until a
//! shutdown signal arrives.

mod cli;
mod config;
mod host;
mod logging;
mod signals;

use anyhow::{Context, Result};
use cli::CliArgs;
use config::{apply_overrides, load_or_create, ConfigSource};
use server_manager::{ConfigStore, ServerManager};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let mut signals = signals::ShutdownSignals::install()?;

    let (loaded, source) = load_or_create(&args.config_path).await?;
    let mut store = ConfigStore::new(loaded);
    store.apply_environment(args.environment);
    apply_overrides(&mut store, &args)?;

    logging::setup_logging(
        &store.config().logging,
        args.log_level.as_deref(),
        args.json_logs,
    )?;
    display_banner(&store);

    match source {
        ConfigSource::Loaded => info!("📄 Loaded configuration from {}", args.config_path.display()),
        ConfigSource::CreatedDefault => info!(
            "📄 Created default configuration at {}",
            args.config_path.display()
        ),
    }

    let manager = Arc::new(ServerManager::new(store.config().clone()));

    manager
        .start_server(args.environment)
        .with_context(|| format!("Failed to start server in {} environment", args.environment))?;
    if let Some(addr) = manager.local_addr() {
        info!("🚀 Server online at {} ({})", addr, args.environment);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tick_loop = tokio::spawn(host::run_tick_loop(manager.clone(), shutdown_rx));

    match signals.recv().await {
        Ok(name) => info!("📡 Received {}, shutting down", name),
        Err(e) => error!("Signal handler failed, shutting down: {}", e),
    }

    if let Err(e) = manager.stop_server(true).await {
        warn!("Server stop reported: {}", e);
    }
    let _ = shutdown_tx.send(true);
    if let Err(e) = tick_loop.await {
        warn!("Tick loop ended abnormally: {}", e);
    }

    info!("✅ Server shutdown complete");
    Ok(())
}

fn display_banner(store: &ConfigStore) {
    let identity = &store.config().identity;
    info!("╔══════════════════════════════════════════╗");
    info!("║          DEDICATED SERVER v{:<8}      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════════╝");
    info!("🏷️  {} ({})", identity.server_name, identity.region);
}
