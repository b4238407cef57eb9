//! Shutdown signal handling.
//!
//! Handlers are installed up front with [`ShutdownSignals::install`] so a
//! signal that arrives while the server is still starting is not lost and
//! does not fall through to the default (terminating) disposition.

use anyhow::{Context, Result};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Installed handlers for the signals that request a graceful stop.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignals {
    /// SIGINT and SIGTERM on Unix, Ctrl+C elsewhere.
    pub fn install() -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                interrupt: signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?,
                terminate: signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Resolves with the name of the first signal received.
    pub async fn recv(&mut self) -> Result<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => Ok("SIGINT"),
                _ = self.terminate.recv() => Ok("SIGTERM"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
            Ok("Ctrl+C")
        }
    }
}
