//! # Dedicated Server Manager
//!
//! The lifecycle and session-management core of a standalone multiplayer game
//! server. It contains **no gameplay**. It only provides the infrastructure a
//! host process needs to run matches:
//!
//! * **Configuration store** - typed settings persisted as JSON, validated per
//!   category, with environment presets
//! * **Connection listener** - a tuned, non-blocking TCP listening socket
//! * **Session & player registry** - match rosters and connected players under
//!   independent locks
//! * **Lifecycle & monitoring orchestrator** - the server state machine,
//!   auto-recovery, performance sampling and periodic maintenance
//!
//! ## Driving the manager
//!
//! The manager has no timers of its own. The host owns the main loop and calls
//! [`ServerManager::tick`] at its frame rate; due maintenance tasks (metrics,
//! session cleanup, player timeouts, integrity passes, auto-optimization) run
//! inside that call.
//!
//! ```no_run
//! use server_manager::{ServerConfiguration, ServerEnvironment, ServerManager};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = Arc::new(ServerManager::new(ServerConfiguration::default()));
//! manager.start_server(ServerEnvironment::Production)?;
//!
//! let mut interval = tokio::time::interval(manager.frame_budget());
//! loop {
//!     interval.tick().await;
//!     manager.tick();
//! #   break;
//! }
//! manager.stop_server(true).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Events
//!
//! Status changes, player and session lifecycle, metrics snapshots,
//! performance alerts and security events are published as [`ServerEvent`]s.
//! Call [`ServerManager::subscribe`] to receive them.
//!
//! ## Error Handling
//!
//! Each layer reports failures through its own type: [`ConfigError`],
//! [`NetworkError`], [`SessionError`] and the lifecycle-level [`ServerError`].
//! Authentication failures never surface as errors; they are logged to the
//! security log and reported as `false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod listener;
pub mod manager;
pub mod monitoring;
pub mod registry;
pub mod scheduler;
pub mod security_log;
pub mod types;

pub use auth::Authenticator;
pub use config::{
    AuthMethod, ConfigStore, GameplayConfig, LogLevel, LoggingConfig, MonitoringConfig,
    NetworkConfig, PerformanceConfig, SecurityConfig, ServerConfiguration, ServerIdentity,
    ValidationReport,
};
pub use error::{AuthError, ConfigError, NetworkError, ServerError, SessionError};
pub use events::{AlertKind, EventBus, ServerEvent};
pub use listener::ConnectionListener;
pub use manager::{ManagerOptions, ServerManager};
pub use registry::Registry;
pub use scheduler::TaskKind;
pub use types::{
    GameSession, PerformanceMetrics, PlayerConnection, PlayerId, ServerEnvironment, ServerStatus,
    SessionId,
};
