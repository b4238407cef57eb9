//! Lifecycle and monitoring orchestrator.
//!
//! [`ServerManager`] owns the configuration store, the listener, the
//! session/player registry and the monitor, and exposes the public operation
//! surface of the server. It never spawns timers of its own: the host calls
//! [`ServerManager::tick`] from its main loop and the manager runs whichever
//! periodic tasks are due.
//!
//! # Locking
//!
//! Server state (status, listener, monitor, scheduler), sessions, players and
//! configuration each sit behind their own lock. A method holds at most one
//! of them at a time; cascading work is done after the first guard is dropped.

use crate::auth::Authenticator;
use crate::config::{ConfigStore, ServerConfiguration};
use crate::error::{ServerError, SessionError};
use crate::events::{EventBus, ServerEvent};
use crate::listener::ConnectionListener;
use crate::monitoring::{check_alerts, PerformanceMonitor};
use crate::registry::{reasons, Registry};
use crate::scheduler::{Scheduler, TaskKind};
use crate::types::{
    GameSession, PerformanceMetrics, PlayerConnection, PlayerId, ServerEnvironment, ServerStatus,
    SessionId,
};
use parking_lot::{Mutex, RwLock};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// CPU percentage above which the frame budget is throttled.
pub const CPU_THROTTLE_THRESHOLD: f32 = 85.0;

/// Frame budget applied while throttled (30 Hz).
pub const THROTTLED_FRAME_BUDGET: Duration = Duration::from_nanos(1_000_000_000 / 30);

/// Resident memory (MB) above which a reclaim pass is forced.
pub const MEMORY_RECLAIM_THRESHOLD_MB: f32 = 4096.0;

/// Consecutive failures that trigger one auto-recovery attempt.
pub const RECOVERY_FAILURE_THRESHOLD: u32 = 3;

/// Tunables that are fixed in production but useful to shorten in tests.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Pause between player cleanup and listener teardown on a graceful stop
    pub settle_delay: Duration,
    /// Pause between the stop and start halves of a restart
    pub restart_delay: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            restart_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
struct ServerState {
    status: ServerStatus,
    environment: ServerEnvironment,
    listener: Option<ConnectionListener>,
    consecutive_failures: u32,
    auto_recovery: bool,
    /// Set once a start got past validation; cleared when the server goes Offline
    recoverable: bool,
    monitor: PerformanceMonitor,
    scheduler: Scheduler,
    frame_budget: Duration,
    throttled: bool,
}

/// The dedicated server orchestrator.
///
/// Construct one per process, share it behind an `Arc`, and drive it with
/// [`ServerManager::tick`]. Every state change is published on the event bus.
pub struct ServerManager {
    config: RwLock<ConfigStore>,
    state: Mutex<ServerState>,
    registry: Registry,
    authenticator: Authenticator,
    events: EventBus,
    options: ManagerOptions,
}

impl ServerManager {
    /// Creates a stopped manager for `config` with default options.
    pub fn new(config: ServerConfiguration) -> Self {
        Self::with_options(config, ManagerOptions::default())
    }

    /// Creates a stopped manager for `config`.
    ///
    /// The configuration is not validated here; [`ServerManager::start_server`]
    /// refuses to start with an invalid one.
    pub fn with_options(config: ServerConfiguration, options: ManagerOptions) -> Self {
        let events = EventBus::new();
        let authenticator = Authenticator::new(config.security.security_log_path.clone(), events.clone());

        let mut scheduler = Scheduler::new(seconds(config.monitoring.metrics_collection_interval));
        scheduler.set_enabled(
            TaskKind::MetricsCollection,
            config.monitoring.enable_performance_monitoring,
        );
        scheduler.set_interval(
            TaskKind::AutoOptimization,
            seconds(config.performance.garbage_collection_interval),
        );

        let state = ServerState {
            status: ServerStatus::Offline,
            environment: ServerEnvironment::default(),
            listener: None,
            consecutive_failures: 0,
            auto_recovery: true,
            recoverable: false,
            monitor: PerformanceMonitor::new(),
            scheduler,
            frame_budget: frame_budget_for(config.network.tick_rate),
            throttled: false,
        };

        Self {
            config: RwLock::new(ConfigStore::new(config)),
            state: Mutex::new(state),
            registry: Registry::new(events.clone()),
            authenticator,
            events,
            options,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> ServerStatus {
        self.state.lock().status
    }

    pub fn environment(&self) -> ServerEnvironment {
        self.state.lock().environment
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Address the listener is bound to, while it is up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state
            .lock()
            .listener
            .as_ref()
            .and_then(ConnectionListener::local_addr)
    }

    fn transition(&self, state: &mut ServerState, next: ServerStatus) {
        let previous = state.status;
        if previous == next {
            return;
        }
        state.status = next;
        info!("Server status: {} -> {}", previous, next);
        self.events.publish(ServerEvent::StatusChanged {
            previous,
            current: next,
        });
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Starts the server with the preset for `environment`.
    ///
    /// # Arguments
    ///
    /// * `environment` - Preset applied to the configuration before binding
    ///
    /// # Returns
    ///
    /// `Ok(())` once the listener is up and the status is `Online`.
    ///
    /// # Errors
    ///
    /// * `ServerError::AlreadyRunning` when not `Offline` or `Error`; the state is left alone
    /// * `ServerError::Config` / `ServerError::Network` when setup fails; the
    ///   server moves to `Error` and the failure counter is incremented
    pub fn start_server(&self, environment: ServerEnvironment) -> Result<(), ServerError> {
        {
            let mut state = self.state.lock();
            if !state.status.can_start() {
                warn!("Start refused: server is {}", state.status);
                return Err(ServerError::AlreadyRunning(state.status));
            }
            state.environment = environment;
            self.transition(&mut state, ServerStatus::Starting);
        }

        info!("🚀 Starting dedicated server ({} environment)", environment);

        let prepared = {
            let mut config = self.config.write();
            config.apply_environment(environment);
            config.checked_snapshot()
        };
        self.state.lock().recoverable = prepared.is_ok();
        let started = prepared.map_err(ServerError::from).and_then(|config| {
            ConnectionListener::start(&config.network)
                .map(|listener| (listener, config))
                .map_err(ServerError::from)
        });

        match started {
            Ok((listener, config)) => {
                let mut state = self.state.lock();
                self.bring_online(&mut state, listener, &config);
                info!(
                    "✅ Server '{}' online (max {} connections, {} Hz)",
                    config.identity.server_name, config.network.max_connections, config.network.tick_rate
                );
                Ok(())
            }
            Err(e) => {
                error!("❌ Server start failed: {}", e);
                let recover = {
                    let mut state = self.state.lock();
                    state.listener = None;
                    self.record_failure(&mut state)
                };
                if recover && self.attempt_recovery().is_ok() {
                    return Ok(());
                }
                Err(e)
            }
        }
    }

    /// Installs a freshly bound listener and resets per-run state.
    fn bring_online(&self, state: &mut ServerState, listener: ConnectionListener, config: &ServerConfiguration) {
        state.listener = Some(listener);
        state.consecutive_failures = 0;
        state.frame_budget = frame_budget_for(config.network.tick_rate);
        state.throttled = false;
        state.scheduler.set_interval(
            TaskKind::MetricsCollection,
            seconds(config.monitoring.metrics_collection_interval),
        );
        state.scheduler.set_interval(
            TaskKind::AutoOptimization,
            seconds(config.performance.garbage_collection_interval),
        );
        state.scheduler.reset_all();
        self.transition(state, ServerStatus::Online);
    }

    /// Moves to `Error` and bumps the failure counter.
    ///
    /// Returns whether an auto-recovery attempt should follow. Servers that
    /// never got past configuration validation are not recovered.
    fn record_failure(&self, state: &mut ServerState) -> bool {
        self.transition(state, ServerStatus::Error);
        state.consecutive_failures += 1;
        warn!(
            "Consecutive server failures: {}/{}",
            state.consecutive_failures, RECOVERY_FAILURE_THRESHOLD
        );
        state.auto_recovery
            && state.recoverable
            && state.consecutive_failures == RECOVERY_FAILURE_THRESHOLD
    }

    /// Signals an externally detected failure.
    ///
    /// Moves the server to `Error`; the third consecutive failure triggers one
    /// auto-recovery attempt when auto-recovery is enabled.
    pub fn report_error(&self, reason: &str) -> ServerStatus {
        error!("Server error reported: {}", reason);
        let recover = {
            let mut state = self.state.lock();
            self.record_failure(&mut state)
        };
        if recover {
            let _ = self.attempt_recovery();
        }
        self.status()
    }

    /// Tears the listener down and brings it back up with the current config.
    ///
    /// Only valid from `Error`. The configuration is validated first; on an
    /// invalid configuration or a bind failure the server stays in `Error`.
    pub fn attempt_recovery(&self) -> Result<(), ServerError> {
        let status = self.status();
        if status != ServerStatus::Error {
            return Err(ServerError::InvalidState(status));
        }

        info!("🔄 Attempting auto-recovery");
        let snapshot = self.config.write().checked_snapshot();
        let config = match snapshot {
            Ok(config) => config,
            Err(e) => {
                error!("Auto-recovery refused: {}", e);
                return Err(ServerError::Config(e));
            }
        };

        let mut state = self.state.lock();
        if state.status != ServerStatus::Error {
            return Err(ServerError::InvalidState(state.status));
        }
        if let Some(mut listener) = state.listener.take() {
            listener.stop();
        }

        match ConnectionListener::start(&config.network) {
            Ok(listener) => {
                self.bring_online(&mut state, listener, &config);
                info!("✅ Auto-recovery succeeded");
                Ok(())
            }
            Err(e) => {
                error!("Auto-recovery failed: {}", e);
                Err(ServerError::RecoveryFailed(e.to_string()))
            }
        }
    }

    /// Stops the server.
    ///
    /// A graceful stop ends every session, disconnects every player and waits
    /// for the settle delay before closing the listener. A non-graceful stop
    /// closes the listener immediately.
    pub async fn stop_server(&self, graceful: bool) -> Result<(), ServerError> {
        {
            let mut state = self.state.lock();
            match state.status {
                ServerStatus::Offline
                | ServerStatus::Starting
                | ServerStatus::Stopping
                | ServerStatus::Restarting => {
                    return Err(ServerError::InvalidState(state.status));
                }
                _ => self.transition(&mut state, ServerStatus::Stopping),
            }
        }
        self.shutdown(graceful).await;
        Ok(())
    }

    async fn shutdown(&self, graceful: bool) {
        if graceful {
            info!("🛑 Graceful shutdown: ending sessions and disconnecting players");
            self.registry.clear(reasons::SERVER_SHUTDOWN);
            tokio::time::sleep(self.options.settle_delay).await;
        }

        let mut state = self.state.lock();
        if let Some(mut listener) = state.listener.take() {
            listener.stop();
        }
        state.recoverable = false;
        self.transition(&mut state, ServerStatus::Offline);
        info!("Server stopped");
    }

    /// Stops gracefully, waits for the restart delay, then starts again with
    /// the environment that was last active.
    pub async fn restart_server(&self) -> Result<(), ServerError> {
        let environment = {
            let mut state = self.state.lock();
            if matches!(
                state.status,
                ServerStatus::Starting | ServerStatus::Stopping | ServerStatus::Restarting
            ) {
                return Err(ServerError::InvalidState(state.status));
            }
            self.transition(&mut state, ServerStatus::Restarting);
            self.transition(&mut state, ServerStatus::Stopping);
            state.environment
        };

        info!("🔁 Restarting server");
        self.shutdown(true).await;
        tokio::time::sleep(self.options.restart_delay).await;
        self.start_server(environment)
    }

    /// Toggles between `Online` and `Maintenance`. Sessions and players are untouched.
    pub fn set_maintenance_mode(&self, enabled: bool) -> Result<(), ServerError> {
        let mut state = self.state.lock();
        let target = if enabled {
            ServerStatus::Maintenance
        } else {
            ServerStatus::Online
        };
        match state.status {
            status if status == target => Ok(()),
            ServerStatus::Online | ServerStatus::Maintenance => {
                self.transition(&mut state, target);
                Ok(())
            }
            status => Err(ServerError::InvalidState(status)),
        }
    }

    // ---------------------------------------------------------------------
    // Periodic work
    // ---------------------------------------------------------------------

    /// Runs every periodic task that is due. Call from the host loop.
    pub fn tick(&self) {
        self.tick_at(Instant::now());
    }

    /// [`ServerManager::tick`] with an explicit clock.
    pub fn tick_at(&self, now: Instant) {
        let due = {
            let mut state = self.state.lock();
            state.monitor.record_tick();
            if !state.status.is_serving() {
                return;
            }
            state.scheduler.take_due(now)
        };

        for task in due {
            match task {
                TaskKind::MetricsCollection => {
                    self.collect_metrics_at(now);
                }
                TaskKind::AutoOptimization => self.run_auto_optimization(now),
                TaskKind::SessionCleanup => {
                    let max = seconds(self.config.read().config().gameplay.max_session_duration);
                    self.registry.cleanup_sessions(now, max);
                }
                TaskKind::PlayerTimeout => {
                    let timeout = seconds(self.config.read().config().gameplay.player_timeout_seconds);
                    self.registry.evict_timed_out_players(now, timeout);
                }
                TaskKind::Integrity => {
                    let corrected = self.registry.reconcile(now);
                    if corrected > 0 {
                        debug!("Integrity pass corrected {} session(s)", corrected);
                    }
                    let purged = self.authenticator.purge_stale(now);
                    if purged > 0 {
                        debug!("Integrity pass purged {} rate-limit window(s)", purged);
                    }
                }
            }
        }
    }

    fn collect_metrics_at(&self, now: Instant) -> PerformanceMetrics {
        let quality = self.registry.network_quality();
        let sessions = self.registry.active_session_count();

        let (metrics, fresh) = {
            let mut state = self.state.lock();
            let fresh = !state.monitor.is_cached(now);
            (state.monitor.collect(now, quality, sessions), fresh)
        };

        if fresh {
            self.events.publish(ServerEvent::MetricsUpdated(metrics.clone()));
            let monitoring = self.config.read().config().monitoring.clone();
            for (kind, value, threshold) in check_alerts(&metrics, &monitoring) {
                warn!("⚠️ {:?} alert: {:.1} exceeds {:.1}", kind, value, threshold);
                self.events.publish(ServerEvent::PerformanceAlert {
                    kind,
                    value,
                    threshold,
                });
            }
        }
        metrics
    }

    fn run_auto_optimization(&self, now: Instant) {
        let metrics = self.collect_metrics_at(now);
        let tick_rate = self.config.read().config().network.tick_rate;
        self.apply_optimization(&metrics, tick_rate, now);
    }

    fn apply_optimization(&self, metrics: &PerformanceMetrics, tick_rate: i32, now: Instant) {
        {
            let mut state = self.state.lock();
            if metrics.cpu_usage_percent > CPU_THROTTLE_THRESHOLD {
                if !state.throttled {
                    warn!(
                        "CPU at {:.1}%, throttling frame budget to {:?}",
                        metrics.cpu_usage_percent, THROTTLED_FRAME_BUDGET
                    );
                }
                state.frame_budget = THROTTLED_FRAME_BUDGET;
                state.throttled = true;
            } else if state.throttled {
                state.frame_budget = frame_budget_for(tick_rate);
                state.throttled = false;
                info!("CPU back to {:.1}%, frame budget restored", metrics.cpu_usage_percent);
            }
        }

        if metrics.memory_usage_mb > MEMORY_RECLAIM_THRESHOLD_MB {
            warn!(
                "Memory at {:.0} MB, forcing a reclaim pass",
                metrics.memory_usage_mb
            );
            self.registry.shrink();
            let purged = self.authenticator.purge_stale(now);
            debug!("Reclaim pass purged {} rate-limit window(s)", purged);
        }
    }

    /// Target time per server frame. Throttled while CPU is high.
    pub fn frame_budget(&self) -> Duration {
        self.state.lock().frame_budget
    }

    /// Adds host-observed traffic to the network counters.
    pub fn record_network_traffic(&self, bytes_in: u64, bytes_out: u64) {
        self.state.lock().monitor.record_traffic(bytes_in, bytes_out);
    }

    /// Latest metrics, re-sampled unless the cached snapshot is still fresh.
    pub fn current_metrics(&self) -> PerformanceMetrics {
        self.collect_metrics_at(Instant::now())
    }

    pub fn start_performance_monitoring(&self) {
        self.set_task(TaskKind::MetricsCollection, true);
    }

    pub fn stop_performance_monitoring(&self) {
        self.set_task(TaskKind::MetricsCollection, false);
    }

    pub fn is_performance_monitoring(&self) -> bool {
        self.state.lock().scheduler.is_enabled(TaskKind::MetricsCollection)
    }

    pub fn set_auto_optimization(&self, enabled: bool) {
        self.set_task(TaskKind::AutoOptimization, enabled);
    }

    pub fn set_auto_session_cleanup(&self, enabled: bool) {
        self.set_task(TaskKind::SessionCleanup, enabled);
    }

    pub fn set_player_timeout_eviction(&self, enabled: bool) {
        self.set_task(TaskKind::PlayerTimeout, enabled);
    }

    pub fn set_auto_recovery(&self, enabled: bool) {
        self.state.lock().auto_recovery = enabled;
    }

    pub fn is_task_enabled(&self, task: TaskKind) -> bool {
        self.state.lock().scheduler.is_enabled(task)
    }

    fn set_task(&self, task: TaskKind, enabled: bool) {
        self.state.lock().scheduler.set_enabled(task, enabled);
        debug!("{:?} {}", task, if enabled { "enabled" } else { "disabled" });
    }

    // ---------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------

    /// Creates a session using the configured default game mode.
    ///
    /// Refused unless the server is `Online` and below `MaxConcurrentSessions`.
    pub fn create_session(
        &self,
        name: &str,
        map_name: &str,
        max_players: usize,
        ranked: bool,
    ) -> Result<SessionId, SessionError> {
        let status = self.status();
        if status != ServerStatus::Online {
            return Err(SessionError::ServerNotOnline(status));
        }
        let (game_mode, cap) = {
            let config = self.config.read();
            let config = config.config();
            (
                config.gameplay.default_game_mode.clone(),
                usize::try_from(config.performance.max_concurrent_sessions).unwrap_or(0),
            )
        };
        self.registry
            .create_session(name, map_name, &game_mode, max_players, ranked, cap)
    }

    pub fn join_session(&self, session_id: SessionId, player_id: &PlayerId) -> Result<(), SessionError> {
        self.registry.join_session(session_id, player_id)
    }

    pub fn leave_session(&self, session_id: SessionId, player_id: &PlayerId) -> Result<(), SessionError> {
        self.registry.leave_session(session_id, player_id)
    }

    pub fn end_session(&self, session_id: SessionId) -> Result<Duration, SessionError> {
        self.registry.end_session(session_id)
    }

    pub fn active_sessions(&self) -> Vec<GameSession> {
        self.registry.active_sessions()
    }

    pub fn session_info(&self, session_id: SessionId) -> Option<GameSession> {
        self.registry.session_info(session_id)
    }

    // ---------------------------------------------------------------------
    // Players
    // ---------------------------------------------------------------------

    /// Checks `token` against the configured authentication method.
    pub fn authenticate_player(&self, player_id: &PlayerId, token: &str) -> bool {
        let security = self.config.read().config().security.clone();
        self.authenticator.authenticate(&security, player_id, token)
    }

    /// Authenticates and registers a connecting player.
    ///
    /// Returns `true` for a new registration and `false` when an existing
    /// record was refreshed.
    pub fn handle_player_connection(
        &self,
        player_id: &PlayerId,
        player_name: &str,
        address: SocketAddr,
        token: &str,
    ) -> Result<bool, SessionError> {
        let status = self.status();
        if !status.is_serving() {
            return Err(SessionError::ServerNotOnline(status));
        }
        if !self.authenticate_player(player_id, token) {
            return Err(SessionError::AuthenticationFailed(player_id.clone()));
        }
        self.registry
            .register_player(player_id, player_name, address, true, self.connection_cap())
    }

    /// Registers a player without authentication. Idempotent per player ID.
    pub fn register_player(
        &self,
        player_id: &PlayerId,
        player_name: &str,
        address: SocketAddr,
    ) -> Result<bool, SessionError> {
        self.registry
            .register_player(player_id, player_name, address, false, self.connection_cap())
    }

    pub fn unregister_player(&self, player_id: &PlayerId) -> Result<(), SessionError> {
        self.registry.unregister_player(player_id)
    }

    pub fn disconnect_player(&self, player_id: &PlayerId, reason: &str) -> Result<(), SessionError> {
        self.registry.disconnect_player(player_id, reason)
    }

    pub fn update_player_network_stats(
        &self,
        player_id: &PlayerId,
        ping_ms: f32,
        packet_loss_in: f32,
        packet_loss_out: f32,
    ) -> Result<(), SessionError> {
        self.registry
            .update_player_network_stats(player_id, ping_ms, packet_loss_in, packet_loss_out)
    }

    pub fn connected_players(&self) -> Vec<PlayerConnection> {
        self.registry.connected_players()
    }

    pub fn player_info(&self, player_id: &PlayerId) -> Option<PlayerConnection> {
        self.registry.player_info(player_id)
    }

    pub fn connected_player_count(&self) -> usize {
        self.registry.connected_player_count()
    }

    fn connection_cap(&self) -> usize {
        usize::try_from(self.config.read().config().network.max_connections).unwrap_or(0)
    }

    /// Accepts one pending socket from the listener, if any.
    pub fn accept_connection(&self) -> Option<(TcpStream, SocketAddr)> {
        self.state.lock().listener.as_ref()?.try_accept()
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ServerConfiguration {
        self.config.read().config().clone()
    }

    /// Runs `f` with exclusive access to the configuration store.
    pub fn configure<R>(&self, f: impl FnOnce(&mut ConfigStore) -> R) -> R {
        f(&mut self.config.write())
    }

    /// Loads and installs a configuration file; the current one is kept on failure.
    pub async fn load_config(&self, path: &Path) -> Result<(), ServerError> {
        let loaded = ServerConfiguration::read_from(path).await?;
        self.config.write().install(loaded)?;
        info!("Loaded configuration from {}", path.display());
        Ok(())
    }

    /// Saves the current configuration. Invalid configurations are not written.
    pub async fn save_config(&self, path: &Path) -> Result<(), ServerError> {
        let snapshot = self.config.write().checked_snapshot()?;
        snapshot.write_to(path).await?;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }
}

/// Converts a non-negative float seconds value; out-of-range input saturates.
fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or(Duration::MAX)
}

fn frame_budget_for(tick_rate: i32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdTcpListener;

    fn free_port() -> i32 {
        StdTcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port() as i32
    }

    fn fast_options() -> ManagerOptions {
        ManagerOptions {
            settle_delay: Duration::from_millis(10),
            restart_delay: Duration::from_millis(10),
        }
    }

    fn local_config() -> ServerConfiguration {
        let mut config = ServerConfiguration::default();
        config.network.server_ip = "127.0.0.1".to_string();
        config.network.server_port = free_port();
        config
    }

    fn local_manager() -> ServerManager {
        ServerManager::with_options(local_config(), fast_options())
    }

    #[test]
    fn test_start_transitions_to_online() {
        let manager = local_manager();
        let mut rx = manager.subscribe();

        manager.start_server(ServerEnvironment::Development).unwrap();

        assert_eq!(manager.status(), ServerStatus::Online);
        assert!(manager.local_addr().is_some());
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::StatusChanged {
                previous: ServerStatus::Offline,
                current: ServerStatus::Starting,
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::StatusChanged {
                previous: ServerStatus::Starting,
                current: ServerStatus::Online,
            }
        );
    }

    #[test]
    fn test_start_while_online_is_rejected() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Development).unwrap();

        let result = manager.start_server(ServerEnvironment::Production);
        assert!(matches!(
            result,
            Err(ServerError::AlreadyRunning(ServerStatus::Online))
        ));
        assert_eq!(manager.status(), ServerStatus::Online);
        assert_eq!(manager.environment(), ServerEnvironment::Development);
    }

    #[test]
    fn test_bind_failure_enters_error_state() {
        let occupied = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = ServerConfiguration::default();
        config.network.server_ip = "127.0.0.1".to_string();
        config.network.server_port = occupied.local_addr().unwrap().port() as i32;
        let manager = ServerManager::with_options(config, fast_options());

        let result = manager.start_server(ServerEnvironment::Development);
        assert!(matches!(result, Err(ServerError::Network(_))));
        assert_eq!(manager.status(), ServerStatus::Error);
        assert_eq!(manager.consecutive_failures(), 1);
        assert!(manager.local_addr().is_none());
    }

    #[test]
    fn test_invalid_config_refuses_start() {
        let mut config = ServerConfiguration::default();
        config.performance.max_memory_usage = 0;
        let manager = ServerManager::with_options(config, fast_options());

        assert!(matches!(
            manager.start_server(ServerEnvironment::Development),
            Err(ServerError::Config(_))
        ));
        assert_eq!(manager.status(), ServerStatus::Error);
    }

    #[test]
    fn test_third_error_triggers_recovery() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Development).unwrap();

        assert_eq!(manager.report_error("socket reset"), ServerStatus::Error);
        assert_eq!(manager.report_error("socket reset"), ServerStatus::Error);
        assert_eq!(manager.consecutive_failures(), 2);

        assert_eq!(manager.report_error("socket reset"), ServerStatus::Online);
        assert_eq!(manager.consecutive_failures(), 0);
        assert!(manager.local_addr().is_some());
    }

    #[test]
    fn test_recovery_can_be_disabled() {
        let manager = local_manager();
        manager.set_auto_recovery(false);
        for _ in 0..3 {
            manager.report_error("disk full");
        }
        assert_eq!(manager.status(), ServerStatus::Error);
        assert_eq!(manager.consecutive_failures(), 3);
    }

    #[test]
    fn test_maintenance_toggle() {
        let manager = local_manager();
        assert!(manager.set_maintenance_mode(true).is_err());

        manager.start_server(ServerEnvironment::Development).unwrap();
        manager.set_maintenance_mode(true).unwrap();
        assert_eq!(manager.status(), ServerStatus::Maintenance);

        // Sessions cannot be created while in maintenance
        assert_eq!(
            manager.create_session("a", "m", 4, false),
            Err(SessionError::ServerNotOnline(ServerStatus::Maintenance))
        );

        manager.set_maintenance_mode(false).unwrap();
        assert_eq!(manager.status(), ServerStatus::Online);
    }

    #[tokio::test]
    async fn test_graceful_stop_clears_registry() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Development).unwrap();
        let session = manager.create_session("Dungeon A", "MapX", 4, false).unwrap();
        let p1 = PlayerId::from("p1");
        manager
            .register_player(&p1, "One", "127.0.0.1:5000".parse().unwrap())
            .unwrap();
        manager.join_session(session, &p1).unwrap();

        manager.stop_server(true).await.unwrap();

        assert_eq!(manager.status(), ServerStatus::Offline);
        assert!(manager.active_sessions().is_empty());
        assert_eq!(manager.connected_player_count(), 0);
        assert!(manager.local_addr().is_none());
        assert!(matches!(
            manager.stop_server(true).await,
            Err(ServerError::InvalidState(ServerStatus::Offline))
        ));
    }

    #[tokio::test]
    async fn test_non_graceful_stop_keeps_records() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Development).unwrap();
        manager
            .register_player(&PlayerId::from("p1"), "One", "127.0.0.1:5000".parse().unwrap())
            .unwrap();

        manager.stop_server(false).await.unwrap();

        assert_eq!(manager.status(), ServerStatus::Offline);
        assert_eq!(manager.connected_player_count(), 1);
    }

    #[tokio::test]
    async fn test_restart_reuses_environment() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Staging).unwrap();
        let mut rx = manager.subscribe();

        manager.restart_server().await.unwrap();

        assert_eq!(manager.status(), ServerStatus::Online);
        assert_eq!(manager.environment(), ServerEnvironment::Staging);

        let mut statuses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::StatusChanged { current, .. } = event {
                statuses.push(current);
            }
        }
        assert_eq!(
            statuses,
            vec![
                ServerStatus::Restarting,
                ServerStatus::Stopping,
                ServerStatus::Offline,
                ServerStatus::Starting,
                ServerStatus::Online,
            ]
        );
    }

    #[test]
    fn test_tick_does_nothing_while_offline() {
        let manager = local_manager();
        let mut rx = manager.subscribe();
        manager.tick();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_tick_publishes_metrics() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Development).unwrap();
        let mut rx = manager.subscribe();

        manager.tick();

        let mut saw_metrics = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ServerEvent::MetricsUpdated(_)) {
                saw_metrics = true;
            }
        }
        assert!(saw_metrics);
    }

    #[test]
    fn test_stopped_monitoring_skips_metrics() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Development).unwrap();
        manager.stop_performance_monitoring();
        assert!(!manager.is_performance_monitoring());
        let mut rx = manager.subscribe();

        manager.tick();

        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, ServerEvent::MetricsUpdated(_)));
        }
    }

    #[test]
    fn test_cpu_throttle_and_restore() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Development).unwrap();
        let normal = manager.frame_budget();
        assert_eq!(normal, frame_budget_for(30));

        let hot = PerformanceMetrics {
            cpu_usage_percent: 92.0,
            ..Default::default()
        };
        manager.apply_optimization(&hot, 30, Instant::now());
        assert_eq!(manager.frame_budget(), THROTTLED_FRAME_BUDGET);

        let cool = PerformanceMetrics {
            cpu_usage_percent: 20.0,
            ..Default::default()
        };
        manager.apply_optimization(&cool, 30, Instant::now());
        assert_eq!(manager.frame_budget(), normal);
    }

    #[test]
    fn test_handle_player_connection() {
        let manager = local_manager();
        let p1 = PlayerId::from("p1");
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(
            manager.handle_player_connection(&p1, "One", addr, ""),
            Err(SessionError::ServerNotOnline(ServerStatus::Offline))
        );

        manager.start_server(ServerEnvironment::Development).unwrap();
        assert_eq!(manager.handle_player_connection(&p1, "One", addr, ""), Ok(true));
        assert!(manager.player_info(&p1).unwrap().is_authenticated);
        assert_eq!(manager.handle_player_connection(&p1, "One", addr, ""), Ok(false));
        assert_eq!(manager.connected_player_count(), 1);
    }

    #[test]
    fn test_invalid_config_is_never_recovered() {
        let mut config = local_config();
        config.performance.max_memory_usage = 0;
        let manager = ServerManager::with_options(config, fast_options());

        for _ in 0..RECOVERY_FAILURE_THRESHOLD {
            assert!(matches!(
                manager.start_server(ServerEnvironment::Development),
                Err(ServerError::Config(_))
            ));
            assert_eq!(manager.status(), ServerStatus::Error);
        }
        assert_eq!(manager.consecutive_failures(), RECOVERY_FAILURE_THRESHOLD);
        assert!(manager.local_addr().is_none());

        assert!(matches!(manager.attempt_recovery(), Err(ServerError::Config(_))));
        assert_eq!(manager.status(), ServerStatus::Error);
        assert!(manager.local_addr().is_none());
    }

    #[test]
    fn test_errors_before_first_start_are_not_recovered() {
        let manager = local_manager();
        for _ in 0..RECOVERY_FAILURE_THRESHOLD {
            assert_eq!(manager.report_error("watchdog"), ServerStatus::Error);
        }
        assert!(manager.local_addr().is_none());
    }

    #[test]
    fn test_recovery_requires_error_state() {
        let manager = local_manager();
        assert!(matches!(
            manager.attempt_recovery(),
            Err(ServerError::InvalidState(ServerStatus::Offline))
        ));

        manager.start_server(ServerEnvironment::Development).unwrap();
        assert!(matches!(
            manager.attempt_recovery(),
            Err(ServerError::InvalidState(ServerStatus::Online))
        ));
    }

    #[test]
    fn test_failed_start_with_failed_recovery_stays_in_error() {
        let occupied = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = local_config();
        config.network.server_port = occupied.local_addr().unwrap().port() as i32;
        let manager = ServerManager::with_options(config, fast_options());

        for _ in 0..RECOVERY_FAILURE_THRESHOLD {
            assert!(matches!(
                manager.start_server(ServerEnvironment::Development),
                Err(ServerError::Network(_))
            ));
            assert_eq!(manager.status(), ServerStatus::Error);
        }
        assert_eq!(manager.consecutive_failures(), RECOVERY_FAILURE_THRESHOLD);
        assert!(manager.local_addr().is_none());
    }

    #[test]
    fn test_integrity_pass_purges_rate_limit_windows() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Development).unwrap();
        manager.configure(|store| {
            let mut security = store.config().security.clone();
            security.enable_rate_limiting = true;
            store.update_security_config(security).unwrap();
        });

        for i in 0..5 {
            assert!(manager.authenticate_player(&PlayerId::from(format!("p{i}")), ""));
        }
        assert_eq!(manager.authenticator.tracked_players(), 5);

        manager.tick_at(Instant::now() + crate::auth::RATE_LIMIT_WINDOW + Duration::from_secs(1));
        assert_eq!(manager.authenticator.tracked_players(), 0);
    }

    #[test]
    fn test_optimization_interval_follows_config() {
        let mut config = local_config();
        config.performance.garbage_collection_interval = 15.0;
        let manager = ServerManager::with_options(config, fast_options());
        manager.start_server(ServerEnvironment::Development).unwrap();

        let interval = manager
            .state
            .lock()
            .scheduler
            .task(TaskKind::AutoOptimization)
            .map(|task| task.interval);
        assert_eq!(interval, Some(Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn test_stop_refused_while_restarting() {
        let manager = local_manager();
        manager.start_server(ServerEnvironment::Development).unwrap();
        manager.state.lock().status = ServerStatus::Restarting;

        assert!(matches!(
            manager.stop_server(true).await,
            Err(ServerError::InvalidState(ServerStatus::Restarting))
        ));
        assert!(manager.local_addr().is_some());
    }
}
