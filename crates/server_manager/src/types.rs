//! # Core Type Definitions
//!
//! Identifiers, status enums and the record types shared by the registry,
//! the orchestrator and event subscribers.
//!
//! - [`SessionId`] / [`PlayerId`] - wrapper types so the two kinds of ID cannot be mixed up
//! - [`ServerStatus`] / [`ServerEnvironment`] - lifecycle state and configuration preset
//! - [`GameSession`] / [`PlayerConnection`] - registry records
//! - [`PerformanceMetrics`] - monitoring snapshot

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Unique identifier for a game session.
///
/// Generated with UUID v4 when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque player identifier supplied by the connecting client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of the server.
///
/// Only the orchestrator changes it, and every change is broadcast as a
/// [`crate::events::ServerEvent::StatusChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ServerStatus {
    #[default]
    Offline,
    Starting,
    Online,
    Stopping,
    Restarting,
    Maintenance,
    Error,
}

impl ServerStatus {
    /// Whether `start` may be called from this state.
    pub fn can_start(self) -> bool {
        matches!(self, ServerStatus::Offline | ServerStatus::Error)
    }

    /// Whether periodic work (monitoring, sweeps) should run.
    pub fn is_serving(self) -> bool {
        matches!(self, ServerStatus::Online | ServerStatus::Maintenance)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerStatus::Offline => "Offline",
            ServerStatus::Starting => "Starting",
            ServerStatus::Online => "Online",
            ServerStatus::Stopping => "Stopping",
            ServerStatus::Restarting => "Restarting",
            ServerStatus::Maintenance => "Maintenance",
            ServerStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Deployment environment, selecting a configuration preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ServerEnvironment {
    #[default]
    Development,
    Staging,
    Production,
    LoadTest,
}

impl FromStr for ServerEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(ServerEnvironment::Development),
            "staging" => Ok(ServerEnvironment::Staging),
            "production" | "prod" => Ok(ServerEnvironment::Production),
            "load-test" | "loadtest" | "load_test" => Ok(ServerEnvironment::LoadTest),
            other => Err(format!("Unknown environment: {other}")),
        }
    }
}

impl fmt::Display for ServerEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerEnvironment::Development => "development",
            ServerEnvironment::Staging => "staging",
            ServerEnvironment::Production => "production",
            ServerEnvironment::LoadTest => "load-test",
        };
        f.write_str(name)
    }
}

/// A bounded multiplayer match with its own roster.
///
/// `current_players` always mirrors `player_ids.len()`; the registry's
/// integrity pass repairs any drift.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub session_id: SessionId,
    pub session_name: String,
    pub map_name: String,
    pub game_mode: String,
    /// Unix timestamp (seconds) of creation
    pub created_at: u64,
    pub max_players: usize,
    pub current_players: usize,
    pub is_ranked: bool,
    pub is_active: bool,
    /// Members in join order
    pub player_ids: Vec<PlayerId>,
    /// Last computed session duration
    pub duration: Duration,
    pub(crate) started: Instant,
}

impl GameSession {
    pub(crate) fn new(
        session_name: String,
        map_name: String,
        game_mode: String,
        max_players: usize,
        is_ranked: bool,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            session_name,
            map_name,
            game_mode,
            created_at: current_timestamp(),
            max_players,
            current_players: 0,
            is_ranked,
            is_active: true,
            player_ids: Vec::new(),
            duration: Duration::ZERO,
            started: Instant::now(),
        }
    }

    /// Time elapsed since creation, as of `now`.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    pub fn is_full(&self) -> bool {
        self.player_ids.len() >= self.max_players
    }

    pub fn has_player(&self, player_id: &PlayerId) -> bool {
        self.player_ids.contains(player_id)
    }
}

/// A tracked remote participant.
#[derive(Debug, Clone)]
pub struct PlayerConnection {
    pub player_id: PlayerId,
    pub player_name: String,
    pub address: SocketAddr,
    pub is_authenticated: bool,
    /// Unix timestamp (seconds) of the first registration
    pub connected_at: u64,
    /// Rolling connection duration, refreshed by the timeout sweep
    pub connection_duration: Duration,
    pub ping_ms: f32,
    /// Inbound packet loss as a fraction in [0, 1]
    pub packet_loss_in: f32,
    /// Outbound packet loss as a fraction in [0, 1]
    pub packet_loss_out: f32,
    pub session_id: Option<SessionId>,
    pub(crate) connected: Instant,
}

impl PlayerConnection {
    pub fn new(player_id: PlayerId, player_name: String, address: SocketAddr) -> Self {
        Self {
            player_id,
            player_name,
            address,
            is_authenticated: false,
            connected_at: current_timestamp(),
            connection_duration: Duration::ZERO,
            ping_ms: 0.0,
            packet_loss_in: 0.0,
            packet_loss_out: 0.0,
            session_id: None,
            connected: Instant::now(),
        }
    }

    /// Connection age as of `now`.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.connected)
    }
}

/// Snapshot of server performance, recomputed wholesale on each monitoring pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub cpu_usage_percent: f32,
    pub memory_usage_mb: f32,
    pub network_in_kbps: f32,
    pub network_out_kbps: f32,
    pub tick_rate: f32,
    pub connected_players: usize,
    pub active_sessions: usize,
    pub average_latency_ms: f32,
    pub packet_loss_percent: f32,
    /// Unix timestamp (seconds) of the sample
    pub last_update: u64,
}

/// Current Unix time in seconds.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
