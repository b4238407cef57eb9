//! Configuration settings structures
//!
//! The configuration is split into six flat categories plus the server
//! identity fields. Everything serializes to JSON with the PascalCase keys the
//! server config file uses (`ServerIP`, `MaxCPUUsage`, ...). Ordinal-encoded
//! enums ([`AuthMethod`], [`LogLevel`]) are written as integers.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Root configuration object.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ServerConfiguration {
    /// Server identity, stored as top-level fields
    #[serde(flatten)]
    pub identity: ServerIdentity,
    #[serde(rename = "NetworkConfig")]
    pub network: NetworkConfig,
    #[serde(rename = "PerformanceConfig")]
    pub performance: PerformanceConfig,
    #[serde(rename = "SecurityConfig")]
    pub security: SecurityConfig,
    #[serde(rename = "LoggingConfig")]
    pub logging: LoggingConfig,
    #[serde(rename = "GameplayConfig", default)]
    pub gameplay: GameplayConfig,
    #[serde(rename = "MonitoringConfig", default)]
    pub monitoring: MonitoringConfig,
}

/// Descriptive identity of the server instance.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ServerIdentity {
    pub server_name: String,
    pub server_description: String,
    pub server_version: String,
    pub admin_contact: String,
    pub region: String,
}

/// Listener and transport settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkConfig {
    /// Address to bind, "0.0.0.0" for all interfaces
    #[serde(rename = "ServerIP")]
    pub server_ip: String,
    /// Kept signed so out-of-range values survive parsing and fail validation
    pub server_port: i32,
    /// Upper bound on connected players, also used as the listen backlog
    pub max_connections: i32,
    pub tick_rate: i32,
    /// Seconds of silence before a client is considered gone
    pub client_timeout: f32,
    pub enable_compression: bool,
    pub enable_encryption: bool,
    /// Socket send buffer target in bytes
    pub send_buffer_size: i32,
    /// Socket receive buffer target in bytes
    pub receive_buffer_size: i32,
}

/// Resource limits.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PerformanceConfig {
    #[serde(rename = "MaxCPUUsage")]
    pub max_cpu_usage: f32,
    /// Megabytes
    pub max_memory_usage: i32,
    pub max_concurrent_sessions: i32,
    pub enable_object_pooling: bool,
    /// Seconds between auto-optimization passes (frame budget check and memory reclaim)
    pub garbage_collection_interval: f32,
}

/// How connecting players prove their identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AuthMethod {
    #[default]
    None,
    Basic,
    Token,
}

impl TryFrom<u8> for AuthMethod {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AuthMethod::None),
            1 => Ok(AuthMethod::Basic),
            2 => Ok(AuthMethod::Token),
            other => Err(format!("Unknown AuthMethod ordinal {other}")),
        }
    }
}

impl From<AuthMethod> for u8 {
    fn from(method: AuthMethod) -> Self {
        match method {
            AuthMethod::None => 0,
            AuthMethod::Basic => 1,
            AuthMethod::Token => 2,
        }
    }
}

/// Authentication and abuse-prevention settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityConfig {
    pub auth_method: AuthMethod,
    pub enable_anti_cheat: bool,
    pub enable_rate_limiting: bool,
    pub max_requests_per_minute: i32,
    /// Seconds a Basic token timestamp stays acceptable
    pub token_validity_duration: i32,
    /// Append-only security event log
    pub security_log_path: String,
}

/// Log verbosity, written as its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    Warning,
    #[default]
    Info,
    Verbose,
    VeryVerbose,
}

impl LogLevel {
    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(LogLevel::Error),
            1 => Some(LogLevel::Warning),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Verbose),
            4 => Some(LogLevel::VeryVerbose),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Equivalent `tracing` filter directive.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Verbose => "debug",
            LogLevel::VeryVerbose => "trace",
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        LogLevel::from_ordinal(value)
            .ok_or_else(|| de::Error::custom(format!("Unknown LogLevel ordinal {value}")))
    }
}

/// Log output settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LoggingConfig {
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_to_console: bool,
    pub log_file_path: String,
    /// Megabytes
    pub max_log_file_size: i32,
}

/// Session rules.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GameplayConfig {
    pub default_game_mode: String,
    pub max_players_per_session: i32,
    /// Seconds before a running session is ended by cleanup
    pub max_session_duration: f32,
    /// Seconds of connection after which a player is evicted
    pub player_timeout_seconds: f32,
    pub enable_friendly_fire: bool,
}

/// Metrics sampling and alerting.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoringConfig {
    pub enable_performance_monitoring: bool,
    /// Seconds between metrics samples
    pub metrics_collection_interval: f32,
    pub enable_alerts: bool,
    #[serde(rename = "CPUAlertThreshold")]
    pub cpu_alert_threshold: f32,
    /// Megabytes
    pub memory_alert_threshold: f32,
    /// Milliseconds
    pub latency_alert_threshold: f32,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            server_name: "Dedicated Server".to_string(),
            server_description: "Cooperative dungeon server".to_string(),
            server_version: "1.0.0".to_string(),
            admin_contact: "admin@localhost".to_string(),
            region: "Global".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_ip: "0.0.0.0".to_string(),
            server_port: 7777,
            max_connections: 100,
            tick_rate: 60,
            client_timeout: 30.0,
            enable_compression: false,
            enable_encryption: false,
            send_buffer_size: 256 * 1024,
            receive_buffer_size: 256 * 1024,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_cpu_usage: 80.0,
            max_memory_usage: 4096,
            max_concurrent_sessions: 50,
            enable_object_pooling: true,
            garbage_collection_interval: 60.0,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            auth_method: AuthMethod::None,
            enable_anti_cheat: false,
            enable_rate_limiting: true,
            max_requests_per_minute: 60,
            token_validity_duration: 3600,
            security_log_path: "logs/security.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_to_file: false,
            log_to_console: true,
            log_file_path: "logs/server.log".to_string(),
            max_log_file_size: 100,
        }
    }
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            default_game_mode: "Coop".to_string(),
            max_players_per_session: 4,
            max_session_duration: 7200.0,
            player_timeout_seconds: 300.0,
            enable_friendly_fire: false,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_performance_monitoring: true,
            metrics_collection_interval: 5.0,
            enable_alerts: true,
            cpu_alert_threshold: 90.0,
            memory_alert_threshold: 3072.0,
            latency_alert_threshold: 200.0,
        }
    }
}
