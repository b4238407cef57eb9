//! Per-category configuration validators.
//!
//! Each validator returns the list of human-readable problems it found; an
//! empty list means the category is valid. Bounds are inclusive on the upper
//! end and exclusive on zero unless noted.

use super::settings::{
    GameplayConfig, LoggingConfig, MonitoringConfig, NetworkConfig, PerformanceConfig,
    SecurityConfig, ServerConfiguration,
};
use std::net::IpAddr;

pub const MAX_CONNECTIONS_LIMIT: i32 = 10_000;
pub const MAX_TICK_RATE: i32 = 120;
pub const MAX_MEMORY_MB: i32 = 32_768;
pub const MAX_TOKEN_VALIDITY_SECS: i32 = 86_400;
pub const MAX_LOG_FILE_SIZE_MB: i32 = 1_000;
pub const MAX_CONCURRENT_SESSIONS_LIMIT: i32 = 1_000;
pub const MAX_PLAYERS_PER_SESSION: i32 = 8;

/// Outcome of validating a whole configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs all six category validators.
pub fn validate_configuration(config: &ServerConfiguration) -> ValidationReport {
    let mut errors = Vec::new();
    errors.extend(network_errors(&config.network));
    errors.extend(performance_errors(&config.performance));
    errors.extend(security_errors(&config.security));
    errors.extend(logging_errors(&config.logging));
    errors.extend(gameplay_errors(&config.gameplay));
    errors.extend(monitoring_errors(&config.monitoring));
    ValidationReport { errors }
}

pub fn validate_network_config(config: &NetworkConfig) -> bool {
    network_errors(config).is_empty()
}

pub fn validate_performance_config(config: &PerformanceConfig) -> bool {
    performance_errors(config).is_empty()
}

pub fn validate_security_config(config: &SecurityConfig) -> bool {
    security_errors(config).is_empty()
}

pub fn validate_logging_config(config: &LoggingConfig) -> bool {
    logging_errors(config).is_empty()
}

pub fn validate_gameplay_config(config: &GameplayConfig) -> bool {
    gameplay_errors(config).is_empty()
}

pub fn validate_monitoring_config(config: &MonitoringConfig) -> bool {
    monitoring_errors(config).is_empty()
}

fn in_range_i32(value: i32, max: i32) -> bool {
    value > 0 && value <= max
}

fn in_range_f32(value: f32, max: f32) -> bool {
    value.is_finite() && value > 0.0 && value <= max
}

pub(crate) fn network_errors(config: &NetworkConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.server_ip.parse::<IpAddr>().is_err() {
        errors.push(format!("Invalid server IP: {}", config.server_ip));
    }
    if !(1..=65535).contains(&config.server_port) {
        errors.push(format!(
            "Server port must be between 1 and 65535, got {}",
            config.server_port
        ));
    }
    if !in_range_i32(config.max_connections, MAX_CONNECTIONS_LIMIT) {
        errors.push(format!(
            "Max connections must be between 1 and {MAX_CONNECTIONS_LIMIT}, got {}",
            config.max_connections
        ));
    }
    if !in_range_i32(config.tick_rate, MAX_TICK_RATE) {
        errors.push(format!(
            "Tick rate must be between 1 and {MAX_TICK_RATE}, got {}",
            config.tick_rate
        ));
    }
    if !in_range_f32(config.client_timeout, 300.0) {
        errors.push(format!(
            "Client timeout must be in (0, 300] seconds, got {}",
            config.client_timeout
        ));
    }
    if config.send_buffer_size <= 0 {
        errors.push("Send buffer size must be positive".to_string());
    }
    if config.receive_buffer_size <= 0 {
        errors.push("Receive buffer size must be positive".to_string());
    }

    errors
}

pub(crate) fn performance_errors(config: &PerformanceConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if !in_range_f32(config.max_cpu_usage, 100.0) {
        errors.push(format!(
            "Max CPU usage must be in (0, 100]%, got {}",
            config.max_cpu_usage
        ));
    }
    if !in_range_i32(config.max_memory_usage, MAX_MEMORY_MB) {
        errors.push(format!(
            "Max memory usage must be in (0, {MAX_MEMORY_MB}] MB, got {}",
            config.max_memory_usage
        ));
    }
    if !in_range_i32(config.max_concurrent_sessions, MAX_CONCURRENT_SESSIONS_LIMIT) {
        errors.push(format!(
            "Max concurrent sessions must be between 1 and {MAX_CONCURRENT_SESSIONS_LIMIT}, got {}",
            config.max_concurrent_sessions
        ));
    }
    if !in_range_f32(config.garbage_collection_interval, 3600.0) {
        errors.push(format!(
            "Garbage collection interval must be in (0, 3600] seconds, got {}",
            config.garbage_collection_interval
        ));
    }

    errors
}

pub(crate) fn security_errors(config: &SecurityConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if !in_range_i32(config.max_requests_per_minute, 10_000) {
        errors.push(format!(
            "Max requests per minute must be between 1 and 10000, got {}",
            config.max_requests_per_minute
        ));
    }
    if !in_range_i32(config.token_validity_duration, MAX_TOKEN_VALIDITY_SECS) {
        errors.push(format!(
            "Token validity must be in (0, {MAX_TOKEN_VALIDITY_SECS}] seconds, got {}",
            config.token_validity_duration
        ));
    }
    if config.security_log_path.trim().is_empty() {
        errors.push("Security log path cannot be empty".to_string());
    }

    errors
}

pub(crate) fn logging_errors(config: &LoggingConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if !config.log_to_file && !config.log_to_console {
        errors.push("At least one of file or console logging must be enabled".to_string());
    }
    if config.log_to_file && config.log_file_path.trim().is_empty() {
        errors.push("Log file path cannot be empty when file logging is enabled".to_string());
    }
    if !in_range_i32(config.max_log_file_size, MAX_LOG_FILE_SIZE_MB) {
        errors.push(format!(
            "Max log file size must be in (0, {MAX_LOG_FILE_SIZE_MB}] MB, got {}",
            config.max_log_file_size
        ));
    }

    errors
}

pub(crate) fn gameplay_errors(config: &GameplayConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.default_game_mode.trim().is_empty() {
        errors.push("Default game mode cannot be empty".to_string());
    }
    if !in_range_i32(config.max_players_per_session, MAX_PLAYERS_PER_SESSION) {
        errors.push(format!(
            "Max players per session must be between 1 and {MAX_PLAYERS_PER_SESSION}, got {}",
            config.max_players_per_session
        ));
    }
    if !in_range_f32(config.max_session_duration, 86_400.0) {
        errors.push(format!(
            "Max session duration must be in (0, 86400] seconds, got {}",
            config.max_session_duration
        ));
    }
    if !in_range_f32(config.player_timeout_seconds, 86_400.0) {
        errors.push(format!(
            "Player timeout must be in (0, 86400] seconds, got {}",
            config.player_timeout_seconds
        ));
    }

    errors
}

pub(crate) fn monitoring_errors(config: &MonitoringConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if !in_range_f32(config.metrics_collection_interval, 3600.0) {
        errors.push(format!(
            "Metrics collection interval must be in (0, 3600] seconds, got {}",
            config.metrics_collection_interval
        ));
    }
    if !in_range_f32(config.cpu_alert_threshold, 100.0) {
        errors.push(format!(
            "CPU alert threshold must be in (0, 100]%, got {}",
            config.cpu_alert_threshold
        ));
    }
    if !in_range_f32(config.memory_alert_threshold, MAX_MEMORY_MB as f32) {
        errors.push(format!(
            "Memory alert threshold must be in (0, {MAX_MEMORY_MB}] MB, got {}",
            config.memory_alert_threshold
        ));
    }
    if !(config.latency_alert_threshold.is_finite() && config.latency_alert_threshold > 0.0) {
        errors.push("Latency alert threshold must be positive".to_string());
    }

    errors
}
