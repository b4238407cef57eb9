//! Hardcoded environment presets.

use super::settings::{AuthMethod, LogLevel, ServerConfiguration};
use crate::types::ServerEnvironment;

/// Overwrites the preset-controlled fields of `config` for `environment`.
///
/// Fields a preset does not mention keep their current values.
pub fn apply_preset(config: &mut ServerConfiguration, environment: ServerEnvironment) {
    let network = &mut config.network;
    let performance = &mut config.performance;
    let security = &mut config.security;
    let logging = &mut config.logging;
    let monitoring = &mut config.monitoring;

    match environment {
        ServerEnvironment::Development => {
            network.max_connections = 16;
            network.tick_rate = 30;
            network.enable_compression = false;
            network.enable_encryption = false;
            performance.max_concurrent_sessions = 10;
            security.auth_method = AuthMethod::None;
            security.enable_anti_cheat = false;
            security.enable_rate_limiting = false;
            logging.log_level = LogLevel::Verbose;
            logging.log_to_file = false;
            logging.log_to_console = true;
            monitoring.cpu_alert_threshold = 70.0;
            monitoring.memory_alert_threshold = 2048.0;
            monitoring.metrics_collection_interval = 10.0;
        }
        ServerEnvironment::Staging => {
            network.max_connections = 500;
            network.tick_rate = 60;
            network.enable_compression = true;
            network.enable_encryption = true;
            performance.max_concurrent_sessions = 100;
            security.auth_method = AuthMethod::Basic;
            security.enable_anti_cheat = true;
            security.enable_rate_limiting = true;
            security.max_requests_per_minute = 120;
            logging.log_level = LogLevel::Info;
            logging.log_to_file = true;
            monitoring.cpu_alert_threshold = 85.0;
            monitoring.memory_alert_threshold = 4096.0;
            monitoring.metrics_collection_interval = 5.0;
        }
        ServerEnvironment::Production => {
            network.max_connections = 10_000;
            network.tick_rate = 60;
            network.enable_compression = true;
            network.enable_encryption = true;
            performance.max_concurrent_sessions = 500;
            security.auth_method = AuthMethod::Token;
            security.enable_anti_cheat = true;
            security.enable_rate_limiting = true;
            security.max_requests_per_minute = 60;
            logging.log_level = LogLevel::Warning;
            logging.log_to_file = true;
            monitoring.cpu_alert_threshold = 95.0;
            monitoring.memory_alert_threshold = 8192.0;
            monitoring.metrics_collection_interval = 5.0;
        }
        ServerEnvironment::LoadTest => {
            network.max_connections = 10_000;
            network.tick_rate = 120;
            network.enable_compression = true;
            network.enable_encryption = false;
            performance.max_concurrent_sessions = 1000;
            security.auth_method = AuthMethod::None;
            security.enable_anti_cheat = false;
            security.enable_rate_limiting = false;
            logging.log_level = LogLevel::Error;
            logging.log_to_file = false;
            logging.log_to_console = true;
            monitoring.cpu_alert_threshold = 99.0;
            monitoring.memory_alert_threshold = 16384.0;
            monitoring.metrics_collection_interval = 1.0;
        }
    }
}
