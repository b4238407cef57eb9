//! Configuration store for the dedicated server
//!
//! Holds the typed [`ServerConfiguration`], caches its validation result, and
//! persists it as JSON. Every mutation goes through a method that either
//! validates the incoming value first or invalidates the cache, so a stale
//! "valid" answer is never returned.

pub mod presets;
pub mod settings;
pub mod validation;

pub use settings::{
    AuthMethod, GameplayConfig, LogLevel, LoggingConfig, MonitoringConfig, NetworkConfig,
    PerformanceConfig, SecurityConfig, ServerConfiguration, ServerIdentity,
};
pub use validation::{
    validate_configuration, validate_gameplay_config, validate_logging_config,
    validate_monitoring_config, validate_network_config, validate_performance_config,
    validate_security_config, ValidationReport,
};

use crate::error::ConfigError;
use crate::types::ServerEnvironment;
use std::path::Path;
use tracing::{debug, info, warn};

impl ServerConfiguration {
    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` if the file does not exist
    /// * `ConfigError::Read` / `ConfigError::Parse` for I/O or JSON problems
    /// * `ConfigError::Invalid` if the parsed values fail validation
    pub async fn read_from(path: &Path) -> Result<Self, ConfigError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: ServerConfiguration = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;

        let report = validate_configuration(&config);
        if !report.is_valid() {
            return Err(ConfigError::Invalid(report.errors));
        }
        Ok(config)
    }

    /// Writes the configuration as pretty JSON, creating parent directories.
    ///
    /// Does not validate; use [`ConfigStore::save`] for the checked path.
    pub async fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::Write(path.to_path_buf(), e))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ConfigError::Write(path.to_path_buf(), e))
    }
}

/// Typed configuration with a cached validation result.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    config: ServerConfiguration,
    validation: Option<ValidationReport>,
}

impl ConfigStore {
    pub fn new(config: ServerConfiguration) -> Self {
        Self {
            config,
            validation: None,
        }
    }

    pub fn config(&self) -> &ServerConfiguration {
        &self.config
    }

    /// Validates all categories, reusing the cached result when nothing changed.
    pub fn validate(&mut self) -> bool {
        self.report().is_valid()
    }

    /// Human-readable problems found by the last validation.
    pub fn validation_errors(&mut self) -> Vec<String> {
        self.report().errors.clone()
    }

    /// Whether a validation result is currently cached.
    pub fn is_validation_cached(&self) -> bool {
        self.validation.is_some()
    }

    fn report(&mut self) -> &ValidationReport {
        self.validation
            .get_or_insert_with(|| validate_configuration(&self.config))
    }

    fn invalidate(&mut self) {
        self.validation = None;
    }

    /// Loads configuration from `path`, replacing the current one only on success.
    pub async fn load(&mut self, path: &Path) -> Result<(), ConfigError> {
        match ServerConfiguration::read_from(path).await {
            Ok(config) => {
                self.install(config)?;
                info!("Loaded server configuration from {}", path.display());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load configuration from {}: {}", path.display(), e);
                Err(e)
            }
        }
    }

    /// Saves the configuration to `path`. Invalid configurations are refused.
    pub async fn save(&mut self, path: &Path) -> Result<(), ConfigError> {
        let snapshot = self.checked_snapshot()?;
        snapshot.write_to(path).await?;
        info!("Saved server configuration to {}", path.display());
        Ok(())
    }

    /// Replaces the whole configuration if it validates.
    pub fn install(&mut self, config: ServerConfiguration) -> Result<(), ConfigError> {
        let report = validate_configuration(&config);
        if !report.is_valid() {
            return Err(ConfigError::Invalid(report.errors));
        }
        self.config = config;
        self.validation = Some(report);
        Ok(())
    }

    /// Clone of the configuration, or the validation errors if it is invalid.
    pub fn checked_snapshot(&mut self) -> Result<ServerConfiguration, ConfigError> {
        let report = self.report();
        if !report.is_valid() {
            return Err(ConfigError::Invalid(report.errors.clone()));
        }
        Ok(self.config.clone())
    }

    /// Applies the hardcoded preset for `environment` in place.
    pub fn apply_environment(&mut self, environment: ServerEnvironment) {
        presets::apply_preset(&mut self.config, environment);
        self.invalidate();
        debug!("Applied {} environment preset", environment);
    }

    pub fn reset_to_defaults(&mut self) {
        self.config = ServerConfiguration::default();
        self.invalidate();
    }

    pub fn update_identity(&mut self, identity: ServerIdentity) {
        self.config.identity = identity;
        self.invalidate();
    }

    pub fn update_network_config(&mut self, network: NetworkConfig) -> Result<(), ConfigError> {
        check(validation::network_errors(&network))?;
        self.config.network = network;
        self.invalidate();
        Ok(())
    }

    pub fn update_performance_config(
        &mut self,
        performance: PerformanceConfig,
    ) -> Result<(), ConfigError> {
        check(validation::performance_errors(&performance))?;
        self.config.performance = performance;
        self.invalidate();
        Ok(())
    }

    pub fn update_security_config(&mut self, security: SecurityConfig) -> Result<(), ConfigError> {
        check(validation::security_errors(&security))?;
        self.config.security = security;
        self.invalidate();
        Ok(())
    }

    pub fn update_logging_config(&mut self, logging: LoggingConfig) -> Result<(), ConfigError> {
        check(validation::logging_errors(&logging))?;
        self.config.logging = logging;
        self.invalidate();
        Ok(())
    }

    pub fn update_gameplay_config(&mut self, gameplay: GameplayConfig) -> Result<(), ConfigError> {
        check(validation::gameplay_errors(&gameplay))?;
        self.config.gameplay = gameplay;
        self.invalidate();
        Ok(())
    }

    pub fn update_monitoring_config(
        &mut self,
        monitoring: MonitoringConfig,
    ) -> Result<(), ConfigError> {
        check(validation::monitoring_errors(&monitoring))?;
        self.config.monitoring = monitoring;
        self.invalidate();
        Ok(())
    }
}

fn check(errors: Vec<String>) -> Result<(), ConfigError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("server.json");

        let mut original = ConfigStore::default();
        original.apply_environment(ServerEnvironment::Staging);
        let mut network = original.config().network.clone();
        network.server_port = 9123;
        network.client_timeout = 12.5;
        original.update_network_config(network).unwrap();
        original.update_identity(ServerIdentity {
            server_name: "Round Trip".to_string(),
            ..Default::default()
        });
        original.save(&path).await.unwrap();

        let mut loaded = ConfigStore::default();
        loaded.load(&path).await.unwrap();

        assert!(loaded.validate());
        assert_eq!(loaded.config(), original.config());
    }

    #[tokio::test]
    async fn test_load_missing_file_keeps_config() {
        let dir = TempDir::new().unwrap();
        let mut store = ConfigStore::default();
        store.apply_environment(ServerEnvironment::Production);
        let before = store.config().clone();

        let result = store.load(&dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
        assert_eq!(store.config(), &before);
    }

    #[tokio::test]
    async fn test_load_malformed_file_keeps_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let mut store = ConfigStore::default();
        let before = store.config().clone();
        let result = store.load(&path).await;

        assert!(matches!(result, Err(ConfigError::Parse(_, _))));
        assert_eq!(store.config(), &before);
    }

    #[tokio::test]
    async fn test_load_invalid_values_keeps_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invalid.json");

        let mut bad = ServerConfiguration::default();
        bad.network.server_port = 70000;
        bad.write_to(&path).await.unwrap();

        let mut store = ConfigStore::default();
        let result = store.load(&path).await;

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert_eq!(store.config().network.server_port, 7777);
    }

    #[tokio::test]
    async fn test_save_refuses_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("refused.json");

        let mut config = ServerConfiguration::default();
        config.performance.max_memory_usage = 0;
        let mut store = ConfigStore::new(config);

        assert!(matches!(store.save(&path).await, Err(ConfigError::Invalid(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_update_rejects_without_mutation() {
        let mut store = ConfigStore::default();
        let mut network = store.config().network.clone();
        network.tick_rate = 500;

        assert!(store.update_network_config(network).is_err());
        assert_eq!(store.config().network.tick_rate, 60);
    }

    #[test]
    fn test_validation_cache_invalidated_by_setters() {
        let mut store = ConfigStore::default();
        assert!(!store.is_validation_cached());
        assert!(store.validate());
        assert!(store.is_validation_cached());

        store.apply_environment(ServerEnvironment::LoadTest);
        assert!(!store.is_validation_cached());
        assert!(store.validate());

        store.reset_to_defaults();
        assert!(!store.is_validation_cached());
    }

    #[test]
    fn test_validation_errors_are_reported() {
        let mut config = ServerConfiguration::default();
        config.network.max_connections = 0;
        let mut store = ConfigStore::new(config);

        assert!(!store.validate());
        let errors = store.validation_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Max connections"));
    }
}
