//! Connection settings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::MAX_SIGN_CHUNK_SIZE;

/// Error loading a [`ConnectionConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one device connection.
///
/// Every field has a default, so a YAML document only needs the keys it
/// changes:
///
/// ```yaml
/// app_name: field-logger
/// extra_timeout_ms: 2500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Name sent in `AppStart`.
    pub app_name: String,
    pub app_version: u8,
    /// Protocol version requested by `DeviceQuery`.
    pub app_target_version: u8,
    /// Margin added to the device's own delivery estimate, in milliseconds.
    pub extra_timeout_ms: u64,
    /// Bytes per `SignData` command.
    pub sign_chunk_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            app_name: "meshcore-companion".to_string(),
            app_version: 1,
            app_target_version: 3,
            extra_timeout_ms: 1000,
            sign_chunk_size: MAX_SIGN_CHUNK_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Parse from a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: ConnectionConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.is_empty() {
            return Err(ConfigError::Invalid("app_name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn extra_timeout(&self) -> Duration {
        Duration::from_millis(self.extra_timeout_ms)
    }

    /// Chunk size clamped to what `SignData` accepts.
    pub fn sign_chunk_size(&self) -> usize {
        self.sign_chunk_size.clamp(1, MAX_SIGN_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.app_target_version, 3);
        assert_eq!(config.extra_timeout(), Duration::from_secs(1));
        assert_eq!(config.sign_chunk_size(), 128);
    }

    #[test]
    fn test_partial_yaml() {
        let config = ConnectionConfig::from_yaml("app_name: field-logger\nextra_timeout_ms: 2500\n")
            .unwrap();
        assert_eq!(config.app_name, "field-logger");
        assert_eq!(config.extra_timeout_ms, 2500);
        assert_eq!(config.app_version, 1);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = ConnectionConfig {
            sign_chunk_size: 64,
            ..ConnectionConfig::default()
        };
        let text = serde_yaml::to_string(&config).unwrap();
        assert_eq!(ConnectionConfig::from_yaml(&text).unwrap(), config);
    }

    #[test]
    fn test_chunk_size_is_clamped() {
        let mut config = ConnectionConfig {
            sign_chunk_size: 0,
            ..ConnectionConfig::default()
        };
        assert_eq!(config.sign_chunk_size(), 1);
        config.sign_chunk_size = 4096;
        assert_eq!(config.sign_chunk_size(), MAX_SIGN_CHUNK_SIZE);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            ConnectionConfig::from_yaml("extra_timeout_ms: soon"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ConnectionConfig::from_yaml("app_name: ''"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
