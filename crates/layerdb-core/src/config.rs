//! Configuration types for layerdb

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides the configured models path
pub const MODELS_ENV: &str = "LAYERDB_MODELS";

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// API server configuration
    pub api: ApiConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl DaemonConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::LayerdbError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::LayerdbError::Config(format!("Failed to read config file: {}", e))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind the REST API server
    pub rest_address: String,
    /// Port for the REST API server
    pub rest_port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rest_address: "127.0.0.1".to_string(),
            rest_port: 9090,
            cors_enabled: false,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the model store; manifests and blobs live beneath it
    pub models_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            models_path: default_models_path(),
        }
    }
}

impl StorageConfig {
    /// Apply the `LAYERDB_MODELS` override, if set and non-empty.
    pub fn with_env_override(mut self) -> Self {
        if let Some(path) = std::env::var_os(MODELS_ENV).filter(|p| !p.is_empty()) {
            self.models_path = PathBuf::from(path);
        }
        self
    }
}

/// `$HOME/.layerdb/models`, or a system path when there is no home directory.
pub fn default_models_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".layerdb").join("models"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/layerdb/models"))
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, or any `RUST_LOG`-style filter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_daemon_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.api.rest_port, 9090);
        assert_eq!(config.logging.level, "info");
        assert!(config.storage.models_path.ends_with("models"));
    }

    #[test]
    fn test_daemon_config_parse() {
        let toml_str = r#"
[api]
rest_address = "0.0.0.0"
rest_port = 11434

[storage]
models_path = "/srv/models"
"#;
        let config: DaemonConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.rest_address, "0.0.0.0");
        assert_eq!(config.api.rest_port, 11434);
        assert_eq!(config.storage.models_path, PathBuf::from("/srv/models"));
        // Sections left out fall back to defaults
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_daemon_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layerdb.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = DaemonConfig::from_file(&path).unwrap();
        assert_eq!(config.logging.level, "debug");

        let missing = DaemonConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(crate::LayerdbError::Config(_))));

        std::fs::write(&path, "[api]\nrest_port = \"not a port\"\n").unwrap();
        let invalid = DaemonConfig::from_file(&path).unwrap_err();
        assert!(matches!(invalid, crate::LayerdbError::Config(_)));
        assert!(invalid.to_string().contains("Failed to parse config"));
    }
}
