//! Error types for layerdb

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for layerdb
#[derive(Error, Debug)]
pub enum LayerdbError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A storage operation was given a name that is missing one of its parts
    #[error("name is not fully qualified: {0}")]
    Unqualified(String),

    /// A name (or a path parsed back into a name) has invalid parts
    #[error("invalid model name: {0}")]
    InvalidName(String),

    /// A layer digest is not of the form `sha256:<64 hex>`
    #[error("invalid digest format: {0}")]
    InvalidDigest(String),

    /// The manifest file for a name does not exist
    #[error("manifest not found: {name}")]
    ManifestNotFound {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The manifest file exists but is not a valid manifest document
    #[error("failed to decode manifest {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A registry scan aborted on one of its candidates
    #[error("{context}: {source}")]
    Scan {
        context: String,
        #[source]
        source: Box<LayerdbError>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LayerdbError {
    /// Whether this error means "the manifest was never stored" as opposed to
    /// a corrupt or unreadable one.
    pub fn is_not_found(&self) -> bool {
        match self {
            LayerdbError::ManifestNotFound { .. } => true,
            LayerdbError::Scan { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether this error means a stored document could not be decoded.
    pub fn is_corrupt(&self) -> bool {
        match self {
            LayerdbError::Decode { .. } => true,
            LayerdbError::Scan { source, .. } => source.is_corrupt(),
            _ => false,
        }
    }
}

/// Result type for layerdb operations
pub type LayerdbResult<T> = Result<T, LayerdbError>;

impl From<serde_json::Error> for LayerdbError {
    fn from(err: serde_json::Error) -> Self {
        LayerdbError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LayerdbError {
    fn from(err: toml::de::Error) -> Self {
        LayerdbError::Config(format!("Failed to parse config: {}", err))
    }
}
