//! Configuration errors.

use std::path::PathBuf;

/// Error type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The config document is not valid JSON for the schema
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The config parsed but holds an unusable value
    #[error("invalid config: {0}")]
    Invalid(String),
}
