//! Error types for merge-sentry

use thiserror::Error;

/// Main error type for merge-sentry operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Backup failed for {path}: {reason}")]
    Backup { path: String, reason: String },

    #[error("Merge failed for group '{group}': {reason}")]
    Merge { group: String, reason: String },

    #[error("Watch setup failed: {reason}")]
    WatchSetup { reason: String },

    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },
}

/// Result type alias for merge-sentry operations
pub type Result<T> = std::result::Result<T, Error>;
