//! Error types for MTA Config
//!
//! Provides error handling for:
//! - Option validation against the schema
//! - Persistence of configuration records
//! - Session manager availability

use crate::types::ConfigId;
use std::path::PathBuf;

/// Main configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration does not exist
    #[error("configuration not found: {0}")]
    NotFound(ConfigId),

    /// Option rejected by the schema
    #[error("invalid option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    /// Durability failure after a mutation
    #[error("persist failed: {0}")]
    Persist(#[from] PersistError),

    /// The session manager actor has stopped
    #[error("session manager for {0} is closed")]
    ManagerClosed(ConfigId),

    /// Client session already disposed
    #[error("client session is disposed")]
    SessionDisposed,

    /// Malformed wire message
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ConfigError {
    /// Create invalid option error
    pub fn invalid_option(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Check if error left in-memory state untouched
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidOption { .. } | Self::NotFound(_) | Self::Protocol(_)
        )
    }
}

/// Errors while saving or loading configuration records
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// IO error on the record file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded or decoded
    #[error("malformed record: {0}")]
    Serde(#[from] serde_json::Error),

    /// Backend refused the write
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl PersistError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
