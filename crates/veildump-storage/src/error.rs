//! Error types for the storage crate.

use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The key is not acceptable to the backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An I/O error occurred, annotated with the key being accessed.
    #[error("io error on {key:?}: {source}")]
    Io {
        /// The key being read or written.
        key: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Wraps an I/O error with the key it happened on.
    #[must_use]
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { key: key.into(), source }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
