//! Error types for the transform crate.

use thiserror::Error;

/// Errors that can occur registering, binding, or running transformers.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A transformer with this name is already registered.
    #[error("transformer {0:?} is already registered")]
    DuplicateRegistration(String),

    /// No transformer with this name is registered.
    #[error("unknown transformer {0:?}")]
    UnknownTransformer(String),

    /// A parameter value was missing or malformed.
    #[error("parameter {parameter:?}: {reason}")]
    Parameter {
        /// The parameter name.
        parameter: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A transformer failed while processing a row.
    #[error("transformer {transformer:?} failed: {reason}")]
    Failure {
        /// The transformer name.
        transformer: String,
        /// The failure description.
        reason: String,
    },

    /// The external transformer protocol was violated.
    #[error("external transformer protocol error: {0}")]
    Protocol(String),

    /// A row operation failed.
    #[error(transparent)]
    Row(#[from] veildump_core::CoreError),

    /// An I/O failure talking to an external transformer.
    #[error("transformer io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformError {
    /// Creates a row-processing failure for the named transformer.
    #[must_use]
    pub fn failure(transformer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failure { transformer: transformer.into(), reason: reason.into() }
    }

    /// Creates a parameter error.
    #[must_use]
    pub fn parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parameter { parameter: parameter.into(), reason: reason.into() }
    }
}

/// Result type for transform operations.
pub type TransformResult<T> = Result<T, TransformError>;
