//! Error types for the veildump engine.

use thiserror::Error;

/// Errors that can occur running a dump, restore, or validation pass.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration error occurred.
    #[error("configuration error: {0}")]
    Config(String),

    /// A row-level codec or accessor failure.
    #[error(transparent)]
    Core(#[from] veildump_core::CoreError),

    /// A storage failure. Always fatal for the archive being written.
    #[error("storage error: {0}")]
    Storage(#[from] veildump_storage::StorageError),

    /// A TOC read or write failure.
    #[error("toc error: {0}")]
    Toc(#[from] veildump_toc::TocError),

    /// A transformer registration, binding, or execution failure.
    #[error("transform error: {0}")]
    Transform(#[from] veildump_transform::TransformError),

    /// A subset-engine failure.
    #[error("subset error: {0}")]
    Subset(#[from] veildump_subset::SubsetError),

    /// A database failure.
    #[error("database error: {0}")]
    Database(String),

    /// A row failed to process, annotated with its position.
    #[error("table {table}, row {row_ordinal}{}: {reason}", transformer.as_ref().map(|t| format!(", transformer {t:?}")).unwrap_or_default())]
    Row {
        /// Qualified table name.
        table: String,
        /// One-based ordinal of the row within the stream.
        row_ordinal: u64,
        /// Transformer that failed, when the failure was inside one.
        transformer: Option<String>,
        /// The underlying failure.
        reason: String,
    },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Validation produced error-severity warnings.
    #[error("fatal validation error")]
    ValidationFatal,

    /// An I/O failure outside storage.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this error: 2 for configuration problems,
    /// 3 for fatal validation, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::ValidationFatal => 3,
            _ => 1,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
