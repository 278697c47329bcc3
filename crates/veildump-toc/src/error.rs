//! Error types for the TOC crate.

use thiserror::Error;

/// Errors that can occur reading or writing a TOC.
#[derive(Debug, Error)]
pub enum TocError {
    /// The file does not start with the `PGDMP` magic.
    #[error("not a dump table of contents (bad magic)")]
    BadMagic,

    /// The TOC declares a layout this reader does not handle.
    #[error("unsupported table of contents: {0}")]
    Unsupported(String),

    /// The TOC is structurally damaged.
    #[error("corrupt table of contents: {0}")]
    Corrupt(String),

    /// An underlying I/O failure.
    #[error("toc io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for TOC operations.
pub type TocResult<T> = Result<T, TocError>;
