//! Error types for the subset crate.

use thiserror::Error;

/// Errors that can occur building subset queries.
#[derive(Debug, Error)]
pub enum SubsetError {
    /// A node index does not exist in the graph.
    #[error("unknown table index {0}")]
    UnknownTable(usize),

    /// A table in the reachable component has no primary key; the
    /// reachability set cannot be keyed without one.
    #[error("table {schema}.{name} has no primary key; subset requires one")]
    NoPrimaryKey {
        /// Schema of the table.
        schema: String,
        /// Name of the table.
        name: String,
    },

    /// A foreign key was declared with mismatched column lists.
    #[error("foreign key column lists differ in length ({from} vs {to})")]
    ColumnCountMismatch {
        /// Referencing column count.
        from: usize,
        /// Referenced column count.
        to: usize,
    },
}

/// Result type for subset operations.
pub type SubsetResult<T> = Result<T, SubsetError>;
