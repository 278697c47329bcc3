//! Database contract.
//!
//! The engine depends on a narrow connection interface: execute SQL, read
//! catalog rows as text, and stream COPY data in both directions. The
//! production implementation wraps a PostgreSQL client; tests use
//! [`mock::MockDb`] and never need a server.

pub mod mock;
pub mod postgres;

use std::io::Read;

use crate::error::Result;

/// One database connection.
///
/// Connections are not shared: every dump or restore worker owns its own,
/// obtained from a [`Connector`].
pub trait DbConn: Send {
    /// Executes one statement, returning the affected row count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) on failure.
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Executes a multi-statement batch (transaction control and the like).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) on failure.
    fn batch_execute(&mut self, sql: &str) -> Result<()>;

    /// Runs a query, returning every cell as text. Queries used for
    /// introspection cast their columns to `text` explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) on failure.
    fn query_rows(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>>;

    /// Starts `COPY ... TO STDOUT`, returning the raw data stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) on failure.
    fn copy_out<'a>(&'a mut self, sql: &str) -> Result<Box<dyn Read + 'a>>;

    /// Runs `COPY ... FROM STDIN`, feeding it `data`, returning the row
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) on failure.
    fn copy_in(&mut self, sql: &str, data: &mut dyn Read) -> Result<u64>;
}

/// Creates connections for workers.
pub trait Connector: Send + Sync {
    /// Opens a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`](crate::Error::Database) on failure.
    fn connect(&self) -> Result<Box<dyn DbConn>>;
}
