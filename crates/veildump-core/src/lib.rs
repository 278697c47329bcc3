//! veildump core types.
//!
//! This crate holds the pieces every other veildump crate builds on:
//!
//! - [`copy`] - the COPY text format codec and the [`copy::Row`] model with
//!   per-cell mutation tracking
//! - [`column`] - column metadata shared by the catalog and transformers
//! - [`warning`] - validation warnings with canonical hashes
//!
//! # Error Handling
//!
//! All operations return [`CoreResult<T>`], an alias for
//! `Result<T, CoreError>`.

pub mod column;
pub mod copy;
pub mod error;
pub mod warning;

pub use column::{Column, TypeCategory};
pub use copy::{Row, RowValue};
pub use error::{CoreError, CoreResult};
pub use warning::{is_fatal, suppress_resolved, Severity, ValidationWarning};
