//! veildump engine.
//!
//! Logical backup and data masking for PostgreSQL. A dump produces a
//! directory-format archive bit-compatible with the native tooling, with
//! configured columns passed through transformer chains on the way out;
//! restore replays such archives; validate shows original-vs-transformed
//! diffs on a bounded row sample.
//!
//! # Architecture
//!
//! - [`catalog`] - introspection and dump planning (frozen TOC + tasks)
//! - [`dump`] - worker-pool orchestration and the per-table row driver
//! - [`restore`] - dependency-ordered replay of an archive
//! - [`validate`] - capped paired-line dumps rendered as diff documents
//! - [`archive`] - archive inventory under a storage root
//! - [`db`] - the narrow database contract and its PostgreSQL and mock
//!   implementations
//! - [`config`] - file-based configuration
//!
//! The heavy lifting below these modules lives in the sibling crates:
//! `veildump-core` (COPY codec), `veildump-toc` (TOC codec),
//! `veildump-storage` (archive storage), `veildump-transform`
//! (transformers), and `veildump-subset` (subset SQL synthesis).

pub mod archive;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod db;
pub mod dump;
mod error;
pub mod restore;
pub mod validate;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{Error, Result};

pub use veildump_core::{Column, Row, RowValue, Severity, TypeCategory, ValidationWarning};
pub use veildump_storage::{DirectoryStorage, MemoryStorage, Storage};
pub use veildump_transform::TransformerRegistry;
