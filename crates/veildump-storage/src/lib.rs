//! veildump storage.
//!
//! This crate provides the archive storage abstraction and its backends.
//!
//! # Overview
//!
//! A dump writes a handful of objects (`toc.dat`, one `<DumpId>.dat.gz` per
//! data entry, `metadata.json`) into a directory-like namespace; a restore
//! reads them back. The [`Storage`] trait captures exactly the capability
//! set those paths need: get, atomic put, list, delete, and sub-namespaces.
//!
//! # Backends
//!
//! - [`backends::DirectoryStorage`] - plain filesystem directories
//! - [`backends::MemoryStorage`] - process-local map, used by tests

pub mod adapter;
pub mod backends;
mod error;

pub use adapter::{Listing, ObjectWriter, Storage};
pub use backends::{DirectoryStorage, MemoryStorage};
pub use error::{StorageError, StorageResult};
