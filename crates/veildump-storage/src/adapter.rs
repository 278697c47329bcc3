//! Storage adapter traits.
//!
//! An archive is a directory-like namespace of objects (`toc.dat`,
//! `<DumpId>.dat.gz`, `metadata.json`). The [`Storage`] trait abstracts over
//! where that namespace lives so the dump and restore paths never touch the
//! filesystem directly, and tests can run against an in-memory backend.
//!
//! Writers are atomic at key granularity: until [`ObjectWriter::commit`]
//! returns, the object is not visible under its key, and a dropped writer
//! leaves nothing behind. The TOC is written last during a dump, so a
//! readable `toc.dat` implies every data object it references is durable.

use std::io::{Read, Write};

use crate::error::StorageResult;

/// Names found at one level of a storage namespace.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Object keys at this level.
    pub files: Vec<String>,
    /// Child namespace names (no trailing separator).
    pub dirs: Vec<String>,
}

/// A writer for a single object.
///
/// Data becomes visible under the key only after a successful `commit`.
pub trait ObjectWriter: Write + Send {
    /// Makes the written object durable and visible.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`](crate::StorageError::Io) if the flush or
    /// publish step fails; the object does not appear in that case.
    fn commit(self: Box<Self>) -> StorageResult<()>;
}

/// A directory-like object store.
///
/// Implementations must be thread-safe: dump workers write distinct objects
/// concurrently through the same storage handle.
pub trait Storage: Send + Sync {
    /// Opens an object for reading.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) if
    /// the key does not exist.
    fn get(&self, key: &str) -> StorageResult<Box<dyn Read + Send>>;

    /// Opens an atomic writer for an object, replacing any existing value on
    /// commit.
    fn put(&self, key: &str) -> StorageResult<Box<dyn ObjectWriter>>;

    /// Lists objects and child namespaces whose names start with `prefix`.
    /// An empty prefix lists everything at this level.
    fn list(&self, prefix: &str) -> StorageResult<Listing>;

    /// Deletes an object. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Returns `true` if the key exists.
    fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Returns a storage rooted at the child namespace `prefix`.
    ///
    /// With `create_if_missing` the namespace is created eagerly; otherwise
    /// a missing namespace is reported on first access.
    fn sub_storage(&self, prefix: &str, create_if_missing: bool) -> StorageResult<Box<dyn Storage>>;

    /// Removes every object and child namespace under this storage.
    ///
    /// Used to clean up a partial archive after a failed dump.
    fn delete_all(&self) -> StorageResult<()>;
}

/// Validates that a key stays inside its namespace.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`](crate::StorageError::InvalidKey) for
/// empty keys, absolute paths, and `..` segments.
pub fn validate_key(key: &str) -> StorageResult<()> {
    use crate::error::StorageError;

    if key.is_empty() {
        return Err(StorageError::InvalidKey { key: key.into(), reason: "empty".into() });
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey { key: key.into(), reason: "absolute path".into() });
    }
    if key.split('/').any(|seg| seg == "..") {
        return Err(StorageError::InvalidKey {
            key: key.into(),
            reason: "parent traversal".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(validate_key("toc.dat").is_ok());
        assert!(validate_key("sub/1.dat.gz").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("a/../b").is_err());
    }
}
