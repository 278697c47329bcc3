//! Filesystem-backed storage.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::adapter::{validate_key, Listing, ObjectWriter, Storage};
use crate::error::{StorageError, StorageResult};

/// Counter distinguishing concurrent staging files within one process.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Storage rooted at a filesystem directory.
///
/// Objects are plain files; child namespaces are subdirectories. Writes are
/// staged to a hidden temp file in the same directory and renamed into place
/// on commit, which is atomic on POSIX filesystems.
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    /// Opens storage at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StorageError::io(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    /// The root path of this storage.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl Storage for DirectoryStorage {
    fn get(&self, key: &str) -> StorageResult<Box<dyn Read + Send>> {
        let path = self.object_path(key)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_owned()))
            }
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn put(&self, key: &str) -> StorageResult<Box<dyn ObjectWriter>> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(key, e))?;
        }
        let staging_name = format!(
            ".{}.tmp-{}",
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let staging = path.with_file_name(staging_name);
        let file = File::create(&staging).map_err(|e| StorageError::io(key, e))?;
        Ok(Box::new(DirectoryWriter {
            key: key.to_owned(),
            staging,
            target: path,
            file: Some(file),
            committed: false,
        }))
    }

    fn list(&self, prefix: &str) -> StorageResult<Listing> {
        let mut listing = Listing::default();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(listing),
            Err(e) => return Err(StorageError::io(self.root.display().to_string(), e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(self.root.display().to_string(), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) || name.starts_with('.') {
                continue;
            }
            let file_type =
                entry.file_type().map_err(|e| StorageError::io(name.clone(), e))?;
            if file_type.is_dir() {
                listing.dirs.push(name);
            } else {
                listing.files.push(name);
            }
        }
        listing.files.sort();
        listing.dirs.sort();
        Ok(listing)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.object_path(key)?;
        Ok(path.exists())
    }

    fn sub_storage(&self, prefix: &str, create_if_missing: bool) -> StorageResult<Box<dyn Storage>> {
        validate_key(prefix)?;
        let root = self.root.join(prefix);
        if create_if_missing {
            fs::create_dir_all(&root)
                .map_err(|e| StorageError::io(root.display().to_string(), e))?;
        }
        Ok(Box::new(Self { root }))
    }

    fn delete_all(&self) -> StorageResult<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(self.root.display().to_string(), e)),
        }
    }
}

struct DirectoryWriter {
    key: String,
    staging: PathBuf,
    target: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl Write for DirectoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.file {
            Some(file) => file.write(buf),
            None => Err(std::io::Error::other("writer already committed")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.file {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl ObjectWriter for DirectoryWriter {
    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        file.sync_all().map_err(|e| StorageError::io(&*self.key, e))?;
        drop(file);
        fs::rename(&self.staging, &self.target).map_err(|e| StorageError::io(&*self.key, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for DirectoryWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        if let Err(e) = fs::remove_file(&self.staging) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(key = %self.key, error = %e, "failed to remove staging file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::open(dir.path()).unwrap();

        let mut writer = storage.put("toc.dat").unwrap();
        writer.write_all(b"hello").unwrap();
        writer.commit().unwrap();

        let mut reader = storage.get("toc.dat").unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn uncommitted_writer_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::open(dir.path()).unwrap();

        {
            let mut writer = storage.put("1.dat.gz").unwrap();
            writer.write_all(b"partial").unwrap();
            // dropped without commit
        }
        assert!(!storage.exists("1.dat.gz").unwrap());
        assert!(storage.list("").unwrap().files.is_empty());
    }

    #[test]
    fn get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::open(dir.path()).unwrap();
        assert!(matches!(storage.get("nope"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn sub_storage_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::open(dir.path()).unwrap();

        let sub = storage.sub_storage("20240101", true).unwrap();
        let mut writer = sub.put("1.dat.gz").unwrap();
        writer.write_all(b"x").unwrap();
        writer.commit().unwrap();

        let listing = storage.list("").unwrap();
        assert_eq!(listing.dirs, vec!["20240101".to_owned()]);
        assert!(listing.files.is_empty());

        let sub_listing = sub.list("").unwrap();
        assert_eq!(sub_listing.files, vec!["1.dat.gz".to_owned()]);
    }

    #[test]
    fn delete_all_removes_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::open(dir.path()).unwrap();
        let sub = storage.sub_storage("archive", true).unwrap();
        let mut writer = sub.put("toc.dat").unwrap();
        writer.write_all(b"x").unwrap();
        writer.commit().unwrap();

        sub.delete_all().unwrap();
        assert!(storage.list("").unwrap().dirs.is_empty());
    }

    #[test]
    fn delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::open(dir.path()).unwrap();
        storage.delete("absent").unwrap();
    }
}
