//! In-memory storage for tests.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::adapter::{validate_key, Listing, ObjectWriter, Storage};
use crate::error::{StorageError, StorageResult};

type Objects = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// Storage keeping objects in a process-local map.
///
/// Sub-storages share the map and prefix their keys, so an object written
/// through a sub-storage is visible from the parent under the joined key.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Objects,
    namespace: String,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }

    /// Snapshot of every key under this namespace, relative to it.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .keys()
            .filter_map(|k| k.strip_prefix(&self.namespace).map(ToOwned::to_owned))
            .collect()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Box<dyn Read + Send>> {
        validate_key(key)?;
        let objects = self.objects.lock();
        match objects.get(&self.full_key(key)) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(StorageError::NotFound(key.to_owned())),
        }
    }

    fn put(&self, key: &str) -> StorageResult<Box<dyn ObjectWriter>> {
        validate_key(key)?;
        Ok(Box::new(MemoryWriter {
            objects: Arc::clone(&self.objects),
            key: self.full_key(key),
            buf: Vec::new(),
        }))
    }

    fn list(&self, prefix: &str) -> StorageResult<Listing> {
        let scope = self.full_key(prefix);
        let mut listing = Listing::default();
        let objects = self.objects.lock();
        for key in objects.keys() {
            let Some(relative) = key.strip_prefix(&self.namespace) else {
                continue;
            };
            if !key.starts_with(&scope) {
                continue;
            }
            match relative.split_once('/') {
                Some((dir, _)) => {
                    let dir = dir.to_owned();
                    if !listing.dirs.contains(&dir) {
                        listing.dirs.push(dir);
                    }
                }
                None => listing.files.push(relative.to_owned()),
            }
        }
        Ok(listing)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.lock().remove(&self.full_key(key));
        Ok(())
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.objects.lock().contains_key(&self.full_key(key)))
    }

    fn sub_storage(&self, prefix: &str, _create_if_missing: bool) -> StorageResult<Box<dyn Storage>> {
        validate_key(prefix)?;
        Ok(Box::new(Self {
            objects: Arc::clone(&self.objects),
            namespace: format!("{}{prefix}/", self.namespace),
        }))
    }

    fn delete_all(&self) -> StorageResult<()> {
        self.objects.lock().retain(|k, _| !k.starts_with(&self.namespace));
        Ok(())
    }
}

struct MemoryWriter {
    objects: Objects,
    key: String,
    buf: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl ObjectWriter for MemoryWriter {
    fn commit(self: Box<Self>) -> StorageResult<()> {
        self.objects.lock().insert(self.key, self.buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_visibility() {
        let storage = MemoryStorage::new();
        let mut writer = storage.put("toc.dat").unwrap();
        writer.write_all(b"data").unwrap();
        assert!(!storage.exists("toc.dat").unwrap());
        writer.commit().unwrap();
        assert!(storage.exists("toc.dat").unwrap());

        let mut buf = Vec::new();
        storage.get("toc.dat").unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"data");
    }

    #[test]
    fn sub_storage_shares_objects() {
        let storage = MemoryStorage::new();
        let sub = storage.sub_storage("a", true).unwrap();
        let mut writer = sub.put("1.dat.gz").unwrap();
        writer.write_all(b"x").unwrap();
        writer.commit().unwrap();

        let listing = storage.list("").unwrap();
        assert_eq!(listing.dirs, vec!["a".to_owned()]);
        assert!(sub.exists("1.dat.gz").unwrap());
    }

    #[test]
    fn delete_all_is_scoped() {
        let storage = MemoryStorage::new();
        let a = storage.sub_storage("a", true).unwrap();
        let b = storage.sub_storage("b", true).unwrap();
        for sub in [&a, &b] {
            let mut writer = sub.put("o").unwrap();
            writer.write_all(b"x").unwrap();
            writer.commit().unwrap();
        }
        a.delete_all().unwrap();
        assert!(!a.exists("o").unwrap());
        assert!(b.exists("o").unwrap());
    }
}
