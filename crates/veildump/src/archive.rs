//! Archive inventory.
//!
//! Archives live as sub-directories of the storage root, one per dump,
//! named by the epoch-millisecond timestamp the dump started. A
//! directory counts as an archive once it holds a readable `toc.dat`;
//! `metadata.json` enriches the listing when present.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use veildump_storage::Storage;
use veildump_toc::read_toc;

use crate::dump::metadata::read_metadata;
use crate::error::Result;

/// One archive found under the storage root.
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    /// Directory name, used as the archive id.
    pub id: String,
    /// TOC present and readable.
    pub complete: bool,
    /// Entry count from the TOC.
    pub entries: usize,
    /// Creation time from metadata, RFC 3339.
    pub created_at: Option<String>,
    /// Source database from metadata.
    pub database: Option<String>,
    /// Total rows from metadata.
    pub total_rows: Option<u64>,
}

/// Allocates a fresh archive id from the current time.
#[must_use]
pub fn new_archive_id() -> String {
    let now = OffsetDateTime::now_utc();
    let millis = now.unix_timestamp() * 1000 + i64::from(now.millisecond());
    millis.to_string()
}

/// Lists archives under the storage root, newest first.
///
/// Directories without a readable TOC are listed as incomplete rather
/// than skipped, so a crashed dump stays visible until deleted.
///
/// # Errors
///
/// Returns storage failures; unreadable individual archives do not fail
/// the listing.
pub fn list_archives(root: &dyn Storage) -> Result<Vec<ArchiveInfo>> {
    let listing = root.list("")?;
    let mut archives = Vec::with_capacity(listing.dirs.len());
    for id in listing.dirs {
        let archive = root.sub_storage(&id, false)?;
        let toc = match archive.get("toc.dat") {
            Ok(reader) => read_toc(reader).ok(),
            Err(_) => None,
        };
        let metadata = read_metadata(archive.as_ref()).unwrap_or(None);
        archives.push(ArchiveInfo {
            id,
            complete: toc.is_some(),
            entries: toc.map(|t| t.entries.len()).unwrap_or(0),
            created_at: metadata.as_ref().map(|m| m.started_at.clone()),
            database: metadata.as_ref().and_then(|m| m.database.clone()),
            total_rows: metadata.map(|m| m.total_rows),
        });
    }
    archives.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(archives)
}

/// Deletes one archive directory by id.
///
/// # Errors
///
/// Returns storage failures.
pub fn delete_archive(root: &dyn Storage, id: &str) -> Result<()> {
    let archive = root.sub_storage(id, false)?;
    archive.delete_all()?;
    Ok(())
}

/// Renders an RFC 3339 timestamp for "now"; used for operator-facing
/// output.
#[must_use]
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use veildump_storage::MemoryStorage;
    use veildump_toc::{write_toc, Toc};

    #[test]
    fn lists_complete_and_incomplete_archives() {
        let root = MemoryStorage::new();

        let complete = root.sub_storage("200", true).unwrap();
        let mut writer = complete.put("toc.dat").unwrap();
        write_toc(&mut writer, &Toc::default()).unwrap();
        writer.commit().unwrap();

        let partial = root.sub_storage("100", true).unwrap();
        let mut writer = partial.put("1.dat.gz").unwrap();
        writer.write_all(b"junk").unwrap();
        writer.commit().unwrap();

        let archives = list_archives(&root).unwrap();
        assert_eq!(archives.len(), 2);
        // Newest (highest id) first.
        assert_eq!(archives[0].id, "200");
        assert!(archives[0].complete);
        assert!(!archives[1].complete);
    }

    #[test]
    fn delete_removes_only_the_target() {
        let root = MemoryStorage::new();
        for id in ["100", "200"] {
            let archive = root.sub_storage(id, true).unwrap();
            let mut writer = archive.put("toc.dat").unwrap();
            write_toc(&mut writer, &Toc::default()).unwrap();
            writer.commit().unwrap();
        }
        delete_archive(&root, "100").unwrap();
        let archives = list_archives(&root).unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].id, "200");
    }
}
