//! Archive metadata sidecar.
//!
//! `metadata.json` records tool-specific facts next to the TOC:
//! transformation config, validation warnings, timestamps, and totals.
//! Stock restore tooling ignores it.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use veildump_core::ValidationWarning;
use veildump_storage::Storage;

use crate::config::TableConfig;
use crate::error::{Error, Result};

/// Object name of the metadata sidecar.
pub const METADATA_FILE: &str = "metadata.json";

/// Tool-specific archive metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Dump start, RFC 3339.
    pub started_at: String,
    /// Dump completion, RFC 3339.
    pub completed_at: String,
    /// Source database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Source server version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    /// Tool version that wrote the archive.
    pub dumper_version: String,
    /// Total rows across every data entry.
    pub total_rows: u64,
    /// Number of data entries.
    pub total_tables: usize,
    /// Validation warnings the dump proceeded past.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationWarning>,
    /// The transformation config the archive was produced with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformation: Vec<TableConfig>,
}

/// Formats an instant as RFC 3339.
#[must_use]
pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Writes `metadata.json` into the archive.
///
/// # Errors
///
/// Returns storage failures; serialization of the metadata itself cannot
/// fail.
pub fn write_metadata(storage: &dyn Storage, metadata: &ArchiveMetadata) -> Result<()> {
    let mut writer = storage.put(METADATA_FILE)?;
    serde_json::to_writer_pretty(&mut writer, metadata)
        .map_err(|e| Error::Config(format!("cannot serialize metadata: {e}")))?;
    writer.write_all(b"\n")?;
    writer.commit()?;
    Ok(())
}

/// Reads `metadata.json` from an archive, if present.
///
/// # Errors
///
/// Returns storage failures; a malformed file reads as `None` so listing
/// survives archives written by other tools.
pub fn read_metadata(storage: &dyn Storage) -> Result<Option<ArchiveMetadata>> {
    if !storage.exists(METADATA_FILE)? {
        return Ok(None);
    }
    let mut raw = String::new();
    storage.get(METADATA_FILE)?.read_to_string(&mut raw)?;
    Ok(serde_json::from_str(&raw).ok())
}
