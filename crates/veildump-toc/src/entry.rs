//! TOC entry model.

use std::sync::atomic::{AtomicI32, Ordering};

/// Archive-local identifier of a TOC entry.
///
/// Doubles as a dependency token and as the data-file name stem
/// (`<DumpId>.dat.gz`).
pub type DumpId = i32;

/// Restore section an entry belongs to.
///
/// The declaration order is the restore order: every pre-data entry runs
/// before any data entry, which runs before any post-data entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    /// No section (comments, ACLs attached elsewhere).
    None,
    /// Schema DDL executed before data: tables, schemas, sequences.
    PreData,
    /// COPY data streams.
    Data,
    /// Indexes, constraints, triggers.
    PostData,
}

impl Section {
    /// On-disk code of the section.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::None => 1,
            Self::PreData => 2,
            Self::Data => 3,
            Self::PostData => 4,
        }
    }

    /// Decodes an on-disk section code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::None),
            2 => Some(Self::PreData),
            3 => Some(Self::Data),
            4 => Some(Self::PostData),
            _ => None,
        }
    }
}

/// Well-known entry kinds as they appear in the `desc` field.
pub mod desc {
    pub const SCHEMA: &str = "SCHEMA";
    pub const TABLE: &str = "TABLE";
    pub const TABLE_DATA: &str = "TABLE DATA";
    pub const SEQUENCE: &str = "SEQUENCE";
    pub const SEQUENCE_SET: &str = "SEQUENCE SET";
    pub const INDEX: &str = "INDEX";
    pub const CONSTRAINT: &str = "CONSTRAINT";
    pub const FK_CONSTRAINT: &str = "FK CONSTRAINT";
    pub const TRIGGER: &str = "TRIGGER";
    pub const BLOBS: &str = "BLOBS";
}

/// One record of the table of contents.
///
/// Fields the dump path never interprets (`tablespace`,
/// `table_access_method`, `with_oids`) are still carried so that
/// `write(read(toc))` reproduces the input byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Archive-local id, unique and dense within one archive.
    pub dump_id: DumpId,
    /// Whether a data dumper produced a file for this entry.
    pub had_dumper: bool,
    /// OID of `pg_class` row, as text.
    pub table_oid: Option<String>,
    /// Object OID, as text.
    pub oid: Option<String>,
    /// Object name.
    pub tag: Option<String>,
    /// Object kind, one of the [`desc`] constants for entries we create.
    pub desc: Option<String>,
    /// Restore section.
    pub section: Section,
    /// Creation DDL, or the `setval` statement for sequences.
    pub defn: Option<String>,
    /// Drop DDL.
    pub drop_stmt: Option<String>,
    /// COPY statement for data entries.
    pub copy_stmt: Option<String>,
    /// Schema name.
    pub namespace: Option<String>,
    /// Tablespace, carried for round-tripping.
    pub tablespace: Option<String>,
    /// Table access method, carried for round-tripping.
    pub table_access_method: Option<String>,
    /// Owner role.
    pub owner: Option<String>,
    /// Legacy WITH OIDS flag, carried for round-tripping.
    pub with_oids: bool,
    /// Dump ids this entry depends on; all must exist in the same TOC.
    pub dependencies: Vec<DumpId>,
    /// Data file name, for entries with external data.
    pub file_name: Option<String>,
    /// Data offset within a monolithic archive; unused by the directory
    /// format but preserved.
    pub data_offset: Option<u64>,
}

impl Entry {
    /// Creates an empty entry with the given id and section.
    #[must_use]
    pub fn new(dump_id: DumpId, section: Section) -> Self {
        Self {
            dump_id,
            had_dumper: false,
            table_oid: None,
            oid: None,
            tag: None,
            desc: None,
            section,
            defn: None,
            drop_stmt: None,
            copy_stmt: None,
            namespace: None,
            tablespace: None,
            table_access_method: None,
            owner: None,
            with_oids: false,
            dependencies: Vec::new(),
            file_name: None,
            data_offset: None,
        }
    }

    /// Returns `true` if this entry carries a data file.
    #[must_use]
    pub fn is_data(&self) -> bool {
        self.section == Section::Data && self.had_dumper
    }

    /// Conventional data file name for this entry.
    #[must_use]
    pub fn data_file_name(&self) -> String {
        format!("{}.dat.gz", self.dump_id)
    }
}

/// Monotonic dump-id allocator.
///
/// Seeded at 0 for a fresh dump so the first id is 1; seeded at
/// `max(existing)` when appending to an archive. Ids are never reused.
#[derive(Debug)]
pub struct DumpSequence {
    last: AtomicI32,
}

impl DumpSequence {
    /// Creates a sequence whose next id is `last + 1`.
    #[must_use]
    pub fn new(last: DumpId) -> Self {
        Self { last: AtomicI32::new(last) }
    }

    /// Allocates the next id.
    pub fn next(&self) -> DumpId {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The most recently allocated id, or the seed if none was allocated.
    #[must_use]
    pub fn last(&self) -> DumpId {
        self.last.load(Ordering::Relaxed)
    }
}
