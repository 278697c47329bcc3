//! Binary TOC reader and writer.
//!
//! # Format
//!
//! The file opens with a fixed header:
//!
//! - 5-byte magic `PGDMP`
//! - version triplet (major, minor, revision), one byte each
//! - integer width in bytes (every integer below uses it)
//! - offset width in bytes
//! - format code (directory = 1)
//! - compression code (integer)
//! - creation timestamp as seven integers: sec, min, hour, mday,
//!   month (0-based), year (minus 1900), isdst
//! - database name, server version, dumper version (strings)
//! - entry count (integer), then the entries
//!
//! Integers are a sign byte (1 = negative) followed by the magnitude in
//! little-endian order, `integer width` bytes. Strings are an integer
//! length followed by the bytes; a NULL string is the distinguished
//! length `-1`.
//!
//! Each entry serializes as: dump id, had-dumper flag, table oid, oid,
//! tag, desc, section code, defn, drop statement, copy statement,
//! namespace, tablespace, table access method, owner, with-oids, the
//! dependency count and ids, file name, and an offset flag byte followed
//! by `offset width` bytes of data offset.

use std::io::{Read, Write};

use crate::entry::{DumpId, Entry, Section};
use crate::error::{TocError, TocResult};

/// The 5-byte file magic.
pub const MAGIC: &[u8; 5] = b"PGDMP";

/// Format code for directory archives.
pub const FORMAT_DIRECTORY: u8 = 1;

/// Archive format version written by this crate.
pub const VERSION: (u8, u8, u8) = (1, 15, 0);

/// Offset-flag codes.
mod offset_flag {
    /// No offset recorded.
    pub const NOT_SET: u8 = 1;
    /// Offset recorded in the following bytes.
    pub const SET: u8 = 2;
}

/// Creation timestamp, stored field-for-field as the header encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedAt {
    pub sec: i32,
    pub min: i32,
    pub hour: i32,
    pub day: i32,
    /// 0-based month, as written on disk.
    pub month: i32,
    /// Year minus 1900, as written on disk.
    pub year: i32,
    pub is_dst: i32,
}

impl CreatedAt {
    /// Converts a calendar timestamp into the on-disk representation.
    #[must_use]
    pub fn from_datetime(dt: time::OffsetDateTime) -> Self {
        Self {
            sec: i32::from(dt.second()),
            min: i32::from(dt.minute()),
            hour: i32::from(dt.hour()),
            day: i32::from(dt.day()),
            month: i32::from(u8::from(dt.month())) - 1,
            year: dt.year() - 1900,
            is_dst: 0,
        }
    }
}

impl Default for CreatedAt {
    fn default() -> Self {
        Self { sec: 0, min: 0, hour: 0, day: 1, month: 0, year: 100, is_dst: 0 }
    }
}

/// The fixed TOC header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Format version triplet.
    pub version: (u8, u8, u8),
    /// Width of every integer field, in bytes.
    pub int_size: u8,
    /// Width of the data-offset field, in bytes.
    pub offset_size: u8,
    /// Archive format code.
    pub format: u8,
    /// Compression code.
    pub compression: i32,
    /// Creation timestamp.
    pub created_at: CreatedAt,
    /// Database the archive was taken from.
    pub dbname: Option<String>,
    /// Server version string.
    pub server_version: Option<String>,
    /// Version string of the tool that wrote the archive.
    pub dumper_version: Option<String>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: VERSION,
            int_size: 4,
            offset_size: 8,
            format: FORMAT_DIRECTORY,
            compression: 1,
            created_at: CreatedAt::default(),
            dbname: None,
            server_version: None,
            dumper_version: None,
        }
    }
}

/// A complete table of contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toc {
    pub header: Header,
    pub entries: Vec<Entry>,
}

impl Toc {
    /// The highest dump id present, or 0 for an empty TOC.
    #[must_use]
    pub fn max_dump_id(&self) -> DumpId {
        self.entries.iter().map(|e| e.dump_id).max().unwrap_or(0)
    }

    /// Checks structural invariants: ids unique and dense in `[1, N]`,
    /// every dependency resolvable within this TOC.
    ///
    /// # Errors
    ///
    /// Returns [`TocError::Corrupt`] describing the first violation.
    pub fn validate(&self) -> TocResult<()> {
        let mut seen = vec![false; self.entries.len()];
        for entry in &self.entries {
            let id = entry.dump_id;
            if id < 1 || id as usize > self.entries.len() {
                return Err(TocError::Corrupt(format!(
                    "dump id {id} outside [1, {}]",
                    self.entries.len()
                )));
            }
            if std::mem::replace(&mut seen[id as usize - 1], true) {
                return Err(TocError::Corrupt(format!("duplicate dump id {id}")));
            }
        }
        for entry in &self.entries {
            for dep in &entry.dependencies {
                if *dep < 1 || *dep as usize > self.entries.len() {
                    return Err(TocError::Corrupt(format!(
                        "entry {} depends on unknown dump id {dep}",
                        entry.dump_id
                    )));
                }
            }
        }
        Ok(())
    }
}

struct TocWriter<W> {
    inner: W,
    int_size: usize,
    offset_size: usize,
}

impl<W: Write> TocWriter<W> {
    fn write_byte(&mut self, b: u8) -> TocResult<()> {
        self.inner.write_all(&[b])?;
        Ok(())
    }

    fn write_int(&mut self, value: i64) -> TocResult<()> {
        let negative = value < 0;
        self.write_byte(u8::from(negative))?;
        let magnitude = value.unsigned_abs().to_le_bytes();
        self.inner.write_all(&magnitude[..self.int_size])?;
        Ok(())
    }

    fn write_string(&mut self, value: Option<&str>) -> TocResult<()> {
        match value {
            None => self.write_int(-1),
            Some(s) => {
                self.write_int(s.len() as i64)?;
                self.inner.write_all(s.as_bytes())?;
                Ok(())
            }
        }
    }

    fn write_offset(&mut self, offset: Option<u64>) -> TocResult<()> {
        match offset {
            None => {
                self.write_byte(offset_flag::NOT_SET)?;
                self.inner.write_all(&vec![0u8; self.offset_size])?;
            }
            Some(value) => {
                self.write_byte(offset_flag::SET)?;
                let bytes = value.to_le_bytes();
                self.inner.write_all(&bytes[..self.offset_size])?;
            }
        }
        Ok(())
    }
}

struct TocReader<R> {
    inner: R,
    int_size: usize,
    offset_size: usize,
}

impl<R: Read> TocReader<R> {
    fn read_byte(&mut self) -> TocResult<u8> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_int(&mut self) -> TocResult<i64> {
        let negative = self.read_byte()? != 0;
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf[..self.int_size])?;
        let magnitude = i64::from_le_bytes(buf);
        Ok(if negative { -magnitude } else { magnitude })
    }

    fn read_string(&mut self) -> TocResult<Option<String>> {
        let len = self.read_int()?;
        if len < 0 {
            return Ok(None);
        }
        let len = usize::try_from(len)
            .map_err(|_| TocError::Corrupt(format!("string length {len} out of range")))?;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        String::from_utf8(buf)
            .map(Some)
            .map_err(|_| TocError::Corrupt("string is not valid utf-8".into()))
    }

    fn read_offset(&mut self) -> TocResult<Option<u64>> {
        let flag = self.read_byte()?;
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf[..self.offset_size])?;
        match flag {
            offset_flag::NOT_SET => Ok(None),
            offset_flag::SET => Ok(Some(u64::from_le_bytes(buf))),
            other => Err(TocError::Corrupt(format!("unknown offset flag {other}"))),
        }
    }
}

/// Serializes a TOC.
///
/// # Errors
///
/// Returns [`TocError::Io`] on write failure and [`TocError::Unsupported`]
/// for integer or offset widths this codec cannot express.
pub fn write_toc<W: Write>(out: W, toc: &Toc) -> TocResult<()> {
    let header = &toc.header;
    if header.int_size == 0 || header.int_size > 8 {
        return Err(TocError::Unsupported(format!("integer width {}", header.int_size)));
    }
    if header.offset_size == 0 || header.offset_size > 8 {
        return Err(TocError::Unsupported(format!("offset width {}", header.offset_size)));
    }

    let mut w = TocWriter {
        inner: out,
        int_size: header.int_size as usize,
        offset_size: header.offset_size as usize,
    };
    w.inner.write_all(MAGIC)?;
    w.write_byte(header.version.0)?;
    w.write_byte(header.version.1)?;
    w.write_byte(header.version.2)?;
    w.write_byte(header.int_size)?;
    w.write_byte(header.offset_size)?;
    w.write_byte(header.format)?;
    w.write_int(i64::from(header.compression))?;

    let ts = &header.created_at;
    for field in [ts.sec, ts.min, ts.hour, ts.day, ts.month, ts.year, ts.is_dst] {
        w.write_int(i64::from(field))?;
    }

    w.write_string(header.dbname.as_deref())?;
    w.write_string(header.server_version.as_deref())?;
    w.write_string(header.dumper_version.as_deref())?;

    w.write_int(toc.entries.len() as i64)?;
    for entry in &toc.entries {
        w.write_int(i64::from(entry.dump_id))?;
        w.write_int(i64::from(entry.had_dumper))?;
        w.write_string(entry.table_oid.as_deref())?;
        w.write_string(entry.oid.as_deref())?;
        w.write_string(entry.tag.as_deref())?;
        w.write_string(entry.desc.as_deref())?;
        w.write_int(i64::from(entry.section.code()))?;
        w.write_string(entry.defn.as_deref())?;
        w.write_string(entry.drop_stmt.as_deref())?;
        w.write_string(entry.copy_stmt.as_deref())?;
        w.write_string(entry.namespace.as_deref())?;
        w.write_string(entry.tablespace.as_deref())?;
        w.write_string(entry.table_access_method.as_deref())?;
        w.write_string(entry.owner.as_deref())?;
        w.write_string(Some(if entry.with_oids { "true" } else { "false" }))?;
        w.write_int(entry.dependencies.len() as i64)?;
        for dep in &entry.dependencies {
            w.write_int(i64::from(*dep))?;
        }
        w.write_string(entry.file_name.as_deref())?;
        w.write_offset(entry.data_offset)?;
    }
    w.inner.flush()?;
    Ok(())
}

/// Deserializes a TOC.
///
/// # Errors
///
/// Returns [`TocError::BadMagic`] if the file is not a TOC,
/// [`TocError::Unsupported`] for widths or formats this codec cannot read,
/// and [`TocError::Corrupt`] for structural damage.
pub fn read_toc<R: Read>(input: R) -> TocResult<Toc> {
    let mut r = TocReader { inner: input, int_size: 0, offset_size: 0 };

    let mut magic = [0u8; 5];
    r.inner.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(TocError::BadMagic);
    }

    let version = (r.read_byte()?, r.read_byte()?, r.read_byte()?);
    let int_size = r.read_byte()?;
    let offset_size = r.read_byte()?;
    if int_size == 0 || int_size > 8 {
        return Err(TocError::Unsupported(format!("integer width {int_size}")));
    }
    if offset_size == 0 || offset_size > 8 {
        return Err(TocError::Unsupported(format!("offset width {offset_size}")));
    }
    r.int_size = int_size as usize;
    r.offset_size = offset_size as usize;

    let format = r.read_byte()?;
    if format != FORMAT_DIRECTORY {
        return Err(TocError::Unsupported(format!("archive format code {format}")));
    }

    let compression = int32(r.read_int()?, "compression")?;
    let created_at = CreatedAt {
        sec: int32(r.read_int()?, "sec")?,
        min: int32(r.read_int()?, "min")?,
        hour: int32(r.read_int()?, "hour")?,
        day: int32(r.read_int()?, "day")?,
        month: int32(r.read_int()?, "month")?,
        year: int32(r.read_int()?, "year")?,
        is_dst: int32(r.read_int()?, "isdst")?,
    };
    let dbname = r.read_string()?;
    let server_version = r.read_string()?;
    let dumper_version = r.read_string()?;

    let count = r.read_int()?;
    let count = usize::try_from(count)
        .map_err(|_| TocError::Corrupt(format!("entry count {count} out of range")))?;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let dump_id = int32(r.read_int()?, "dump id")?;
        let had_dumper = r.read_int()? != 0;
        let table_oid = r.read_string()?;
        let oid = r.read_string()?;
        let tag = r.read_string()?;
        let desc = r.read_string()?;
        let section_code = int32(r.read_int()?, "section")?;
        let section = Section::from_code(section_code)
            .ok_or_else(|| TocError::Corrupt(format!("unknown section code {section_code}")))?;
        let defn = r.read_string()?;
        let drop_stmt = r.read_string()?;
        let copy_stmt = r.read_string()?;
        let namespace = r.read_string()?;
        let tablespace = r.read_string()?;
        let table_access_method = r.read_string()?;
        let owner = r.read_string()?;
        let with_oids = r.read_string()?.as_deref() == Some("true");
        let n_deps = r.read_int()?;
        let n_deps = usize::try_from(n_deps)
            .map_err(|_| TocError::Corrupt(format!("dependency count {n_deps} out of range")))?;
        let mut dependencies = Vec::with_capacity(n_deps);
        for _ in 0..n_deps {
            dependencies.push(int32(r.read_int()?, "dependency")?);
        }
        let file_name = r.read_string()?;
        let data_offset = r.read_offset()?;

        entries.push(Entry {
            dump_id,
            had_dumper,
            table_oid,
            oid,
            tag,
            desc,
            section,
            defn,
            drop_stmt,
            copy_stmt,
            namespace,
            tablespace,
            table_access_method,
            owner,
            with_oids,
            dependencies,
            file_name,
            data_offset,
        });
    }

    Ok(Toc {
        header: Header {
            version,
            int_size,
            offset_size,
            format,
            compression,
            created_at,
            dbname,
            server_version,
            dumper_version,
        },
        entries,
    })
}

fn int32(value: i64, field: &str) -> TocResult<i32> {
    i32::try_from(value)
        .map_err(|_| TocError::Corrupt(format!("{field} value {value} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::desc;

    fn sample_toc() -> Toc {
        let mut schema = Entry::new(1, Section::PreData);
        schema.tag = Some("public".into());
        schema.desc = Some(desc::SCHEMA.into());
        schema.defn = Some("CREATE SCHEMA public;".into());
        schema.owner = Some("postgres".into());

        let mut table = Entry::new(2, Section::PreData);
        table.tag = Some("users".into());
        table.desc = Some(desc::TABLE.into());
        table.namespace = Some("public".into());
        table.defn = Some("CREATE TABLE public.users (id int4, name text);".into());
        table.drop_stmt = Some("DROP TABLE public.users;".into());
        table.dependencies = vec![1];

        let mut data = Entry::new(3, Section::Data);
        data.tag = Some("users".into());
        data.desc = Some(desc::TABLE_DATA.into());
        data.namespace = Some("public".into());
        data.had_dumper = true;
        data.copy_stmt = Some("COPY public.users (id, name) FROM stdin;".into());
        data.file_name = Some("3.dat.gz".into());
        data.dependencies = vec![2];
        data.data_offset = Some(512);

        let mut toc = Toc::default();
        toc.header.dbname = Some("shop".into());
        toc.header.server_version = Some("16.2".into());
        toc.header.dumper_version = Some("veildump 0.4.0".into());
        toc.header.created_at =
            CreatedAt { sec: 30, min: 15, hour: 9, day: 2, month: 7, year: 126, is_dst: 0 };
        toc.entries = vec![schema, table, data];
        toc
    }

    #[test]
    fn roundtrip_field_for_field() {
        let toc = sample_toc();
        let mut buf = Vec::new();
        write_toc(&mut buf, &toc).unwrap();
        let read = read_toc(buf.as_slice()).unwrap();
        assert_eq!(read, toc);
    }

    #[test]
    fn roundtrip_is_byte_stable() {
        let toc = sample_toc();
        let mut first = Vec::new();
        write_toc(&mut first, &toc).unwrap();
        let mut second = Vec::new();
        write_toc(&mut second, &read_toc(first.as_slice()).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unused_fields_roundtrip() {
        let mut toc = sample_toc();
        toc.entries[1].tablespace = Some("fastdisk".into());
        toc.entries[1].table_access_method = Some("heap".into());
        toc.entries[1].with_oids = true;

        let mut buf = Vec::new();
        write_toc(&mut buf, &toc).unwrap();
        let read = read_toc(buf.as_slice()).unwrap();
        assert_eq!(read.entries[1].tablespace.as_deref(), Some("fastdisk"));
        assert_eq!(read.entries[1].table_access_method.as_deref(), Some("heap"));
        assert!(read.entries[1].with_oids);
    }

    #[test]
    fn bad_magic_is_rejected() {
        assert!(matches!(read_toc(b"NOTPG".as_slice()), Err(TocError::BadMagic)));
    }

    #[test]
    fn validate_detects_gaps_and_duplicates() {
        let mut toc = sample_toc();
        assert!(toc.validate().is_ok());

        toc.entries[2].dump_id = 5;
        assert!(toc.validate().is_err());

        toc.entries[2].dump_id = 1;
        assert!(toc.validate().is_err());
    }

    #[test]
    fn validate_detects_dangling_dependency() {
        let mut toc = sample_toc();
        toc.entries[2].dependencies = vec![9];
        assert!(toc.validate().is_err());
    }

    #[test]
    fn null_and_empty_strings_are_distinct() {
        let mut toc = sample_toc();
        toc.entries[0].tag = Some(String::new());
        toc.entries[1].tag = None;

        let mut buf = Vec::new();
        write_toc(&mut buf, &toc).unwrap();
        let read = read_toc(buf.as_slice()).unwrap();
        assert_eq!(read.entries[0].tag.as_deref(), Some(""));
        assert_eq!(read.entries[1].tag, None);
    }
}
