//! COPY text format codec.
//!
//! This module parses and emits lines in the PostgreSQL `COPY ... TO STDOUT`
//! text serialization, which is the payload format of every data file in a
//! directory archive.
//!
//! # Format
//!
//! - One logical row per LF-terminated line.
//! - Columns are separated by a single TAB byte.
//! - NULL is the two-byte sequence `\N`.
//! - Escapes inside a field: `\b` `\f` `\n` `\r` `\t` `\v` `\\` and `\NNN`
//!   (one to three octal digits).
//! - The end-of-data sentinel is a line equal to `\.`.
//!
//! The codec is agnostic to column types: every value is either NULL or a
//! raw byte slice. Numeric or textual interpretation happens in the typed
//! accessors on [`Row`], on demand.
//!
//! Emission is symmetric and minimal: a cell that was never mutated is
//! re-emitted from the original byte range of the decoded line, so a row
//! decoded and re-encoded without transformation is byte-identical.

mod escape;
mod row;

#[cfg(test)]
mod proptest_tests;

pub use escape::{escape_into, unescape};
pub use row::{Row, RowValue};

/// The two-byte NULL sentinel as it appears on the wire.
pub const NULL_SENTINEL: &[u8] = b"\\N";

/// The end-of-data sentinel line.
pub const END_OF_DATA: &[u8] = b"\\.";

/// The column separator byte.
pub const DELIMITER: u8 = b'\t';

/// Returns `true` if `line` is the end-of-data sentinel.
#[must_use]
pub fn is_end_of_data(line: &[u8]) -> bool {
    line == END_OF_DATA
}
