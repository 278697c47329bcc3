//! Decoded row with per-cell mutation tracking.

use memchr::memchr_iter;

use crate::error::{CoreError, CoreResult};

use super::escape::{escape_into, unescape};
use super::{DELIMITER, NULL_SENTINEL};

/// A value assigned to a row cell by a transformer.
///
/// Bytes are plain (unescaped); escaping happens once on emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowValue {
    /// SQL NULL.
    Null,
    /// A raw byte value.
    Bytes(Vec<u8>),
}

impl From<&str> for RowValue {
    fn from(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for RowValue {
    fn from(s: String) -> Self {
        Self::Bytes(s.into_bytes())
    }
}

impl From<Vec<u8>> for RowValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Per-cell state.
///
/// A cell starts `Clean` (backed by the encoded line), moves to `Decoded`
/// when an accessor first unescapes it, and to `Dirty` when a transformer
/// overwrites it. Only `Dirty` cells are re-escaped on emission.
#[derive(Debug, Clone)]
enum Cell {
    Clean,
    Decoded(Option<Vec<u8>>),
    Dirty(Option<Vec<u8>>),
}

/// One row decoded from a COPY text line.
///
/// The row keeps the original encoded line plus the byte range of each cell
/// within it. Accessors unescape lazily and cache the plain form; clean
/// cells are re-emitted verbatim from the original range, which makes the
/// untransformed decode/encode path byte-identical.
#[derive(Debug)]
pub struct Row {
    expected_columns: usize,
    line: Vec<u8>,
    spans: Vec<(u32, u32)>,
    cells: Vec<Cell>,
}

impl Row {
    /// Creates an empty row expecting `columns` cells per line.
    #[must_use]
    pub fn new(columns: usize) -> Self {
        Self {
            expected_columns: columns,
            line: Vec::new(),
            spans: Vec::with_capacity(columns),
            cells: Vec::with_capacity(columns),
        }
    }

    /// Number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns `true` if the row holds no columns (nothing decoded yet).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Decodes one logical line (without the trailing LF) into this row,
    /// replacing any previous contents.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encoding`] if the column count does not match
    /// the expected schema.
    pub fn decode(&mut self, line: &[u8]) -> CoreResult<()> {
        self.line.clear();
        self.line.extend_from_slice(line);
        self.spans.clear();
        self.cells.clear();

        let mut start = 0u32;
        for tab in memchr_iter(DELIMITER, line) {
            self.spans.push((start, tab as u32));
            start = tab as u32 + 1;
        }
        self.spans.push((start, line.len() as u32));

        if self.spans.len() != self.expected_columns {
            return Err(CoreError::Encoding(format!(
                "expected {} columns, found {}",
                self.expected_columns,
                self.spans.len()
            )));
        }
        self.cells.resize(self.spans.len(), Cell::Clean);
        Ok(())
    }

    fn check_index(&self, index: usize) -> CoreResult<()> {
        if index >= self.len() {
            return Err(CoreError::ColumnOutOfRange { index, len: self.len() });
        }
        Ok(())
    }

    fn encoded_cell(&self, index: usize) -> &[u8] {
        let (start, end) = self.spans[index];
        &self.line[start as usize..end as usize]
    }

    /// Returns `true` if the cell currently holds NULL.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ColumnOutOfRange`] for a bad index.
    pub fn is_null(&self, index: usize) -> CoreResult<bool> {
        self.check_index(index)?;
        Ok(match &self.cells[index] {
            Cell::Clean => self.encoded_cell(index) == NULL_SENTINEL,
            Cell::Decoded(v) | Cell::Dirty(v) => v.is_none(),
        })
    }

    /// Returns the plain (unescaped) bytes of a cell, or `None` for NULL.
    ///
    /// The decoded form is cached for the lifetime of the current line.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encoding`] for an ill-formed escape and
    /// [`CoreError::ColumnOutOfRange`] for a bad index.
    pub fn raw(&mut self, index: usize) -> CoreResult<Option<&[u8]>> {
        self.check_index(index)?;
        if matches!(self.cells[index], Cell::Clean) {
            let encoded = self.encoded_cell(index);
            let decoded =
                if encoded == NULL_SENTINEL { None } else { Some(unescape(encoded)?) };
            self.cells[index] = Cell::Decoded(decoded);
        }
        match &self.cells[index] {
            Cell::Decoded(v) | Cell::Dirty(v) => Ok(v.as_deref()),
            Cell::Clean => unreachable!("cell decoded above"),
        }
    }

    /// Returns the cell as UTF-8 text, or `None` for NULL.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the bytes are not valid UTF-8.
    pub fn text(&mut self, index: usize) -> CoreResult<Option<&str>> {
        match self.raw(index)? {
            None => Ok(None),
            Some(bytes) => std::str::from_utf8(bytes)
                .map(Some)
                .map_err(|_| CoreError::type_mismatch_with_value("utf-8 text", "bytes", "<binary>")),
        }
    }

    /// Parses the cell as a signed 64-bit integer, or `None` for NULL.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the text does not parse.
    pub fn int8(&mut self, index: usize) -> CoreResult<Option<i64>> {
        match self.text(index)? {
            None => Ok(None),
            Some(s) => {
                let parsed = s.trim().parse::<i64>().map_err(|_| {
                    CoreError::type_mismatch_with_value("int8", "text", s.to_owned())
                })?;
                Ok(Some(parsed))
            }
        }
    }

    /// Parses the cell as a 64-bit float, or `None` for NULL.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the text does not parse.
    pub fn float8(&mut self, index: usize) -> CoreResult<Option<f64>> {
        match self.text(index)? {
            None => Ok(None),
            Some(s) => {
                let parsed = s.trim().parse::<f64>().map_err(|_| {
                    CoreError::type_mismatch_with_value("float8", "text", s.to_owned())
                })?;
                Ok(Some(parsed))
            }
        }
    }

    /// Parses the cell as a boolean (`t`/`f`/`true`/`false`), or `None` for
    /// NULL.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the text is not a boolean.
    pub fn bool(&mut self, index: usize) -> CoreResult<Option<bool>> {
        match self.text(index)? {
            None => Ok(None),
            Some("t") | Some("true") => Ok(Some(true)),
            Some("f") | Some("false") => Ok(Some(false)),
            Some(s) => Err(CoreError::type_mismatch_with_value("bool", "text", s.to_owned())),
        }
    }

    /// Overwrites a cell, marking it dirty.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ColumnOutOfRange`] for a bad index.
    pub fn set_column(&mut self, index: usize, value: RowValue) -> CoreResult<()> {
        self.check_index(index)?;
        self.cells[index] = match value {
            RowValue::Null => Cell::Dirty(None),
            RowValue::Bytes(b) => Cell::Dirty(Some(b)),
        };
        Ok(())
    }

    /// Returns `true` if the cell was overwritten since decoding.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ColumnOutOfRange`] for a bad index.
    pub fn is_dirty(&self, index: usize) -> CoreResult<bool> {
        self.check_index(index)?;
        Ok(matches!(self.cells[index], Cell::Dirty(_)))
    }

    /// Returns `true` if any cell was overwritten since decoding.
    #[must_use]
    pub fn any_dirty(&self) -> bool {
        self.cells.iter().any(|c| matches!(c, Cell::Dirty(_)))
    }

    /// Appends the encoded line (without trailing LF) to `out`.
    ///
    /// Clean cells are copied verbatim from the original byte range; dirty
    /// cells are re-escaped.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        for index in 0..self.len() {
            if index > 0 {
                out.push(DELIMITER);
            }
            match &self.cells[index] {
                Cell::Clean | Cell::Decoded(_) => out.extend_from_slice(self.encoded_cell(index)),
                Cell::Dirty(None) => out.extend_from_slice(NULL_SENTINEL),
                Cell::Dirty(Some(bytes)) => escape_into(bytes, out),
            }
        }
    }

    /// Encodes the row into a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.line.len());
        self.encode_into(&mut out);
        out
    }
}
