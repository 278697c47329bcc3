//! Validation output documents.
//!
//! The validation dump stores each sampled row twice (original line, then
//! transformed line). Documents consume those pairs and render a
//! per-table report: JSON for machines, aligned text for humans, with
//! optional diff highlighting and a switch to omit untouched columns.

use std::io::Write;

use serde_json::json;

use veildump_core::{Column, Row};

use crate::error::{Error, Result};

/// Layout of the text document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// One block per record, one line per column.
    Vertical,
    /// One header row, two lines per record.
    Horizontal,
}

impl TableFormat {
    /// Parses a config string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for anything but `vertical`/`horizontal`.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "vertical" => Ok(Self::Vertical),
            "horizontal" => Ok(Self::Horizontal),
            other => Err(Error::Config(format!("unknown table format {other:?}"))),
        }
    }
}

/// A per-table validation report under construction.
pub trait Document: Send {
    /// Consumes one original/transformed row pair.
    ///
    /// # Errors
    ///
    /// Returns codec errors from reading the rows.
    fn append(&mut self, original: &mut Row, transformed: &mut Row) -> Result<()>;

    /// Renders the document.
    ///
    /// # Errors
    ///
    /// Returns I/O failures of the output stream.
    fn print(&self, out: &mut dyn Write) -> Result<()>;
}

fn cell_text(row: &mut Row, index: usize) -> Result<Option<String>> {
    Ok(row.raw(index)?.map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
}

fn cells_equal(original: Option<&String>, transformed: Option<&String>) -> bool {
    original == transformed
}

/// JSON report: one object per record, diff cells nested as
/// `{original, transformed}`.
pub struct JsonDocument {
    schema: String,
    table: String,
    columns: Vec<Column>,
    diff: bool,
    only_transformed: bool,
    records: Vec<serde_json::Value>,
}

impl JsonDocument {
    /// Creates an empty document for one table.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<Column>,
        diff: bool,
        only_transformed: bool,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns,
            diff,
            only_transformed,
            records: Vec::new(),
        }
    }
}

impl Document for JsonDocument {
    fn append(&mut self, original: &mut Row, transformed: &mut Row) -> Result<()> {
        let mut record = serde_json::Map::new();
        for column in &self.columns {
            let index = column.ordinal;
            let before = cell_text(original, index)?;
            let after = cell_text(transformed, index)?;
            let changed = !cells_equal(before.as_ref(), after.as_ref());
            if !changed && self.only_transformed {
                continue;
            }
            let value = if changed && self.diff {
                json!({ "original": before, "transformed": after })
            } else {
                json!(after)
            };
            record.insert(column.name.clone(), value);
        }
        self.records.push(serde_json::Value::Object(record));
        Ok(())
    }

    fn print(&self, out: &mut dyn Write) -> Result<()> {
        let document = json!({
            "schema": self.schema,
            "name": self.table,
            "records": self.records,
        });
        writeln!(out, "{document}")?;
        Ok(())
    }
}

struct TextRecord {
    /// Per printed column: (name, original, transformed, changed).
    cells: Vec<(String, String, String, bool)>,
}

/// Plain-text report with aligned columns.
pub struct TextDocument {
    schema: String,
    table: String,
    columns: Vec<Column>,
    diff: bool,
    only_transformed: bool,
    format: TableFormat,
    records: Vec<TextRecord>,
}

impl TextDocument {
    /// Creates an empty document for one table.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<Column>,
        diff: bool,
        only_transformed: bool,
        format: TableFormat,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns,
            diff,
            only_transformed,
            format,
            records: Vec::new(),
        }
    }

    fn render_value(value: Option<String>) -> String {
        value.unwrap_or_else(|| "NULL".into())
    }

    fn print_vertical(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for (ordinal, record) in self.records.iter().enumerate() {
            writeln!(out, "record {}", ordinal + 1)?;
            let width =
                record.cells.iter().map(|(name, ..)| name.len()).max().unwrap_or(0);
            for (name, original, transformed, changed) in &record.cells {
                let marker = if *changed && self.diff { "*" } else { " " };
                writeln!(
                    out,
                    "  {marker} {name:<width$}  {original}  {transformed}",
                )?;
            }
        }
        Ok(())
    }

    fn print_horizontal(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let names: Vec<&str> = self
            .records
            .first()
            .map(|r| r.cells.iter().map(|(name, ..)| name.as_str()).collect())
            .unwrap_or_default();
        writeln!(out, "{}", names.join("\t"))?;
        for record in &self.records {
            let originals: Vec<&str> =
                record.cells.iter().map(|(_, o, _, _)| o.as_str()).collect();
            let transformed: Vec<String> = record
                .cells
                .iter()
                .map(|(_, _, t, changed)| {
                    if *changed && self.diff {
                        format!("*{t}")
                    } else {
                        t.clone()
                    }
                })
                .collect();
            writeln!(out, "{}", originals.join("\t"))?;
            writeln!(out, "{}", transformed.join("\t"))?;
        }
        Ok(())
    }
}

impl Document for TextDocument {
    fn append(&mut self, original: &mut Row, transformed: &mut Row) -> Result<()> {
        let mut cells = Vec::new();
        for column in &self.columns {
            let index = column.ordinal;
            let before = cell_text(original, index)?;
            let after = cell_text(transformed, index)?;
            let changed = !cells_equal(before.as_ref(), after.as_ref());
            if !changed && self.only_transformed {
                continue;
            }
            cells.push((
                column.name.clone(),
                Self::render_value(before),
                Self::render_value(after),
                changed,
            ));
        }
        self.records.push(TextRecord { cells });
        Ok(())
    }

    fn print(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "table {}.{}", self.schema, self.table)?;
        match self.format {
            TableFormat::Vertical => self.print_vertical(out)?,
            TableFormat::Horizontal => self.print_horizontal(out)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<Column> {
        vec![Column::new("id", 0, 23, "int4"), Column::new("name", 1, 25, "text")]
    }

    fn rows(original: &[u8], transformed: &[u8]) -> (Row, Row) {
        let mut o = Row::new(2);
        o.decode(original).unwrap();
        let mut t = Row::new(2);
        t.decode(transformed).unwrap();
        (o, t)
    }

    #[test]
    fn json_diff_nests_changed_cells() {
        let mut doc = JsonDocument::new("public", "users", columns(), true, false);
        let (mut o, mut t) = rows(b"1\ta", b"1\tA");
        doc.append(&mut o, &mut t).unwrap();

        let mut out = Vec::new();
        doc.print(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["name"], "users");
        assert_eq!(value["records"][0]["id"], "1");
        assert_eq!(value["records"][0]["name"]["original"], "a");
        assert_eq!(value["records"][0]["name"]["transformed"], "A");
    }

    #[test]
    fn json_only_transformed_omits_untouched_columns() {
        let mut doc = JsonDocument::new("public", "users", columns(), true, true);
        let (mut o, mut t) = rows(b"1\ta", b"1\tA");
        doc.append(&mut o, &mut t).unwrap();

        let mut out = Vec::new();
        doc.print(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let record = &value["records"][0];
        assert!(record.get("id").is_none());
        assert!(record.get("name").is_some());
    }

    #[test]
    fn json_null_handling() {
        let mut doc = JsonDocument::new("public", "users", columns(), true, false);
        let (mut o, mut t) = rows(b"1\ta", b"1\t\\N");
        doc.append(&mut o, &mut t).unwrap();

        let mut out = Vec::new();
        doc.print(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["records"][0]["name"]["transformed"], serde_json::Value::Null);
    }

    #[test]
    fn text_vertical_marks_changed_cells() {
        let mut doc = TextDocument::new(
            "public",
            "users",
            columns(),
            true,
            false,
            TableFormat::Vertical,
        );
        let (mut o, mut t) = rows(b"1\ta", b"1\tA");
        doc.append(&mut o, &mut t).unwrap();

        let mut out = Vec::new();
        doc.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("table public.users"));
        assert!(text.contains("* name"));
        assert!(text.contains("  id"));
    }

    #[test]
    fn text_horizontal_emits_pairs_of_lines() {
        let mut doc = TextDocument::new(
            "public",
            "users",
            columns(),
            true,
            false,
            TableFormat::Horizontal,
        );
        let (mut o, mut t) = rows(b"1\ta", b"1\tA");
        doc.append(&mut o, &mut t).unwrap();

        let mut out = Vec::new();
        doc.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "id\tname");
        assert_eq!(lines[2], "1\ta");
        assert_eq!(lines[3], "1\t*A");
    }

    #[test]
    fn format_parsing() {
        assert_eq!(TableFormat::parse("vertical").unwrap(), TableFormat::Vertical);
        assert_eq!(TableFormat::parse("horizontal").unwrap(), TableFormat::Horizontal);
        assert!(TableFormat::parse("diagonal").is_err());
    }
}
