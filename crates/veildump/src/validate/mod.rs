//! Validation driver.
//!
//! Validation answers "what would the dump do to my data" without
//! producing an archive: it runs the dump pipeline with a row cap into a
//! scratch namespace, with each sampled row stored twice (original line,
//! then transformed line), then renders side-by-side documents per table
//! and deletes the scratch data.

pub mod document;

use std::io::{BufRead, BufReader, Write};

use flate2::read::GzDecoder;
use tracing::{error, warn};

use veildump_core::copy::is_end_of_data;
use veildump_core::{CoreError, Row, Severity, ValidationWarning};
use veildump_storage::Storage;
use veildump_transform::TransformerRegistry;

use crate::catalog::TableTask;
use crate::config::Config;
use crate::db::Connector;
use crate::dump::{run_dump, DumpOptions};
use crate::error::{Error, Result};

use document::{Document, JsonDocument, TableFormat, TextDocument};

fn print_warnings(warnings: &[ValidationWarning], config: &Config) {
    for warning in warnings {
        if warning.severity == Severity::Error {
            error!(warning = %serde_json::json!(warning), "validation warning");
        } else if config.validate.warnings {
            warn!(warning = %serde_json::json!(warning), "validation warning");
        }
    }
}

fn build_document(task: &TableTask, config: &Config) -> Result<Box<dyn Document>> {
    match config.validate.format.as_str() {
        "json" => Ok(Box::new(JsonDocument::new(
            task.schema.clone(),
            task.name.clone(),
            task.columns.clone(),
            config.validate.diff,
            config.validate.only_transformed,
        ))),
        "text" => Ok(Box::new(TextDocument::new(
            task.schema.clone(),
            task.name.clone(),
            task.columns.clone(),
            config.validate.diff,
            config.validate.only_transformed,
            TableFormat::parse(&config.validate.table_format)?,
        ))),
        other => Err(Error::Config(format!("unknown validate format {other:?}"))),
    }
}

/// Reads original/transformed line pairs from one data object into a
/// document.
fn collect_document(
    task: &TableTask,
    storage: &dyn Storage,
    config: &Config,
) -> Result<Box<dyn Document>> {
    let mut doc = build_document(task, config)?;
    let compressed = storage.get(&task.data_file_name())?;
    let mut reader = BufReader::new(GzDecoder::new(compressed));

    let mut original_row = Row::new(task.columns.len());
    let mut transformed_row = Row::new(task.columns.len());
    let mut original_line = Vec::new();
    let mut transformed_line = Vec::new();

    loop {
        original_line.clear();
        if read_line(&mut reader, &mut original_line)? == 0 {
            break;
        }
        if is_end_of_data(&original_line) {
            break;
        }
        transformed_line.clear();
        if read_line(&mut reader, &mut transformed_line)? == 0 {
            return Err(Error::Core(CoreError::Encoding(
                "validation stream ended mid-pair".into(),
            )));
        }
        original_row.decode(&original_line)?;
        transformed_row.decode(&transformed_line)?;
        doc.append(&mut original_row, &mut transformed_row)?;
    }
    Ok(doc)
}

fn read_line(reader: &mut impl BufRead, buf: &mut Vec<u8>) -> Result<usize> {
    let n = reader.read_until(b'\n', buf)?;
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(n)
}

fn resolve_validate_tables(config: &Config) -> Result<Option<Vec<(String, String)>>> {
    if config.validate.tables.is_empty() {
        return Ok(None);
    }
    let mut resolved = Vec::with_capacity(config.validate.tables.len());
    for reference in &config.validate.tables {
        let table = config.find_table(reference)?;
        resolved.push((table.schema.clone(), table.name.clone()));
    }
    Ok(Some(resolved))
}

/// Runs a validation pass, printing per-table documents to `out`.
///
/// `scratch` is a dedicated namespace (a timestamped sub-directory of
/// `common.temp-directory`); it is deleted before returning, success or
/// not.
///
/// Returns the number of tables validated.
///
/// # Errors
///
/// Returns [`Error::ValidationFatal`] for error-severity warnings and any
/// dump-path error otherwise.
pub fn run_validate(
    connector: &dyn Connector,
    scratch: &dyn Storage,
    registry: &TransformerRegistry,
    config: &Config,
    out: &mut dyn Write,
) -> Result<usize> {
    let result = run_validate_inner(connector, scratch, registry, config, out);
    if let Err(e) = scratch.delete_all() {
        warn!(error = %e, "failed to delete validation scratch directory");
    }
    result
}

fn run_validate_inner(
    connector: &dyn Connector,
    scratch: &dyn Storage,
    registry: &TransformerRegistry,
    config: &Config,
    out: &mut dyn Write,
) -> Result<usize> {
    let options = DumpOptions {
        validate: true,
        rows_limit: Some(config.validate.rows_limit),
        only_tables: resolve_validate_tables(config)?,
    };
    let summary = run_dump(connector, scratch, registry, config, &options)?;
    print_warnings(&summary.warnings, config);

    if !config.validate.data {
        return Ok(0);
    }

    let mut printed = 0;
    for (task, _rows) in &summary.completed {
        let doc = collect_document(task, scratch, config)?;
        doc.print(out)?;
        printed += 1;
    }
    Ok(printed)
}
