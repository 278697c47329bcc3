//! Per-table row driver.
//!
//! Streams one table's COPY data through the transformer chain into a
//! gzip-compressed storage object. Strictly sequential: rows leave in the
//! order the server emitted them.

use std::io::{BufRead, BufReader, Read, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::warn;

use veildump_core::copy::{is_end_of_data, END_OF_DATA};
use veildump_core::Row;
use veildump_storage::Storage;
use veildump_transform::BoundTransformer;

use crate::cancel::CancelToken;
use crate::catalog::TableTask;
use crate::config::RowErrorPolicy;
use crate::error::{Error, Result};

fn process_row(
    row: &mut Row,
    line: &[u8],
    transformers: &mut [BoundTransformer],
    out: &mut Vec<u8>,
) -> std::result::Result<(), (Option<String>, String)> {
    row.decode(line).map_err(|e| (None, e.to_string()))?;
    for transformer in transformers.iter_mut() {
        transformer
            .apply(row)
            .map_err(|e| (Some(transformer.name.clone()), e.to_string()))?;
    }
    out.clear();
    row.encode_into(out);
    Ok(())
}

/// Dumps one table from `input` (a raw COPY text stream) into
/// `<DumpId>.dat.gz`.
///
/// With `validate` set, each accepted row is written twice: the original
/// line first, the transformed line second. The stream always ends with
/// the `\.` terminator, so the object decompresses to a loadable COPY
/// stream either way.
///
/// Returns the number of rows emitted.
///
/// # Errors
///
/// Row failures are subject to `policy`; everything else (storage, codec
/// state, cancellation) is fatal for the table.
pub fn dump_table(
    task: &TableTask,
    transformers: &mut [BoundTransformer],
    input: &mut dyn Read,
    storage: &dyn Storage,
    policy: RowErrorPolicy,
    validate: bool,
    cancel: &CancelToken,
) -> Result<u64> {
    let writer = storage.put(&task.data_file_name())?;
    let mut gz = GzEncoder::new(writer, Compression::default());

    let mut reader = BufReader::new(input);
    let mut row = Row::new(task.columns.len());
    let mut line = Vec::new();
    let mut encoded = Vec::new();
    let mut ordinal: u64 = 0;
    let mut emitted: u64 = 0;

    loop {
        cancel.check()?;
        if let Some(limit) = task.validate_limited_records {
            if emitted >= limit {
                break;
            }
        }

        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if is_end_of_data(&line) {
            break;
        }
        ordinal += 1;

        match process_row(&mut row, &line, transformers, &mut encoded) {
            Ok(()) => {}
            Err((transformer, reason)) => {
                let error = Error::Row {
                    table: task.display_name(),
                    row_ordinal: ordinal,
                    transformer,
                    reason,
                };
                match policy {
                    RowErrorPolicy::Abort => return Err(error),
                    RowErrorPolicy::SkipRow => {
                        warn!(error = %error, "skipping row");
                        continue;
                    }
                    RowErrorPolicy::SkipTable => {
                        warn!(error = %error, "abandoning remaining rows of the table");
                        break;
                    }
                }
            }
        }

        if validate {
            gz.write_all(&line)?;
            gz.write_all(b"\n")?;
        }
        gz.write_all(&encoded)?;
        gz.write_all(b"\n")?;
        emitted += 1;
    }

    gz.write_all(END_OF_DATA)?;
    gz.write_all(b"\n")?;
    let writer = gz.finish()?;
    writer.commit()?;
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use veildump_core::Column;
    use veildump_storage::MemoryStorage;
    use veildump_transform::TransformerRegistry;

    use crate::config::TransformerUse;

    fn task(transformers: Vec<TransformerUse>) -> TableTask {
        TableTask {
            dump_id: 1,
            oid: 100,
            schema: "public".into(),
            name: "t".into(),
            columns: vec![
                Column::new("id", 0, 23, "int4").with_not_null(true),
                Column::new("name", 1, 25, "text"),
            ],
            primary_key: vec!["id".into()],
            size_bytes: 0,
            transformers,
            query: None,
            validate_limited_records: None,
        }
    }

    fn gunzip(storage: &MemoryStorage, key: &str) -> Vec<u8> {
        let mut compressed = Vec::new();
        storage.get(key).unwrap().read_to_end(&mut compressed).unwrap();
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(compressed.as_slice()).read_to_end(&mut out).unwrap();
        out
    }

    fn run(
        task: &TableTask,
        input: &[u8],
        policy: RowErrorPolicy,
        validate: bool,
    ) -> (MemoryStorage, Result<u64>) {
        let registry = TransformerRegistry::with_builtins();
        let (mut transformers, warnings) = task.bind_transformers(&registry).unwrap();
        assert!(!veildump_core::is_fatal(&warnings));
        let storage = MemoryStorage::new();
        let result = dump_table(
            task,
            &mut transformers,
            &mut Cursor::new(input.to_vec()),
            &storage,
            policy,
            validate,
            &CancelToken::new(),
        );
        (storage, result)
    }

    #[test]
    fn identity_dump_is_byte_exact() {
        let task = task(Vec::new());
        let (storage, result) =
            run(&task, b"1\ta\n2\tb\\tc\n", RowErrorPolicy::Abort, false);
        assert_eq!(result.unwrap(), 2);
        assert_eq!(gunzip(&storage, "1.dat.gz"), b"1\ta\n2\tb\\tc\n\\.\n");
    }

    #[test]
    fn null_preservation() {
        let task = task(Vec::new());
        let (storage, result) = run(&task, b"3\t\\N\n", RowErrorPolicy::Abort, false);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(gunzip(&storage, "1.dat.gz"), b"3\t\\N\n\\.\n");
    }

    #[test]
    fn skip_on_null_leaves_line_untouched() {
        let task = task(vec![TransformerUse {
            name: "masking".into(),
            params: [("column".to_owned(), serde_json::Value::from("name"))]
                .into_iter()
                .collect(),
        }]);
        let (storage, result) =
            run(&task, b"1\talice\n2\t\\N\n", RowErrorPolicy::Abort, false);
        assert_eq!(result.unwrap(), 2);
        assert_eq!(gunzip(&storage, "1.dat.gz"), b"1\t*****\n2\t\\N\n\\.\n");
    }

    #[test]
    fn end_of_data_marker_stops_the_stream() {
        let task = task(Vec::new());
        let (storage, result) =
            run(&task, b"1\ta\n\\.\n9\tghost\n", RowErrorPolicy::Abort, false);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(gunzip(&storage, "1.dat.gz"), b"1\ta\n\\.\n");
    }

    #[test]
    fn validate_mode_emits_pairs() {
        let task = task(vec![TransformerUse {
            name: "replace".into(),
            params: [
                ("column".to_owned(), serde_json::Value::from("name")),
                ("value".to_owned(), serde_json::Value::from("X")),
            ]
            .into_iter()
            .collect(),
        }]);
        let (storage, result) = run(&task, b"1\ta\n", RowErrorPolicy::Abort, true);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(gunzip(&storage, "1.dat.gz"), b"1\ta\n1\tX\n\\.\n");
    }

    #[test]
    fn row_limit_caps_output() {
        let mut task = task(Vec::new());
        task.validate_limited_records = Some(2);
        let (storage, result) =
            run(&task, b"1\ta\n2\tb\n3\tc\n", RowErrorPolicy::Abort, false);
        assert_eq!(result.unwrap(), 2);
        assert_eq!(gunzip(&storage, "1.dat.gz"), b"1\ta\n2\tb\n\\.\n");
    }

    #[test]
    fn abort_policy_reports_row_context() {
        let task = task(Vec::new());
        let (_, result) = run(&task, b"1\ta\n2\tb\textra\n", RowErrorPolicy::Abort, false);
        match result.unwrap_err() {
            Error::Row { table, row_ordinal, transformer, .. } => {
                assert_eq!(table, "public.t");
                assert_eq!(row_ordinal, 2);
                assert_eq!(transformer, None);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn skip_row_policy_drops_bad_rows() {
        let task = task(Vec::new());
        let (storage, result) =
            run(&task, b"1\ta\nbroken\n3\tc\n", RowErrorPolicy::SkipRow, false);
        assert_eq!(result.unwrap(), 2);
        assert_eq!(gunzip(&storage, "1.dat.gz"), b"1\ta\n3\tc\n\\.\n");
    }

    #[test]
    fn skip_table_policy_keeps_prefix() {
        let task = task(Vec::new());
        let (storage, result) =
            run(&task, b"1\ta\nbroken\n3\tc\n", RowErrorPolicy::SkipTable, false);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(gunzip(&storage, "1.dat.gz"), b"1\ta\n\\.\n");
    }

    #[test]
    fn cancellation_aborts_between_rows() {
        let task = task(Vec::new());
        let registry = TransformerRegistry::with_builtins();
        let (mut transformers, _) = task.bind_transformers(&registry).unwrap();
        let storage = MemoryStorage::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = dump_table(
            &task,
            &mut transformers,
            &mut Cursor::new(b"1\ta\n".to_vec()),
            &storage,
            RowErrorPolicy::Abort,
            false,
            &cancel,
        );
        assert!(matches!(result.unwrap_err(), Error::Cancelled));
        assert!(!storage.exists("1.dat.gz").unwrap());
    }
}
