//! Dump orchestration.
//!
//! A dump runs in three phases. Metadata extraction opens one
//! `REPEATABLE READ` transaction, exports its snapshot, and freezes the
//! plan (TOC entries, dump ids, per-table tasks). Data extraction runs N
//! workers, each in its own transaction attached to the exported snapshot,
//! pulling tables off a longest-job-first queue. Finally the TOC is
//! serialized, strictly after every data object is durably committed, so
//! a readable `toc.dat` implies a complete archive.
//!
//! On any worker's fatal error the cancel token trips, in-flight tables
//! stop at their next row boundary, and the partial archive directory is
//! deleted unless `keep-on-failure` is set.

pub mod metadata;
pub mod table;

use time::OffsetDateTime;
use tracing::{error, info, warn};

use veildump_core::{is_fatal, suppress_resolved, Severity, ValidationWarning};
use veildump_storage::Storage;
use veildump_toc::write_toc;
use veildump_transform::TransformerRegistry;

use crate::cancel::CancelToken;
use crate::catalog::{build_plan, gather_facts, TableTask};
use crate::config::{Config, RowErrorPolicy};
use crate::db::{Connector, DbConn};
use crate::error::{Error, Result};

use metadata::{format_timestamp, write_metadata, ArchiveMetadata};

/// Tool version string recorded in archives.
pub const DUMPER_VERSION: &str = concat!("veildump ", env!("CARGO_PKG_VERSION"));

/// Knobs distinguishing a plain dump from a validation dump.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Emit original/transformed line pairs and skip the TOC.
    pub validate: bool,
    /// Row cap per table, used by validation runs.
    pub rows_limit: Option<u64>,
    /// Restrict the run to these tasks (validate `tables` filter), by
    /// `schema.name`.
    pub only_tables: Option<Vec<(String, String)>>,
}

/// Outcome of a dump.
#[derive(Debug)]
pub struct DumpSummary {
    /// Data entries written.
    pub tables: usize,
    /// Rows across all data entries.
    pub rows: u64,
    /// Warnings that survived resolved-hash suppression.
    pub warnings: Vec<ValidationWarning>,
    /// Completed tasks with their row counts, in dump-id order. The
    /// validation driver uses these to locate and decode the sample data.
    pub completed: Vec<(TableTask, u64)>,
}

#[derive(Debug)]
struct TableStat {
    task: TableTask,
    rows: u64,
}

fn export_snapshot(conn: &mut dyn DbConn) -> Result<Option<String>> {
    let rows = conn.query_rows("SELECT pg_catalog.pg_export_snapshot()::text")?;
    Ok(rows.first().and_then(|row| row.first().cloned()).flatten())
}

fn begin_worker_tx(conn: &mut dyn DbConn, snapshot: Option<&str>) -> Result<()> {
    conn.batch_execute("BEGIN ISOLATION LEVEL REPEATABLE READ READ ONLY")?;
    if let Some(snapshot) = snapshot {
        conn.batch_execute(&format!(
            "SET TRANSACTION SNAPSHOT '{}'",
            snapshot.replace('\'', "''")
        ))?;
    }
    Ok(())
}

fn dump_one(
    conn: &mut dyn DbConn,
    task: TableTask,
    registry: &TransformerRegistry,
    storage: &dyn Storage,
    policy: RowErrorPolicy,
    validate: bool,
    cancel: &CancelToken,
) -> Result<TableStat> {
    let (mut transformers, _) = task.bind_transformers(registry)?;
    let sql = task.copy_out_sql();
    let mut stream = conn.copy_out(&sql)?;
    let rows = table::dump_table(
        &task,
        &mut transformers,
        stream.as_mut(),
        storage,
        policy,
        validate,
        cancel,
    )?;
    Ok(TableStat { task, rows })
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    connector: &dyn Connector,
    registry: &TransformerRegistry,
    storage: &dyn Storage,
    snapshot: Option<&str>,
    policy: RowErrorPolicy,
    validate: bool,
    task_rx: &crossbeam_channel::Receiver<TableTask>,
    result_tx: &crossbeam_channel::Sender<Result<TableStat>>,
    cancel: &CancelToken,
) {
    let mut conn = match connector.connect().and_then(|mut conn| {
        begin_worker_tx(conn.as_mut(), snapshot)?;
        Ok(conn)
    }) {
        Ok(conn) => conn,
        Err(e) => {
            cancel.cancel();
            let _ = result_tx.send(Err(e));
            return;
        }
    };

    while let Ok(task) = task_rx.recv() {
        if cancel.is_cancelled() {
            break;
        }
        let outcome = dump_one(
            conn.as_mut(),
            task,
            registry,
            storage,
            policy,
            validate,
            cancel,
        );
        let failed = outcome.is_err();
        if failed {
            cancel.cancel();
        }
        let _ = result_tx.send(outcome);
        if failed {
            break;
        }
    }
    let _ = conn.batch_execute("ROLLBACK");
}

/// Runs a dump into `storage` (the archive's own namespace).
///
/// # Errors
///
/// Returns [`Error::ValidationFatal`] when planning produced
/// error-severity warnings, the first worker error otherwise. On failure
/// the partial archive is deleted unless `dump.keep-on-failure` is set.
pub fn run_dump(
    connector: &dyn Connector,
    storage: &dyn Storage,
    registry: &TransformerRegistry,
    config: &Config,
    options: &DumpOptions,
) -> Result<DumpSummary> {
    let started_at = OffsetDateTime::now_utc();

    let mut conn = connector.connect()?;
    conn.batch_execute("BEGIN ISOLATION LEVEL REPEATABLE READ READ ONLY")?;
    let facts = gather_facts(conn.as_mut())?;
    let snapshot = export_snapshot(conn.as_mut())?;
    let mut plan = build_plan(conn.as_mut(), config, registry)?;

    let warnings = suppress_resolved(&plan.warnings, &config.validate.resolved_warnings)?;
    if is_fatal(&warnings) {
        for warning in warnings.iter().filter(|w| w.severity == Severity::Error) {
            error!(warning = %serde_json::json!(warning), "fatal validation warning");
        }
        return Err(Error::ValidationFatal);
    }

    if let Some(only) = &options.only_tables {
        plan.tables.retain(|t| only.iter().any(|(s, n)| &t.schema == s && &t.name == n));
    }
    if options.validate {
        plan.tables.retain(|t| !t.transformers.is_empty());
        for task in &mut plan.tables {
            task.validate_limited_records = options.rows_limit;
        }
    }

    // Longest job first: workers start the biggest tables while the queue
    // still has work for the rest.
    plan.tables.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then(a.dump_id.cmp(&b.dump_id)));

    let policy = config.dump.on_row_error;
    let jobs = config.common.jobs.clamp(1, plan.tables.len().max(1));
    let cancel = CancelToken::new();

    let (task_tx, task_rx) = crossbeam_channel::bounded(plan.tables.len().max(1));
    let (result_tx, result_rx) = crossbeam_channel::unbounded();
    for task in std::mem::take(&mut plan.tables) {
        let _ = task_tx.send(task);
    }
    drop(task_tx);

    let mut results: Vec<Result<TableStat>> = Vec::new();
    std::thread::scope(|scope| {
        for _ in 0..jobs {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            let snapshot = snapshot.clone();
            scope.spawn(move || {
                worker_loop(
                    connector,
                    registry,
                    storage,
                    snapshot.as_deref(),
                    policy,
                    options.validate,
                    &task_rx,
                    &result_tx,
                    &cancel,
                );
            });
        }
        drop(result_tx);
        for result in result_rx.iter() {
            if result.is_err() {
                cancel.cancel();
            }
            results.push(result);
        }
    });

    let mut rows = 0;
    let mut completed: Vec<(TableTask, u64)> = Vec::new();
    let mut primary_error: Option<Error> = None;
    for result in results {
        match result {
            Ok(stat) => {
                info!(table = %stat.task.display_name(), rows = stat.rows, "table dumped");
                rows += stat.rows;
                completed.push((stat.task, stat.rows));
            }
            Err(Error::Cancelled) => {
                if primary_error.is_none() {
                    primary_error = Some(Error::Cancelled);
                }
            }
            Err(e) => {
                if matches!(primary_error, None | Some(Error::Cancelled)) {
                    primary_error = Some(e);
                }
            }
        }
    }

    if let Some(error) = primary_error {
        if config.dump.keep_on_failure {
            warn!("dump failed; keeping partial archive as requested");
        } else if let Err(cleanup) = storage.delete_all() {
            warn!(error = %cleanup, "failed to clean up partial archive");
        }
        return Err(error);
    }

    if !options.validate {
        plan.toc.header.created_at = veildump_toc::CreatedAt::from_datetime(started_at);
        plan.toc.header.dbname = facts.dbname.clone();
        plan.toc.header.server_version = facts.server_version.clone();
        plan.toc.header.dumper_version = Some(DUMPER_VERSION.to_owned());

        write_metadata(
            storage,
            &ArchiveMetadata {
                started_at: format_timestamp(started_at),
                completed_at: format_timestamp(OffsetDateTime::now_utc()),
                database: facts.dbname,
                server_version: facts.server_version,
                dumper_version: DUMPER_VERSION.to_owned(),
                total_rows: rows,
                total_tables: completed.len(),
                warnings: warnings.clone(),
                transformation: config.dump.transformation.clone(),
            },
        )?;

        let mut toc_writer = storage.put("toc.dat")?;
        write_toc(&mut toc_writer, &plan.toc)?;
        toc_writer.commit()?;
    }

    let _ = conn.batch_execute("ROLLBACK");
    completed.sort_by_key(|(task, _)| task.dump_id);
    let tables = completed.len();
    Ok(DumpSummary { tables, rows, warnings, completed })
}
