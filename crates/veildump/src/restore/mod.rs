//! Restore orchestration.
//!
//! Restore reads the TOC, orders entries by section
//! (pre-data, data, post-data) and by their dependency edges, and
//! executes each entry in its own transaction: DDL entries run their
//! `defn`, data entries replay the archived COPY stream through
//! `COPY ... FROM STDIN`. The data bytes travel unchanged; the archive
//! stores format-compliant COPY text, so no re-encoding happens on the
//! way back in.

use std::io::Read;

use flate2::read::GzDecoder;
use tracing::{info, warn};

use veildump_storage::Storage;
use veildump_toc::{read_toc, DumpId, Entry, Section, Toc, TocError};

use crate::cancel::CancelToken;
use crate::config::{Config, RestoreErrorPolicy};
use crate::db::{Connector, DbConn};
use crate::error::{Error, Result};

/// Outcome of a restore.
#[derive(Debug, Default)]
pub struct RestoreSummary {
    /// Entries executed successfully.
    pub restored: usize,
    /// Entries that failed, with reasons (only populated under
    /// `on-error: continue`).
    pub failed: Vec<(String, String)>,
}

fn entry_display(entry: &Entry) -> String {
    format!(
        "{} {}{}",
        entry.desc.as_deref().unwrap_or("ENTRY"),
        entry.namespace.as_deref().map(|n| format!("{n}.")).unwrap_or_default(),
        entry.tag.as_deref().unwrap_or("?"),
    )
}

/// Computes the execution order: section-major, dependency-respecting,
/// deterministic (ready entries run in dump-id order).
///
/// # Errors
///
/// Returns [`Error::Toc`] if dependencies cross sections backwards or
/// form a cycle.
pub fn restore_order(toc: &Toc) -> Result<Vec<DumpId>> {
    let mut order = Vec::with_capacity(toc.entries.len());
    for section in [Section::None, Section::PreData, Section::Data, Section::PostData] {
        let mut in_section: Vec<&Entry> =
            toc.entries.iter().filter(|e| e.section == section).collect();
        in_section.sort_by_key(|e| e.dump_id);

        // Dependencies on earlier sections are satisfied by section order;
        // only intra-section edges constrain the order here.
        let section_ids: std::collections::BTreeSet<DumpId> =
            in_section.iter().map(|e| e.dump_id).collect();
        let mut pending: std::collections::BTreeMap<DumpId, usize> = std::collections::BTreeMap::new();
        let mut dependents: std::collections::BTreeMap<DumpId, Vec<DumpId>> =
            std::collections::BTreeMap::new();
        for entry in &in_section {
            let mut count = 0;
            for dep in &entry.dependencies {
                let dep_entry = toc.entries.iter().find(|e| e.dump_id == *dep).ok_or_else(
                    || TocError::Corrupt(format!("dependency {dep} not present in toc")),
                )?;
                if dep_entry.section > section {
                    return Err(Error::Toc(TocError::Corrupt(format!(
                        "entry {} depends on later-section entry {dep}",
                        entry.dump_id
                    ))));
                }
                if section_ids.contains(dep) {
                    count += 1;
                    dependents.entry(*dep).or_default().push(entry.dump_id);
                }
            }
            pending.insert(entry.dump_id, count);
        }

        let mut ready: std::collections::BTreeSet<DumpId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut emitted = 0;
        while let Some(&id) = ready.iter().next() {
            ready.remove(&id);
            order.push(id);
            emitted += 1;
            for dependent in dependents.get(&id).cloned().unwrap_or_default() {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
        if emitted != in_section.len() {
            return Err(Error::Toc(TocError::Corrupt(format!(
                "dependency cycle within {section:?} section"
            ))));
        }
    }
    Ok(order)
}

fn restore_entry(conn: &mut dyn DbConn, storage: &dyn Storage, entry: &Entry) -> Result<()> {
    if entry.is_data() {
        let file_name =
            entry.file_name.clone().unwrap_or_else(|| format!("{}.dat.gz", entry.dump_id));
        let copy_stmt = entry
            .copy_stmt
            .as_deref()
            .ok_or_else(|| {
                Error::Toc(TocError::Corrupt(format!(
                    "data entry {} has no copy statement",
                    entry.dump_id
                )))
            })?
            .trim_end()
            .trim_end_matches(';')
            .to_owned();

        let compressed = storage.get(&file_name)?;
        let mut decoder = GzDecoder::new(compressed);

        conn.batch_execute("BEGIN")?;
        let outcome = conn.copy_in(&copy_stmt, &mut decoder as &mut dyn Read);
        match outcome {
            Ok(rows) => {
                conn.batch_execute("COMMIT")?;
                info!(entry = %entry_display(entry), rows, "data restored");
                Ok(())
            }
            Err(e) => {
                let _ = conn.batch_execute("ROLLBACK");
                Err(e)
            }
        }
    } else {
        let Some(defn) = entry.defn.as_deref().filter(|d| !d.trim().is_empty()) else {
            return Ok(());
        };
        conn.batch_execute("BEGIN")?;
        match conn.batch_execute(defn) {
            Ok(()) => {
                conn.batch_execute("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.batch_execute("ROLLBACK");
                Err(e)
            }
        }
    }
}

fn data_entries_are_independent(toc: &Toc) -> bool {
    let data_ids: Vec<DumpId> =
        toc.entries.iter().filter(|e| e.section == Section::Data).map(|e| e.dump_id).collect();
    toc.entries
        .iter()
        .filter(|e| e.section == Section::Data)
        .all(|e| e.dependencies.iter().all(|dep| !data_ids.contains(dep)))
}

/// Restores an archive.
///
/// DDL sections run sequentially in dependency order. The data section
/// runs on `restore.jobs` workers when its entries are mutually
/// independent (the normal case; every data entry depends only on
/// pre-data DDL).
///
/// # Errors
///
/// Under `on-error: abort`, the first failed entry aborts the restore.
/// Under `continue`, failures are collected in the summary.
pub fn run_restore(
    connector: &dyn Connector,
    storage: &dyn Storage,
    config: &Config,
) -> Result<RestoreSummary> {
    let toc = read_toc(storage.get("toc.dat")?)?;
    toc.validate()?;
    let order = restore_order(&toc)?;
    let policy = config.restore.on_error;
    let jobs = config.restore.jobs.max(1);
    let parallel_data = jobs > 1 && data_entries_are_independent(&toc);

    let mut summary = RestoreSummary::default();
    let mut conn = connector.connect()?;

    let mut data_batch: Vec<&Entry> = Vec::new();
    for id in &order {
        let Some(entry) = toc.entries.iter().find(|e| e.dump_id == *id) else {
            continue;
        };
        if parallel_data && entry.section == Section::Data {
            data_batch.push(entry);
            continue;
        }
        match restore_entry(conn.as_mut(), storage, entry) {
            Ok(()) => summary.restored += 1,
            Err(e) => match policy {
                RestoreErrorPolicy::Abort => {
                    return Err(e);
                }
                RestoreErrorPolicy::Continue => {
                    warn!(entry = %entry_display(entry), error = %e, "entry failed; continuing");
                    summary.failed.push((entry_display(entry), e.to_string()));
                }
            },
        }
    }

    if !data_batch.is_empty() {
        let cancel = CancelToken::new();
        let (task_tx, task_rx) = crossbeam_channel::bounded::<&Entry>(data_batch.len());
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<(String, Result<()>)>();
        for entry in &data_batch {
            let _ = task_tx.send(entry);
        }
        drop(task_tx);

        let mut outcomes = Vec::new();
        std::thread::scope(|scope| {
            for _ in 0..jobs.min(data_batch.len()) {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let cancel = cancel.clone();
                scope.spawn(move || {
                    let mut conn = match connector.connect() {
                        Ok(conn) => conn,
                        Err(e) => {
                            cancel.cancel();
                            let _ = result_tx.send(("<connect>".into(), Err(e)));
                            return;
                        }
                    };
                    while let Ok(entry) = task_rx.recv() {
                        if cancel.is_cancelled() && policy == RestoreErrorPolicy::Abort {
                            break;
                        }
                        let outcome = restore_entry(conn.as_mut(), storage, entry);
                        if outcome.is_err() && policy == RestoreErrorPolicy::Abort {
                            cancel.cancel();
                        }
                        let _ = result_tx.send((entry_display(entry), outcome));
                    }
                });
            }
            drop(result_tx);
            for outcome in result_rx.iter() {
                outcomes.push(outcome);
            }
        });

        for (entry, outcome) in outcomes {
            match outcome {
                Ok(()) => summary.restored += 1,
                Err(e) => match policy {
                    RestoreErrorPolicy::Abort => return Err(e),
                    RestoreErrorPolicy::Continue => {
                        summary.failed.push((entry, e.to_string()));
                    }
                },
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veildump_toc::desc;

    fn entry(id: DumpId, section: Section, deps: Vec<DumpId>) -> Entry {
        let mut entry = Entry::new(id, section);
        entry.tag = Some(format!("e{id}"));
        entry.defn = Some(format!("-- entry {id}"));
        entry.dependencies = deps;
        entry
    }

    #[test]
    fn order_respects_sections_regardless_of_toc_order() {
        let mut toc = Toc::default();
        // Deliberately shuffled input: post-data first.
        toc.entries = vec![
            entry(3, Section::PostData, vec![2]),
            entry(1, Section::PreData, vec![]),
            entry(2, Section::Data, vec![1]),
        ];
        assert_eq!(restore_order(&toc).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn order_respects_intra_section_dependencies() {
        let mut toc = Toc::default();
        toc.entries = vec![
            entry(1, Section::PreData, vec![3]),
            entry(2, Section::PreData, vec![]),
            entry(3, Section::PreData, vec![2]),
        ];
        assert_eq!(restore_order(&toc).unwrap(), vec![2, 3, 1]);
    }

    #[test]
    fn order_rejects_forward_section_dependency() {
        let mut toc = Toc::default();
        toc.entries =
            vec![entry(1, Section::PreData, vec![2]), entry(2, Section::Data, vec![])];
        assert!(restore_order(&toc).is_err());
    }

    #[test]
    fn order_rejects_cycles() {
        let mut toc = Toc::default();
        toc.entries = vec![
            entry(1, Section::PreData, vec![2]),
            entry(2, Section::PreData, vec![1]),
        ];
        assert!(restore_order(&toc).is_err());
    }

    #[test]
    fn data_independence_detection() {
        let mut toc = Toc::default();
        let mut data = entry(2, Section::Data, vec![1]);
        data.desc = Some(desc::TABLE_DATA.into());
        toc.entries = vec![entry(1, Section::PreData, vec![]), data];
        assert!(data_entries_are_independent(&toc));

        let mut dependent = entry(3, Section::Data, vec![2]);
        dependent.desc = Some(desc::TABLE_DATA.into());
        toc.entries.push(dependent);
        assert!(!data_entries_are_independent(&toc));
    }
}
