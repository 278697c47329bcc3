//! The `dump` command.

use veildump::archive::new_archive_id;
use veildump::dump::{run_dump, DumpOptions};
use veildump::Storage;

use crate::context::CliContext;

pub fn run(ctx: &CliContext) -> veildump::Result<()> {
    let connector = ctx.connector()?;
    let root = ctx.storage_root()?;
    let archive_id = new_archive_id();
    let archive = root.sub_storage(&archive_id, true)?;

    let summary = run_dump(
        connector.as_ref(),
        archive.as_ref(),
        &ctx.registry,
        &ctx.config,
        &DumpOptions::default(),
    )?;

    println!(
        "dump {archive_id} complete: {} tables, {} rows",
        summary.tables, summary.rows
    );
    Ok(())
}
