//! The `restore` command.

use veildump::restore::run_restore;
use veildump::{Error, Storage};

use crate::context::CliContext;

pub fn run(ctx: &CliContext, archive_id: &str) -> veildump::Result<()> {
    let connector = ctx.connector()?;
    let root = ctx.storage_root()?;
    let archive = root.sub_storage(archive_id, false)?;
    if !archive.exists("toc.dat")? {
        return Err(Error::Config(format!("archive {archive_id:?} has no toc.dat")));
    }

    let summary = run_restore(connector.as_ref(), archive.as_ref(), &ctx.config)?;
    println!("restore complete: {} entries", summary.restored);
    for (entry, reason) in &summary.failed {
        println!("failed: {entry}: {reason}");
    }
    Ok(())
}
