//! The `delete` command.

use veildump::archive::delete_archive;

use crate::context::CliContext;

pub fn run(ctx: &CliContext, archive_id: &str) -> veildump::Result<()> {
    let root = ctx.storage_root()?;
    delete_archive(&root, archive_id)?;
    println!("deleted archive {archive_id}");
    Ok(())
}
