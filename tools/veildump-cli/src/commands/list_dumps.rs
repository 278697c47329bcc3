//! The `list-dumps` command.

use veildump::archive::list_archives;

use crate::context::CliContext;

pub fn run(ctx: &CliContext) -> veildump::Result<()> {
    let root = ctx.storage_root()?;
    let archives = list_archives(&root)?;
    if archives.is_empty() {
        println!("no archives under {}", ctx.config.storage.directory);
        return Ok(());
    }

    println!(
        "{:<16} {:<26} {:<16} {:>8} {:>10} {}",
        "ID", "CREATED", "DATABASE", "ENTRIES", "ROWS", "STATUS"
    );
    for archive in archives {
        println!(
            "{:<16} {:<26} {:<16} {:>8} {:>10} {}",
            archive.id,
            archive.created_at.as_deref().unwrap_or("-"),
            archive.database.as_deref().unwrap_or("-"),
            archive.entries,
            archive.total_rows.map(|r| r.to_string()).unwrap_or_else(|| "-".into()),
            if archive.complete { "complete" } else { "incomplete" },
        );
    }
    Ok(())
}
