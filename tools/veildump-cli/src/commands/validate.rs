//! The `validate` command.

use veildump::archive::new_archive_id;
use veildump::validate::run_validate;
use veildump::{DirectoryStorage, Storage};

use crate::context::CliContext;

pub fn run(ctx: &CliContext) -> veildump::Result<()> {
    let connector = ctx.connector()?;
    let temp_root = DirectoryStorage::open(&ctx.config.common.temp_directory)?;
    let scratch = temp_root.sub_storage(&format!("veildump-validate-{}", new_archive_id()), true)?;

    let mut stdout = std::io::stdout().lock();
    let tables = run_validate(
        connector.as_ref(),
        scratch.as_ref(),
        &ctx.registry,
        &ctx.config,
        &mut stdout,
    )?;
    tracing::info!(tables, "validation finished");
    Ok(())
}
