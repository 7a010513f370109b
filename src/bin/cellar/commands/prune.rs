//! `cellar prune` command

use anyhow::Result;

use crate::cli::PruneArgs;
use crate::commands::open_registry;
use crate::GlobalOptions;
use cellar::util::fs::format_size;
use cellar::util::Status;

pub fn execute(args: PruneArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let (_, registry) = open_registry()?;

    let orphans = registry.sweep_orphans(args.dry_run)?;
    if orphans.is_empty() {
        shell.note("no orphaned bottles");
        return Ok(());
    }

    let mut freed = 0;
    for orphan in &orphans {
        let what = format!("{} ({})", orphan.path.display(), format_size(orphan.size));
        if args.dry_run {
            shell.status(Status::Info, format!("would remove {}", what));
        } else if orphan.removed {
            freed += orphan.size;
            shell.status(Status::Removed, what);
        } else {
            shell.warn(format!("could not remove {}", what));
        }
    }
    if !args.dry_run {
        shell.note(format!("freed {}", format_size(freed)));
    }

    Ok(())
}
