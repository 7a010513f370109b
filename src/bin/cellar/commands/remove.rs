//! `cellar remove` command

use anyhow::Result;

use crate::cli::RemoveArgs;
use crate::commands::open_and_resolve;
use crate::GlobalOptions;
use cellar::util::{Diagnostic, Status};

pub fn execute(args: RemoveArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let (registry, id) = open_and_resolve(&args.app)?;

    let removal = registry.remove_application(id)?;
    shell.status(
        Status::Removed,
        format!("{} ({})", removal.application.name, id.short()),
    );
    if let Some(warning) = &removal.warning {
        if !shell.is_quiet() {
            eprint!("{}", Diagnostic::from_error(warning).format(shell.use_color()));
        }
    }

    Ok(())
}
