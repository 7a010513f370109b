//! `cellar launch` command
//!
//! Installs the runtime on first use, with a progress bar, then starts the
//! application.

use anyhow::Result;

use crate::cli::LaunchArgs;
use crate::commands::{interrupt_token, open_and_resolve};
use crate::GlobalOptions;
use cellar::util::Status;

pub fn execute(args: LaunchArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let cancel = interrupt_token();
    let (registry, id) = open_and_resolve(&args.app)?;

    let details = registry.describe(id)?;
    let required = details.bottle.runtime_version.as_ref();
    let runtime = registry.runtime();
    if !runtime.current().satisfies(required) {
        crate::commands::runtime::install(runtime, required, &cancel, shell)
            .map_err(|e| e.for_app(id))?;
    }

    let result = registry.launch_application(id, &cancel)?;
    shell.status(
        Status::Launched,
        format!("{} (pid {})", details.application.name, result.pid),
    );
    if let Some(log) = &result.log {
        shell.note(format!("output is logged to {}", log.display()));
    }

    Ok(())
}
