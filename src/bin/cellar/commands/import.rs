//! `cellar import` command

use anyhow::Result;

use crate::cli::ImportArgs;
use crate::commands::open_registry;
use crate::GlobalOptions;
use cellar::util::Status;

pub fn execute(args: ImportArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let (_, registry) = open_registry()?;

    let report = registry.import_legacy(&args.file)?;
    for app in &report.imported {
        shell.status(Status::Added, format!("{} in {}", app.name, app.category));
    }
    for skipped in &report.skipped {
        shell.status(Status::Skipped, &skipped.reason);
    }
    shell.note(format!(
        "imported {} applications, skipped {}",
        report.imported.len(),
        report.skipped.len()
    ));

    Ok(())
}
