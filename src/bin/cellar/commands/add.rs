//! `cellar add` command

use anyhow::Result;

use crate::cli::AddArgs;
use crate::commands::open_registry;
use crate::GlobalOptions;
use cellar::util::Status;

pub fn execute(args: AddArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let (_, registry) = open_registry()?;

    let app = registry.add_application(&args.path, args.category.as_deref(), args.name.as_deref())?;

    shell.status(
        Status::Added,
        format!("{} ({}) in {}", app.name, app.id.short(), app.category),
    );
    if let Some(entry) = registry.catalog().lookup(&app.name) {
        shell.note(format!("catalog rating: {}", entry.rating));
        if !entry.notes.is_empty() {
            shell.note(&entry.notes);
        }
    }

    Ok(())
}
