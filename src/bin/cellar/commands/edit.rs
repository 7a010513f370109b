//! `cellar edit` and `cellar move` commands

use anyhow::{bail, Result};

use crate::cli::{EditArgs, MoveArgs};
use crate::commands::open_and_resolve;
use crate::GlobalOptions;
use cellar::util::Status;
use cellar::AppEdit;

pub fn execute(args: EditArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let edit = edit_from_args(&args);
    if edit.is_empty() {
        bail!("nothing to change; pass --name, --category, --notes, --args or --clear-args");
    }

    let (registry, id) = open_and_resolve(&args.app)?;
    let app = registry.edit_application(id, edit)?;
    shell.status(Status::Updated, format!("{} ({})", app.name, app.id.short()));

    Ok(())
}

pub fn execute_move(args: MoveArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let (registry, id) = open_and_resolve(&args.app)?;
    let app = registry.set_category(id, &args.category)?;
    shell.status(Status::Updated, format!("{} moved to {}", app.name, app.category));

    Ok(())
}

fn edit_from_args(args: &EditArgs) -> AppEdit {
    let launch_args = if args.clear_args {
        Some(Vec::new())
    } else {
        args.args
            .as_ref()
            .map(|a| a.split_whitespace().map(String::from).collect())
    };

    AppEdit {
        name: args.name.clone(),
        category: args.category.clone(),
        notes: args.notes.clone(),
        args: launch_args,
    }
}
