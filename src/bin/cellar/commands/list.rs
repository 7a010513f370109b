//! `cellar list` command
//!
//! Prints applications grouped by category.

use anyhow::Result;

use crate::cli::ListArgs;
use crate::commands::open_registry;
use crate::GlobalOptions;
use cellar::ops::{ListEntry, ListFilter, Listing};

pub fn execute(args: ListArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let (_, registry) = open_registry()?;

    let listing = registry.list_applications(ListFilter {
        category: args.category,
        name: args.name,
    });

    if args.json {
        let entries: Vec<&ListEntry> = listing.iter().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if listing.is_empty() {
        shell.note("no applications found");
        return Ok(());
    }
    print!("{}", render(&listing));

    Ok(())
}

/// Render a listing as one block per category.
fn render(listing: &Listing) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;

    for entry in listing {
        let app = &entry.application;
        if current.map_or(true, |c| !c.eq_ignore_ascii_case(&app.category)) {
            if current.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("{}:\n", app.category));
            current = Some(app.category.as_str());
        }
        out.push_str(&format!(
            "  {}  {:<30} {}\n",
            app.id.short(),
            app.name,
            entry.bottle.status
        ));
    }

    out
}
