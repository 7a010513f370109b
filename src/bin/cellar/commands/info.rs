//! `cellar info` command

use anyhow::Result;

use crate::cli::InfoArgs;
use crate::commands::open_and_resolve;
use crate::GlobalOptions;
use cellar::util::fs::format_size;

pub fn execute(args: InfoArgs, _global_opts: &GlobalOptions) -> Result<()> {
    let (registry, id) = open_and_resolve(&args.app)?;
    let details = registry.describe(id)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }

    let app = &details.application;
    let bottle = &details.bottle;
    println!("{}", app.name);
    println!("  id:          {}", app.id);
    println!("  executable:  {}", app.source.display());
    println!("  category:    {}", app.category);
    if !app.args.is_empty() {
        println!("  arguments:   {}", app.args.join(" "));
    }
    if !app.notes.is_empty() {
        println!("  notes:       {}", app.notes);
    }
    println!("  added:       {}", app.created_at.format("%Y-%m-%d %H:%M"));
    match app.last_launched {
        Some(at) => println!("  launched:    {}", at.format("%Y-%m-%d %H:%M")),
        None => println!("  launched:    never"),
    }

    println!("  bottle:      {} ({})", bottle.root.display(), bottle.status);
    if let Some(size) = details.disk_usage {
        println!("  disk usage:  {}", format_size(size));
    }
    if let Some(version) = &bottle.runtime_version {
        println!("  needs wine:  >= {}", version);
    }
    if let Some(log) = &details.log {
        println!("  log:         {}", log.display());
    }

    if let Some(entry) = &details.catalog {
        println!("  rating:      {}", entry.rating);
        if !entry.description.is_empty() {
            println!("  about:       {}", entry.description);
        }
        if !entry.notes.is_empty() {
            println!("  tips:        {}", entry.notes);
        }
    }

    Ok(())
}
