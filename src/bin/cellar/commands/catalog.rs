//! `cellar catalog` command

use anyhow::{bail, Result};

use crate::cli::{CatalogArgs, CatalogCommands};
use crate::GlobalOptions;
use cellar::core::{Catalog, CompatibilityEntry};
use cellar::GlobalContext;

pub fn execute(args: CatalogArgs, _global_opts: &GlobalOptions) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let catalog = Catalog::load(&ctx.catalog_path())?;

    match args.command {
        CatalogCommands::List { json } => {
            if json {
                let entries: serde_json::Map<String, serde_json::Value> = catalog
                    .iter()
                    .map(|e| serde_json::to_value(e).map(|v| (e.name.clone(), v)))
                    .collect::<Result<_, serde_json::Error>>()?;
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in catalog.iter() {
                    println!("{}", summary(entry));
                }
            }
        }
        CatalogCommands::Lookup { name } => match catalog.lookup(&name) {
            Some(entry) => {
                println!("{}", summary(entry));
                if !entry.description.is_empty() {
                    println!("  {}", entry.description);
                }
                if let Some(version) = &entry.runtime_version {
                    println!("  needs wine >= {}", version);
                }
                if !entry.notes.is_empty() {
                    println!("  {}", entry.notes);
                }
            }
            None => bail!("`{}` is not in the compatibility catalog", name),
        },
    }

    Ok(())
}

fn summary(entry: &CompatibilityEntry) -> String {
    match &entry.category {
        Some(category) => format!("{:<28} {:<9} {}", entry.name, entry.rating, category),
        None => format!("{:<28} {}", entry.name, entry.rating),
    }
}
