//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Cellar - run Windows applications in per-application Wine bottles
#[derive(Parser)]
#[command(name = "cellar")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a Windows executable
    Add(AddArgs),

    /// List registered applications
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Show details about an application
    Info(InfoArgs),

    /// Launch an application in its bottle
    #[command(visible_alias = "run")]
    Launch(LaunchArgs),

    /// Change an application's name, notes or arguments
    Edit(EditArgs),

    /// Move an application to another category
    Move(MoveArgs),

    /// Remove an application and its bottle
    #[command(visible_alias = "rm")]
    Remove(RemoveArgs),

    /// Manage the Wine runtime
    Runtime(RuntimeArgs),

    /// Query the compatibility catalog
    Catalog(CatalogArgs),

    /// Delete bottle directories no application owns
    Prune(PruneArgs),

    /// Import applications from a legacy exes.json
    Import(ImportArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Path to the .exe
    pub path: PathBuf,

    /// Category (defaults to the catalog's suggestion)
    #[arg(short, long)]
    pub category: Option<String>,

    /// Display name (defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show this category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Only show names containing this text
    #[arg(short, long)]
    pub name: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Application id, id prefix or name
    pub app: String,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Application id, id prefix or name
    pub app: String,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Application id, id prefix or name
    pub app: String,

    /// New display name
    #[arg(long)]
    pub name: Option<String>,

    /// New category
    #[arg(long)]
    pub category: Option<String>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Launch arguments, split on whitespace
    #[arg(long, allow_hyphen_values = true, conflicts_with = "clear_args")]
    pub args: Option<String>,

    /// Remove all launch arguments
    #[arg(long)]
    pub clear_args: bool,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Application id, id prefix or name
    pub app: String,

    /// Target category
    pub category: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Application id, id prefix or name
    pub app: String,
}

#[derive(Args, Debug)]
pub struct RuntimeArgs {
    #[command(subcommand)]
    pub command: RuntimeCommands,
}

#[derive(Subcommand, Debug)]
pub enum RuntimeCommands {
    /// Download and install the configured runtime
    Install,

    /// Show the installed runtime
    Status {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommands,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// List all known applications
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up one application by name
    Lookup {
        /// Application name, case-insensitive
        name: String,
    },
}

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Only report what would be deleted
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to exes.json
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
