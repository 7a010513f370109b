//! Cellar CLI - run Windows applications in per-application Wine bottles

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cellar::util::{Diagnostic, Shell};
use cellar::CellarError;
use cli::{Cli, Commands};

/// Options shared by every command.
pub struct GlobalOptions {
    pub shell: Shell,
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalOptions {
        shell: Shell::from_flags(cli.quiet, cli.verbose, cli.no_color),
    };

    if let Err(e) = run(cli, &global) {
        report(&e, &global.shell);
        std::process::exit(1);
    }
}

fn run(cli: Cli, global: &GlobalOptions) -> Result<()> {
    // Set up logging; CELLAR_LOG overrides the level
    let filter = EnvFilter::try_from_env("CELLAR_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("cellar=debug")
        } else {
            EnvFilter::new("cellar=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Add(args) => commands::add::execute(args, global),
        Commands::List(args) => commands::list::execute(args, global),
        Commands::Info(args) => commands::info::execute(args, global),
        Commands::Launch(args) => commands::launch::execute(args, global),
        Commands::Edit(args) => commands::edit::execute(args, global),
        Commands::Move(args) => commands::edit::execute_move(args, global),
        Commands::Remove(args) => commands::remove::execute(args, global),
        Commands::Runtime(args) => commands::runtime::execute(args, global),
        Commands::Catalog(args) => commands::catalog::execute(args, global),
        Commands::Prune(args) => commands::prune::execute(args, global),
        Commands::Import(args) => commands::import::execute(args, global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print a failed command's error, with help text for library errors.
fn report(e: &anyhow::Error, shell: &Shell) {
    match e.downcast_ref::<CellarError>() {
        Some(err) => eprint!("{}", Diagnostic::from_error(err).format(shell.use_color())),
        None => eprintln!("error: {:#}", e),
    }
}
