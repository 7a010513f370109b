//! `cellar runtime` command
//!
//! Installs and inspects the managed Wine runtime.

use anyhow::Result;
use semver::Version;

use crate::cli::{RuntimeArgs, RuntimeCommands};
use crate::commands::interrupt_token;
use crate::GlobalOptions;
use cellar::core::{RuntimeInstallation, RuntimeOrigin};
use cellar::runtime::UrlFetcher;
use cellar::util::{Shell, Status};
use cellar::{CancelToken, CellarResult, GlobalContext, RuntimeInstaller};

pub fn execute(args: RuntimeArgs, global_opts: &GlobalOptions) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let installer = RuntimeInstaller::from_config(
        ctx.runtime_root(),
        &ctx.config().runtime,
        std::sync::Arc::new(UrlFetcher::from_config(&ctx.config().runtime)),
    )?;

    match args.command {
        RuntimeCommands::Install => {
            let shell = &global_opts.shell;
            let current = installer.current();
            if current.satisfies(Some(&installer.source().version)) {
                shell.status(
                    Status::Skipped,
                    format!("{} is already installed", describe(&current)),
                );
                return Ok(());
            }
            let required = installer.source().version.clone();
            install(&installer, Some(&required), &interrupt_token(), shell)?;
            Ok(())
        }
        RuntimeCommands::Status { json } => status(&installer, json),
    }
}

/// Install the runtime, drawing a download progress bar.
pub(crate) fn install(
    installer: &RuntimeInstaller,
    required: Option<&Version>,
    cancel: &CancelToken,
    shell: &Shell,
) -> CellarResult<RuntimeInstallation> {
    let source = installer.source();
    shell.status(
        Status::Fetching,
        format!("wine {} from {}", source.version, source.url),
    );

    let progress = shell.bytes_progress(format!("wine {}", source.version));
    let result = installer.ensure_installed_with_progress(required, cancel, &mut |done, total| {
        progress.update(done, total)
    });
    progress.finish();

    let installed = result?;
    shell.status(Status::Installed, describe(&installed));
    Ok(installed)
}

fn status(installer: &RuntimeInstaller, json: bool) -> Result<()> {
    let current = installer.refresh();

    if json {
        let value = serde_json::json!({
            "root": current.root,
            "status": current.status.to_string(),
            "version": current.version.as_ref().map(|v| v.to_string()),
            "binary": current.binary,
            "origin": current.origin.map(origin_name),
            "configured_version": installer.source().version.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("runtime:  {}", current.status);
    if let Some(version) = &current.version {
        println!("version:  {}", version);
    }
    if let Some(binary) = &current.binary {
        println!("binary:   {}", binary.display());
    }
    if let Some(origin) = current.origin {
        println!("origin:   {}", origin_name(origin));
    }
    println!("root:     {}", current.root.display());
    println!("source:   {} ({})", installer.source().url, installer.source().version);

    Ok(())
}

fn describe(runtime: &RuntimeInstallation) -> String {
    match (&runtime.version, &runtime.binary) {
        (Some(version), Some(binary)) => format!("wine {} at {}", version, binary.display()),
        (Some(version), None) => format!("wine {}", version),
        _ => format!("wine at {}", runtime.root.display()),
    }
}

fn origin_name(origin: RuntimeOrigin) -> &'static str {
    match origin {
        RuntimeOrigin::Managed => "managed",
        RuntimeOrigin::System => "system",
    }
}
