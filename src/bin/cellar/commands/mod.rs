//! Command implementations

pub mod add;
pub mod catalog;
pub mod completions;
pub mod edit;
pub mod import;
pub mod info;
pub mod launch;
pub mod list;
pub mod prune;
pub mod remove;
pub mod runtime;

use anyhow::Result;

use cellar::{AppId, CancelToken, GlobalContext, Registry};

/// Exit status after a second Ctrl-C, as a shell reports SIGINT.
const INTERRUPTED_EXIT: i32 = 130;

/// Open the registry of the current user.
pub(crate) fn open_registry() -> Result<(GlobalContext, Registry)> {
    let ctx = GlobalContext::new()?;
    let registry = Registry::open(&ctx)?;
    Ok((ctx, registry))
}

/// Open the registry and resolve `query` to an application.
pub(crate) fn open_and_resolve(query: &str) -> Result<(Registry, AppId)> {
    let (_, registry) = open_registry()?;
    let id = registry.resolve(query)?;
    Ok((registry, id))
}

/// A token that Ctrl-C cancels.
///
/// The first interrupt lets a running download or extraction unwind and
/// remove its staging directory; a second one exits immediately.
pub(crate) fn interrupt_token() -> CancelToken {
    let token = CancelToken::new();
    let handle = token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if on_interrupt(&handle) {
            std::process::exit(INTERRUPTED_EXIT);
        }
    }) {
        tracing::warn!("could not install Ctrl-C handler: {}", e);
    }
    token
}

/// Cancel `token`; returns whether it already was.
fn on_interrupt(token: &CancelToken) -> bool {
    if token.is_cancelled() {
        return true;
    }
    tracing::info!("interrupted, cleaning up");
    token.cancel();
    false
}
