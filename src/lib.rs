//! Cellar - a manager for Windows applications running under Wine
//!
//! This crate provides the core library functionality for Cellar: the
//! application registry, per-application bottles, the managed Wine runtime
//! and the launch path that ties them together.

pub mod core;
pub mod launch;
pub mod ops;
pub mod runtime;
pub mod store;
pub mod util;

/// Test utilities and mocks for Cellar unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides mock runtime fetchers and filesystem
/// fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{
    AppEdit, AppId, Application, Bottle, BottleId, BottleStatus, Catalog, CellarError,
    CellarResult, CompatibilityEntry, ErrorKind, RuntimeInstallation,
};
pub use launch::{LaunchCoordinator, LaunchResult};
pub use ops::{ListFilter, Listing, Registry};
pub use runtime::{CancelToken, RuntimeInstaller};
pub use store::BottleStore;
pub use util::context::GlobalContext;
