//! Core data types: applications, bottles, the catalog and runtime state.

pub mod application;
pub mod bottle;
pub mod catalog;
pub mod error;
pub mod runtime;

pub use application::{AppEdit, AppId, Application};
pub use bottle::{Bottle, BottleId, BottleStatus};
pub use catalog::{Catalog, CompatibilityEntry, Rating};
pub use error::{CellarError, CellarResult, ErrorKind};
pub use runtime::{InstallStatus, RuntimeInstallation, RuntimeOrigin};
