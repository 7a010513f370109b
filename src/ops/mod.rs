//! High-level operations.
//!
//! This module contains the registry facade the `cellar` commands drive.

pub mod import;
pub mod registry;

pub use import::{ImportReport, SkippedRecord};
pub use registry::{AppDetails, ListEntry, ListFilter, Listing, Orphan, Registry, Removal};
