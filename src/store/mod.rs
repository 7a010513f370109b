//! Bottle store: the persistent collection of applications and bottles.
//!
//! The store is a plain in-memory value. Callers decide when to [`load`]
//! and [`save`]; the registry facade wraps both in its locks.
//!
//! [`load`]: BottleStore::load
//! [`save`]: BottleStore::save

pub mod file;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use semver::Version;

use crate::core::application::{AppId, Application};
use crate::core::bottle::{Bottle, BottleId, BottleStatus};
use crate::core::error::{CellarError, CellarResult};

pub use file::{RegistryFile, REGISTRY_VERSION};

/// Applications and their bottles, keyed by id.
#[derive(Debug, Clone)]
pub struct BottleStore {
    path: PathBuf,
    bottles_dir: PathBuf,
    applications: BTreeMap<AppId, Application>,
    bottles: BTreeMap<BottleId, Bottle>,
}

impl BottleStore {
    /// An empty store persisted at `path`.
    pub fn new(path: impl Into<PathBuf>, bottles_dir: impl Into<PathBuf>) -> Self {
        BottleStore {
            path: path.into(),
            bottles_dir: bottles_dir.into(),
            applications: BTreeMap::new(),
            bottles: BTreeMap::new(),
        }
    }

    /// Load the store from `path`; a missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>, bottles_dir: impl Into<PathBuf>) -> CellarResult<Self> {
        let mut store = BottleStore::new(path, bottles_dir);
        store.reload()?;
        Ok(store)
    }

    /// Replace the in-memory state with what is on disk.
    pub fn reload(&mut self) -> CellarResult<()> {
        let file = RegistryFile::load(&self.path)?;

        let applications: BTreeMap<AppId, Application> =
            file.applications.into_iter().map(|a| (a.id, a)).collect();
        let mut bottles = BTreeMap::new();

        for mut bottle in file.bottles {
            if !applications.contains_key(&bottle.app) {
                tracing::warn!(
                    "dropping {} from the registry: application {} is gone",
                    bottle.id,
                    bottle.app
                );
                continue;
            }
            if bottle.is_ready() && !bottle.root_is_intact() {
                tracing::debug!(
                    "{} root {} is missing, marking uninitialized",
                    bottle.id,
                    bottle.root.display()
                );
                bottle.status = BottleStatus::Uninitialized;
            }
            bottles.insert(bottle.id, bottle);
        }

        for app in applications.values() {
            if !bottles.contains_key(&app.bottle) {
                tracing::warn!("application {} had no bottle record, recreating it", app.id);
                let bottle = Bottle::new(app.id, &self.bottles_dir);
                bottles.insert(bottle.id, bottle);
            }
        }

        self.applications = applications;
        self.bottles = bottles;
        Ok(())
    }

    /// Persist the store.
    pub fn save(&self) -> CellarResult<()> {
        let file = RegistryFile {
            version: REGISTRY_VERSION,
            applications: self.applications.values().cloned().collect(),
            bottles: self.bottles.values().cloned().collect(),
        };
        file.save(&self.path)?;
        tracing::debug!("saved registry to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bottles_dir(&self) -> &Path {
        &self.bottles_dir
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    pub fn application(&self, id: AppId) -> Option<&Application> {
        self.applications.get(&id)
    }

    pub fn application_mut(&mut self, id: AppId) -> Option<&mut Application> {
        self.applications.get_mut(&id)
    }

    pub fn applications(&self) -> impl Iterator<Item = &Application> {
        self.applications.values()
    }

    /// The application registered for `source`, if any.
    pub fn find_by_source(&self, source: &Path) -> Option<&Application> {
        self.applications
            .get(&AppId::for_path(source))
            .or_else(|| self.applications.values().find(|a| a.source == source))
    }

    /// Register an application. Its bottle is created separately.
    pub fn insert_application(&mut self, app: Application) -> CellarResult<()> {
        if let Some(existing) = self.find_by_source(&app.source) {
            return Err(CellarError::DuplicateApplication {
                path: app.source.clone(),
                existing: existing.id,
            });
        }
        if self.applications.contains_key(&app.id) {
            return Err(CellarError::DuplicateApplication {
                path: app.source.clone(),
                existing: app.id,
            });
        }
        self.applications.insert(app.id, app);
        Ok(())
    }

    /// Remove an application record, leaving its bottle alone.
    pub fn remove_application(&mut self, id: AppId) -> Option<Application> {
        self.applications.remove(&id)
    }

    pub fn bottle(&self, id: BottleId) -> Option<&Bottle> {
        self.bottles.get(&id)
    }

    /// The bottle owned by application `app`.
    pub fn bottle_for(&self, app: AppId) -> Option<&Bottle> {
        self.bottles.values().find(|b| b.app == app)
    }

    pub fn bottles(&self) -> impl Iterator<Item = &Bottle> {
        self.bottles.values()
    }

    /// Create the bottle record for `app`. Touches no files.
    pub fn create_bottle(&mut self, app: AppId) -> CellarResult<Bottle> {
        if self.bottle_for(app).is_some() {
            return Err(CellarError::DuplicateBottle { app });
        }

        let bottle = Bottle::new(app, &self.bottles_dir);
        if self.bottles.contains_key(&bottle.id) {
            return Err(CellarError::DuplicateBottle { app });
        }
        self.bottles.insert(bottle.id, bottle.clone());
        Ok(bottle)
    }

    /// Record the minimum runtime version a bottle needs.
    pub fn set_runtime_version(&mut self, id: BottleId, version: Option<Version>) {
        if let Some(bottle) = self.bottles.get_mut(&id) {
            bottle.runtime_version = version;
        }
    }

    /// Create the bottle's isolation root if needed and mark it ready.
    ///
    /// Idempotent. On failure the bottle is marked broken.
    pub fn materialize_bottle(&mut self, id: BottleId) -> CellarResult<Bottle> {
        let bottle = self
            .bottles
            .get_mut(&id)
            .ok_or_else(|| CellarError::store(&self.path, format!("no bottle {id} in registry")))?;

        let drive_c = bottle.drive_c();
        match std::fs::create_dir_all(&drive_c) {
            Ok(()) => {
                if !bottle.is_ready() {
                    tracing::debug!("materialized {} at {}", bottle.id, bottle.root.display());
                }
                bottle.status = BottleStatus::Ready;
                Ok(bottle.clone())
            }
            Err(source) => {
                bottle.status = BottleStatus::Broken;
                Err(CellarError::IsolationSetup {
                    bottle: id,
                    path: bottle.root.clone(),
                    source,
                })
            }
        }
    }

    /// Remove a bottle record and its isolation root.
    ///
    /// The record is always removed. Files that could not be deleted are
    /// reported as a `Deletion` error.
    pub fn delete_bottle(&mut self, id: BottleId) -> CellarResult<()> {
        let Some(bottle) = self.bottles.remove(&id) else {
            return Ok(());
        };

        remove_root(&bottle.root).map_err(|source| CellarError::Deletion {
            bottle: id,
            path: bottle.root.clone(),
            source,
        })?;
        tracing::debug!("deleted {} at {}", id, bottle.root.display());
        Ok(())
    }
}

/// Remove an isolation root; a root that never existed is fine.
///
/// A file or symlink in the root's place is unlinked, never followed.
pub(crate) fn remove_root(root: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(root) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(root),
        Ok(_) => std::fs::remove_file(root),
    }
}
