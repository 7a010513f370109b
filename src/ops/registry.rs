//! Application registry: the single entry point for collaborators.
//!
//! [`Registry`] composes the bottle store, the compatibility catalog, the
//! runtime installer and the launch coordinator.
//!
//! Writers serialize on two levels. In process, the store sits behind a
//! `RwLock`. Across processes, every mutation holds an exclusive lock on
//! `registry.lock` and reloads the store from disk before touching it, so
//! concurrent `cellar` invocations never lose each other's writes. Reads
//! are served from the in-memory snapshot.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use semver::Version;
use serde::Serialize;

use crate::core::application::{display_name, AppEdit, AppId, Application};
use crate::core::bottle::{Bottle, BottleId};
use crate::core::catalog::{Catalog, CompatibilityEntry};
use crate::core::error::{CellarError, CellarResult};
use crate::launch::{LaunchCoordinator, LaunchResult};
use crate::runtime::cancel::CancelToken;
use crate::runtime::fetch::{Fetcher, UrlFetcher};
use crate::runtime::installer::RuntimeInstaller;
use crate::store::BottleStore;
use crate::util::context::GlobalContext;
use crate::util::flock::FileLock;
use crate::util::fs;

/// Restricts which applications a [`Listing`] yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Exact category, compared case-insensitively
    pub category: Option<String>,
    /// Substring of the display name, compared case-insensitively
    pub name: Option<String>,
}

impl ListFilter {
    pub fn category(category: impl Into<String>) -> Self {
        ListFilter {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        ListFilter {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    fn matches(&self, app: &Application) -> bool {
        let category_ok = self
            .category
            .as_deref()
            .map_or(true, |c| app.category.eq_ignore_ascii_case(c.trim()));
        let name_ok = self.name.as_deref().map_or(true, |n| {
            app.name.to_lowercase().contains(&n.trim().to_lowercase())
        });
        category_ok && name_ok
    }
}

/// One application with its bottle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEntry {
    pub application: Application,
    pub bottle: Bottle,
}

/// An ordered snapshot of the registry.
///
/// Entries are sorted by category, display name and creation time. The
/// filter is applied lazily on each [`iter`](Listing::iter), so a listing
/// can be walked any number of times.
#[derive(Debug, Clone)]
pub struct Listing {
    entries: Vec<ListEntry>,
    filter: ListFilter,
}

impl Listing {
    fn new(mut entries: Vec<ListEntry>, filter: ListFilter) -> Self {
        entries.sort_by(|a, b| {
            let (a, b) = (&a.application, &b.application);
            a.category
                .to_lowercase()
                .cmp(&b.category.to_lowercase())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Listing { entries, filter }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListEntry> {
        self.entries
            .iter()
            .filter(|e| self.filter.matches(&e.application))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }
}

impl<'a> IntoIterator for &'a Listing {
    type Item = &'a ListEntry;
    type IntoIter = Box<dyn Iterator<Item = &'a ListEntry> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Outcome of removing an application.
#[derive(Debug)]
pub struct Removal {
    pub application: Application,
    /// Set when the bottle's files could not be fully deleted.
    pub warning: Option<CellarError>,
}

/// Everything known about one application.
#[derive(Debug, Clone, Serialize)]
pub struct AppDetails {
    pub application: Application,
    pub bottle: Bottle,
    pub catalog: Option<CompatibilityEntry>,
    pub disk_usage: Option<u64>,
    pub log: Option<PathBuf>,
}

/// An isolation root no bottle record owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Orphan {
    pub path: PathBuf,
    pub size: u64,
    pub removed: bool,
}

/// The application registry facade.
pub struct Registry {
    store: RwLock<BottleStore>,
    catalog: Arc<Catalog>,
    installer: Arc<RuntimeInstaller>,
    launcher: LaunchCoordinator,
    lock_path: PathBuf,
    categories: Vec<String>,
    default_category: String,
}

impl Registry {
    /// Open the registry described by `ctx`, downloading runtimes over the
    /// network when needed.
    pub fn open(ctx: &GlobalContext) -> CellarResult<Self> {
        let fetcher = UrlFetcher::from_config(&ctx.config().runtime);
        Self::open_with_fetcher(ctx, Arc::new(fetcher))
    }

    pub fn open_with_fetcher(ctx: &GlobalContext, fetcher: Arc<dyn Fetcher>) -> CellarResult<Self> {
        let config = ctx.config();
        let installer =
            RuntimeInstaller::from_config(ctx.runtime_root(), &config.runtime, fetcher)?;
        let catalog = Catalog::load(&ctx.catalog_path())?;

        let lock_path = ctx.lock_path();
        let store = {
            let _shared = FileLock::shared(&lock_path)
                .map_err(|e| CellarError::store(&lock_path, e))?;
            BottleStore::load(ctx.registry_path(), ctx.bottles_dir())?
        };
        tracing::debug!(
            "opened registry {} ({} applications)",
            store.path().display(),
            store.len()
        );

        let default_category = Some(config.registry.default_category.trim())
            .filter(|c| !c.is_empty())
            .unwrap_or("Other")
            .to_string();

        Ok(Registry {
            store: RwLock::new(store),
            catalog: Arc::new(catalog),
            installer: Arc::new(installer),
            launcher: LaunchCoordinator::from_config(&config.launch, ctx.logs_dir()),
            lock_path,
            categories: config.registry.categories.clone(),
            default_category,
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn runtime(&self) -> &Arc<RuntimeInstaller> {
        &self.installer
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Register the executable at `path`.
    ///
    /// Without an explicit category the catalog's suggestion is used, then
    /// the configured default.
    pub fn add_application(
        &self,
        path: &Path,
        category: Option<&str>,
        name: Option<&str>,
    ) -> CellarResult<Application> {
        let (app, runtime_version) = self.prepare_application(path, category, name)?;

        let app = self.mutate(|store| insert_with_bottle(store, app, runtime_version))?;
        tracing::info!("Added {} as {} ({})", app.source.display(), app.name, app.id);
        Ok(app)
    }

    /// Validate `path` and build an unsaved application record for it.
    pub(crate) fn prepare_application(
        &self,
        path: &Path,
        category: Option<&str>,
        name: Option<&str>,
    ) -> CellarResult<(Application, Option<Version>)> {
        let source = match std::fs::canonicalize(path) {
            Ok(source) if source.is_file() => source,
            _ => {
                return Err(CellarError::ExecutableMissing {
                    path: path.to_path_buf(),
                })
            }
        };
        // The registry file is TOML, which only holds UTF-8 strings
        if source.to_str().is_none() {
            return Err(CellarError::UnsupportedPath { path: source });
        }

        let name = display_name(name, &source);
        let entry = self.catalog.lookup(&name);
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .or_else(|| entry.and_then(|e| e.category.clone()))
            .unwrap_or_else(|| self.default_category.clone());

        let app = Application::new(source, Some(&name), category);
        Ok((app, entry.and_then(|e| e.runtime_version.clone())))
    }

    /// Snapshot of the registry, filtered by `filter`.
    pub fn list_applications(&self, filter: ListFilter) -> Listing {
        let store = self.read();
        let entries = store
            .applications()
            .filter_map(|app| {
                store.bottle(app.bottle).map(|bottle| ListEntry {
                    application: app.clone(),
                    bottle: bottle.clone(),
                })
            })
            .collect();
        Listing::new(entries, filter)
    }

    /// Install the runtime if needed, materialize the bottle, then start
    /// the application and record the launch time.
    pub fn launch_application(&self, id: AppId, cancel: &CancelToken) -> CellarResult<LaunchResult> {
        let (app, mut bottle) = self.lookup(id)?;

        if !app.source.is_file() {
            return Err(CellarError::ExecutableMissing {
                path: app.source.clone(),
            }
            .for_app(id));
        }

        let runtime = self
            .installer
            .ensure_installed(bottle.runtime_version.as_ref(), cancel)
            .map_err(|e| e.for_app(id))?;

        if !bottle.is_ready() || !bottle.root_is_intact() {
            bottle = self
                .mutate(|store| store.materialize_bottle(bottle.id))
                .map_err(|e| e.for_app(id))?;
        }

        let result = self
            .launcher
            .launch(&app, &bottle, &runtime)
            .map_err(|e| e.for_app(id))?;

        let started_at = result.started_at;
        let recorded = self.mutate(|store| {
            if let Some(app) = store.application_mut(id) {
                app.last_launched = Some(started_at);
            }
            Ok(())
        });
        if let Err(e) = recorded {
            tracing::warn!("could not record launch of {}: {}", id, e);
        }

        Ok(result)
    }

    /// Change name, category, notes or arguments.
    pub fn edit_application(&self, id: AppId, edit: AppEdit) -> CellarResult<Application> {
        self.mutate(|store| {
            let app = store
                .application_mut(id)
                .ok_or_else(|| not_found(id))?;
            edit.apply(app);
            Ok(app.clone())
        })
    }

    /// Move an application to `category`.
    pub fn set_category(&self, id: AppId, category: &str) -> CellarResult<Application> {
        if category.trim().is_empty() {
            return Err(CellarError::Config {
                message: "category must not be empty".to_string(),
            }
            .for_app(id));
        }
        self.edit_application(
            id,
            AppEdit {
                category: Some(category.to_string()),
                ..Default::default()
            },
        )
    }

    /// Remove an application and its bottle.
    ///
    /// The record is always removed; leftover bottle files come back as
    /// [`Removal::warning`].
    pub fn remove_application(&self, id: AppId) -> CellarResult<Removal> {
        let removal = self.mutate(|store| {
            let application = store.remove_application(id).ok_or_else(|| not_found(id))?;
            let warning = store
                .delete_bottle(application.bottle)
                .err()
                .map(|e| e.for_app(id));
            Ok(Removal {
                application,
                warning,
            })
        })?;

        if let Some(log) = self.launcher.log_path(id) {
            if let Err(e) = std::fs::remove_file(&log) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!("could not remove {}: {}", log.display(), e);
                }
            }
        }
        if let Some(warning) = &removal.warning {
            tracing::warn!("{}", warning);
        }
        tracing::info!("Removed {} ({})", removal.application.name, id);
        Ok(removal)
    }

    /// Find an application by full id, unique id prefix or display name.
    pub fn resolve(&self, query: &str) -> CellarResult<AppId> {
        let query = query.trim();
        let store = self.read();

        if let Ok(id) = query.parse::<AppId>() {
            if store.application(id).is_some() {
                return Ok(id);
            }
        }

        let is_hex = query.len() >= 4 && query.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
        if is_hex {
            let matches: Vec<&Application> = store
                .applications()
                .filter(|a| a.id.matches_prefix(query))
                .collect();
            match matches.as_slice() {
                [one] => return Ok(one.id),
                [] => {}
                many => return Err(ambiguous(query, many)),
            }
        }

        let named: Vec<&Application> = store
            .applications()
            .filter(|a| !query.is_empty() && a.name.eq_ignore_ascii_case(query))
            .collect();
        match named.as_slice() {
            [one] => Ok(one.id),
            [] => Err(CellarError::ApplicationNotFound {
                query: query.to_string(),
            }),
            many => Err(ambiguous(query, many)),
        }
    }

    /// Application, bottle and catalog entry for `id`.
    pub fn describe(&self, id: AppId) -> CellarResult<AppDetails> {
        let (application, bottle) = self.lookup(id)?;
        let catalog = self.catalog.lookup(&application.name).cloned();
        let disk_usage = bottle.root.is_dir().then(|| fs::dir_size(&bottle.root));
        let log = self.launcher.log_path(id).filter(|p| p.is_file());

        Ok(AppDetails {
            application,
            bottle,
            catalog,
            disk_usage,
            log,
        })
    }

    /// Configured categories followed by any others in use.
    pub fn categories(&self) -> Vec<String> {
        let mut categories = self.categories.clone();
        let store = self.read();
        let mut in_use: Vec<&str> = store
            .applications()
            .map(|a| a.category.as_str())
            .filter(|c| !categories.iter().any(|k| k.eq_ignore_ascii_case(c)))
            .collect();
        in_use.sort_by_key(|c| c.to_lowercase());
        in_use.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        categories.extend(in_use.into_iter().map(String::from));
        categories
    }

    /// Find isolation roots in the bottles directory that no bottle owns,
    /// and delete them unless `dry_run` is set.
    pub fn sweep_orphans(&self, dry_run: bool) -> CellarResult<Vec<Orphan>> {
        self.mutate(|store| {
            let dir = store.bottles_dir().to_path_buf();
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(CellarError::store(&dir, e)),
            };

            let mut orphans = Vec::new();
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(id) = name.to_str().and_then(BottleId::from_dir_name) else {
                    continue;
                };
                if store.bottle(id).is_some() {
                    continue;
                }

                let path = entry.path();
                let size = fs::dir_size(&path);
                let removed = !dry_run
                    && match crate::store::remove_root(&path) {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::warn!("could not remove {}: {}", path.display(), e);
                            false
                        }
                    };
                orphans.push(Orphan {
                    path,
                    size,
                    removed,
                });
            }
            orphans.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(orphans)
        })
    }

    fn lookup(&self, id: AppId) -> CellarResult<(Application, Bottle)> {
        let store = self.read();
        let app = store.application(id).ok_or_else(|| not_found(id))?;
        let bottle = store
            .bottle(app.bottle)
            .ok_or_else(|| CellarError::store(store.path(), format!("no bottle for {id}")))?;
        Ok((app.clone(), bottle.clone()))
    }

    fn read(&self) -> RwLockReadGuard<'_, BottleStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BottleStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the freshest on-disk state and persist the result.
    ///
    /// The store is saved even when `f` fails, so state it recorded on the
    /// way (a bottle marked broken) is kept. `f` works on a copy that only
    /// replaces the in-memory snapshot once it is on disk; after a failed
    /// save the snapshot matches what was last read.
    pub(crate) fn mutate<T>(
        &self,
        f: impl FnOnce(&mut BottleStore) -> CellarResult<T>,
    ) -> CellarResult<T> {
        let _lock = FileLock::exclusive(&self.lock_path)
            .map_err(|e| CellarError::store(&self.lock_path, e))?;
        let mut store = self.write();
        store.reload()?;

        let mut working = store.clone();
        let result = f(&mut working);
        match (working.save(), result) {
            (Ok(()), result) => {
                *store = working;
                result
            }
            (Err(save), Ok(_)) => Err(save),
            (Err(save), Err(e)) => {
                tracing::warn!("{}", save);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("lock_path", &self.lock_path)
            .field("applications", &self.len())
            .finish_non_exhaustive()
    }
}

/// Insert `app` and create its bottle, leaving the store unchanged on error.
pub(crate) fn insert_with_bottle(
    store: &mut BottleStore,
    app: Application,
    runtime_version: Option<Version>,
) -> CellarResult<Application> {
    let id = app.id;
    store.insert_application(app.clone())?;
    match store.create_bottle(id) {
        Ok(bottle) => {
            store.set_runtime_version(bottle.id, runtime_version);
            Ok(app)
        }
        Err(e) => {
            store.remove_application(id);
            Err(e)
        }
    }
}

fn not_found(id: AppId) -> CellarError {
    CellarError::ApplicationNotFound {
        query: id.to_string(),
    }
}

fn ambiguous(query: &str, matches: &[&Application]) -> CellarError {
    CellarError::AmbiguousApplication {
        query: query.to_string(),
        matches: matches
            .iter()
            .map(|a| format!("{} ({})", a.id.short(), a.name))
            .collect(),
    }
}
