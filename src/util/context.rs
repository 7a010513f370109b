//! Global context for cellar operations.
//!
//! Provides centralized access to configuration and the on-disk layout:
//!
//! ```text
//! <home>/
//!   registry.toml     applications and bottles
//!   registry.lock     cross-process writer lock
//!   catalog.toml      user catalog overrides
//!   bottles/          one isolation root per application
//!   runtime/          managed runtime install root
//!   logs/             per-application launch logs
//! ```
//!
//! `<home>` is the platform data directory (`CELLAR_HOME` overrides it).

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::util::config::Config;

/// Project directories for cellar
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "cellar", "cellar"));

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Data directory holding the registry, bottles and runtime
    home: PathBuf,

    /// Directory holding config.toml
    config_dir: PathBuf,

    /// Effective configuration
    config: Config,
}

impl GlobalContext {
    /// Create a GlobalContext from the environment and the user's config file.
    pub fn new() -> Result<Self> {
        let home = match std::env::var_os("CELLAR_HOME").filter(|v| !v.is_empty()) {
            Some(home) => PathBuf::from(home),
            None => default_home()?,
        };

        let config_dir = if std::env::var_os("CELLAR_HOME").is_some() {
            home.clone()
        } else {
            PROJECT_DIRS
                .as_ref()
                .map(|dirs| dirs.config_dir().to_path_buf())
                .unwrap_or_else(|| home.clone())
        };

        let config = Config::load_with_env(&config_dir.join("config.toml"));
        tracing::debug!("cellar home: {}", home.display());

        Ok(GlobalContext {
            home,
            config_dir,
            config,
        })
    }

    /// Create a GlobalContext rooted at `home` with an explicit configuration.
    pub fn with_home(home: impl Into<PathBuf>, config: Config) -> Self {
        let home = home.into();
        GlobalContext {
            config_dir: home.clone(),
            home,
            config,
        }
    }

    /// Get the data directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Get the persisted registry path.
    pub fn registry_path(&self) -> PathBuf {
        self.home.join("registry.toml")
    }

    /// Get the cross-process lock file path.
    pub fn lock_path(&self) -> PathBuf {
        self.home.join("registry.lock")
    }

    /// Get the catalog override file path.
    pub fn catalog_path(&self) -> PathBuf {
        self.home.join("catalog.toml")
    }

    /// Get the directory holding bottle isolation roots.
    pub fn bottles_dir(&self) -> PathBuf {
        self.home.join("bottles")
    }

    /// Get the runtime install root.
    pub fn runtime_root(&self) -> PathBuf {
        self.config
            .runtime
            .install_root
            .clone()
            .unwrap_or_else(|| self.home.join("runtime"))
    }

    /// Get the launch log directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.home.join("logs")
    }
}

fn default_home() -> Result<PathBuf> {
    if let Some(dirs) = PROJECT_DIRS.as_ref() {
        return Ok(dirs.data_dir().to_path_buf());
    }

    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".cellar"))
        .context("could not determine a home directory; set CELLAR_HOME")
}
