//! Configuration file support for cellar.
//!
//! Configuration is read from `<config dir>/config.toml` (see
//! [`GlobalContext::config_path`](crate::util::GlobalContext::config_path)),
//! then environment variables override individual settings:
//!
//! - `CELLAR_RUNTIME_URL` - runtime package location
//! - `CELLAR_RUNTIME_VERSION` - version of that package
//! - `CELLAR_RUNTIME_ROOT` - install root
//! - `CELLAR_CATEGORIES` - comma separated default categories
//!
//! ```toml
//! [runtime]
//! url = "https://example.com/wine-9.0.tar.gz"
//! version = "9.0"
//!
//! [registry]
//! categories = ["Games", "Productivity", "Other"]
//!
//! [launch]
//! winedebug = "-all"
//! env = { DXVK_HUD = "fps" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default runtime package.
pub const DEFAULT_RUNTIME_URL: &str =
    "https://github.com/Gcenx/macOS_Wine_builds/releases/download/9.0/wine-stable-9.0-osx64.tar.gz";

/// Version of [`DEFAULT_RUNTIME_URL`].
pub const DEFAULT_RUNTIME_VERSION: &str = "9.0";

/// Cellar configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Runtime download and install settings
    pub runtime: RuntimeConfig,

    /// Registry settings
    pub registry: RegistryConfig,

    /// Launch settings
    pub launch: LaunchConfig,
}

/// Runtime-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Where to fetch the runtime package (http(s), file:// or a local path)
    pub url: String,

    /// Version of the package at `url`
    pub version: String,

    /// Expected SHA-256 of the package, checked when set
    pub sha256: Option<String>,

    /// Install root (defaults to `<data dir>/runtime`)
    pub install_root: Option<PathBuf>,

    /// Fall back to a `wine` found on PATH when nothing is installed
    pub allow_system: bool,

    /// Free space required before downloading, in MiB
    pub min_free_space_mb: u64,

    /// Overall timeout for one remote download, in seconds
    pub download_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            url: DEFAULT_RUNTIME_URL.to_string(),
            version: DEFAULT_RUNTIME_VERSION.to_string(),
            sha256: None,
            install_root: None,
            allow_system: true,
            min_free_space_mb: 1024,
            download_timeout_secs: 30 * 60,
        }
    }
}

/// Registry-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Categories offered even when no application uses them
    pub categories: Vec<String>,

    /// Category for applications the catalog doesn't know
    pub default_category: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            categories: vec![
                "Games".to_string(),
                "Productivity".to_string(),
                "Other".to_string(),
            ],
            default_category: "Other".to_string(),
        }
    }
}

/// Launch-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Redirect application output to `<data dir>/logs/<app id>.log`
    pub capture_logs: bool,

    /// Value for WINEDEBUG (unset when None)
    pub winedebug: Option<String>,

    /// Extra environment variables for every launch
    pub env: BTreeMap<String, String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        LaunchConfig {
            capture_logs: true,
            winedebug: Some("-all".to_string()),
            env: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).with_context(|| "failed to serialize config")?;
        crate::util::fs::write_string(path, &contents)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CELLAR_RUNTIME_URL") {
            self.runtime.url = url;
        }
        if let Some(version) = lookup("CELLAR_RUNTIME_VERSION") {
            self.runtime.version = version;
        }
        if let Some(root) = lookup("CELLAR_RUNTIME_ROOT") {
            self.runtime.install_root = Some(PathBuf::from(root));
        }
        if let Some(categories) = lookup("CELLAR_CATEGORIES") {
            let parsed: Vec<String> = categories
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
            if !parsed.is_empty() {
                self.registry.categories = parsed;
            }
        }
    }

    /// Load the file at `path` and apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Self {
        let mut config = Self::load_or_default(path);
        config.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.runtime.url, DEFAULT_RUNTIME_URL);
        assert!(config.runtime.install_root.is_none());
        assert_eq!(config.registry.categories, vec!["Games", "Productivity", "Other"]);
        assert_eq!(config.registry.default_category, "Other");
        assert!(config.launch.capture_logs);
    }

    #[test]
    fn test_config_load_partial() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[runtime]
url = "file:///srv/wine.tar.gz"
version = "8.0.2"
allow_system = false

[launch]
winedebug = "+err"
env = { DXVK_HUD = "fps" }
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.runtime.url, "file:///srv/wine.tar.gz");
        assert_eq!(config.runtime.version, "8.0.2");
        assert!(!config.runtime.allow_system);
        assert_eq!(config.runtime.min_free_space_mb, 1024);
        assert_eq!(config.launch.winedebug.as_deref(), Some("+err"));
        assert_eq!(config.launch.env.get("DXVK_HUD").map(String::as_str), Some("fps"));
        // Untouched sections keep their defaults
        assert_eq!(config.registry, RegistryConfig::default());
    }

    #[test]
    fn test_config_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "CELLAR_RUNTIME_URL" => Some("https://mirror.example/wine.tar.gz".to_string()),
            "CELLAR_RUNTIME_ROOT" => Some("/opt/wine".to_string()),
            "CELLAR_CATEGORIES" => Some("Games, Tools ,,".to_string()),
            _ => None,
        });

        assert_eq!(config.runtime.url, "https://mirror.example/wine.tar.gz");
        assert_eq!(config.runtime.version, DEFAULT_RUNTIME_VERSION);
        assert_eq!(config.runtime.install_root, Some(PathBuf::from("/opt/wine")));
        assert_eq!(config.registry.categories, vec!["Games", "Tools"]);
    }

    #[test]
    fn test_config_save_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/config.toml");

        let mut config = Config::default();
        config.runtime.sha256 = Some("ab".repeat(32));
        config.launch.env.insert("WINEESYNC".into(), "1".into());
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_on_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "runtime = 3").unwrap();
        assert_eq!(Config::load_or_default(&path), Config::default());
    }
}
