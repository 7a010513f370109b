//! Runtime installation.
//!
//! [`RuntimeInstaller`] owns the process-wide [`RuntimeInstallation`]
//! snapshot. Installs are staged in a sibling directory of the install root
//! and renamed into place, so a failed or cancelled install never leaves a
//! half-populated root behind.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, TryLockError};

use semver::Version;

use crate::core::error::{CellarError, CellarResult};
use crate::core::runtime::{
    parse_version_lenient, InstallStatus, RuntimeInstallation, RuntimeManifest, RuntimeOrigin,
    RUNTIME_MANIFEST,
};
use crate::runtime::archive::{extract_archive, locate_runtime_binary};
use crate::runtime::cancel::CancelToken;
use crate::runtime::fetch::{Fetcher, ProgressFn};
use crate::util::config::RuntimeConfig;
use crate::util::flock::FileLock;
use crate::util::hash;
use crate::util::process::{find_executable, ProcessBuilder};

/// Prefix of staging directories created next to the install root.
pub const STAGING_PREFIX: &str = ".runtime-staging-";

const MIB: u64 = 1024 * 1024;

/// The runtime package to install.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSource {
    pub url: String,
    pub version: Version,
    pub sha256: Option<String>,
}

impl RuntimeSource {
    pub fn new(url: impl Into<String>, version: Version) -> Self {
        RuntimeSource {
            url: url.into(),
            version,
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    pub fn from_config(config: &RuntimeConfig) -> CellarResult<Self> {
        let version =
            parse_version_lenient(&config.version).ok_or_else(|| CellarError::Config {
                message: format!("runtime version `{}` is not a version", config.version),
            })?;
        if config.url.trim().is_empty() {
            return Err(CellarError::Config {
                message: "runtime url is empty".to_string(),
            });
        }
        Ok(RuntimeSource {
            url: config.url.trim().to_string(),
            version,
            sha256: config.sha256.clone().filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Installs and probes the compatibility runtime.
pub struct RuntimeInstaller {
    root: PathBuf,
    source: RuntimeSource,
    fetcher: Arc<dyn Fetcher>,
    allow_system: bool,
    min_free_space: u64,
    /// Last known installation state; held only briefly
    state: Mutex<RuntimeInstallation>,
    /// Held for the duration of an install
    install_lock: Mutex<()>,
}

impl RuntimeInstaller {
    pub fn new(root: impl Into<PathBuf>, source: RuntimeSource, fetcher: Arc<dyn Fetcher>) -> Self {
        let root = root.into();
        let installer = RuntimeInstaller {
            state: Mutex::new(RuntimeInstallation::absent(&root)),
            root,
            source,
            fetcher,
            allow_system: false,
            min_free_space: 0,
            install_lock: Mutex::new(()),
        };
        installer.refresh();
        installer
    }

    /// Build an installer from the `[runtime]` configuration section.
    pub fn from_config(
        root: impl Into<PathBuf>,
        config: &RuntimeConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> CellarResult<Self> {
        let source = RuntimeSource::from_config(config)?;
        let mut installer = RuntimeInstaller::new(root, source, fetcher);
        installer.min_free_space = config.min_free_space_mb * MIB;
        if config.allow_system {
            installer.allow_system = true;
            installer.refresh();
        }
        Ok(installer)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> &RuntimeSource {
        &self.source
    }

    /// The last known installation state, without touching the disk.
    pub fn current(&self) -> RuntimeInstallation {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Re-probe the disk and update the snapshot.
    ///
    /// While an install is running the snapshot is returned unchanged.
    pub fn refresh(&self) -> RuntimeInstallation {
        match self.install_lock.try_lock() {
            Ok(_guard) => {
                let probed = self.probe();
                self.set_state(probed.clone());
                probed
            }
            Err(_) => self.current(),
        }
    }

    /// Make sure a runtime of at least `required` is installed.
    ///
    /// Returns immediately when one already is. A second caller racing an
    /// install in progress fails with `RuntimeNotReady`.
    pub fn ensure_installed(
        &self,
        required: Option<&Version>,
        cancel: &CancelToken,
    ) -> CellarResult<RuntimeInstallation> {
        self.ensure_installed_with_progress(required, cancel, &mut |_, _| {})
    }

    /// [`ensure_installed`](Self::ensure_installed) reporting download progress.
    pub fn ensure_installed_with_progress(
        &self,
        required: Option<&Version>,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> CellarResult<RuntimeInstallation> {
        let _guard = match self.install_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(CellarError::RuntimeNotReady {
                    reason: "a runtime installation is already in progress".to_string(),
                })
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let probed = self.probe();
        self.set_state(probed.clone());
        if probed.satisfies(required) {
            tracing::debug!(
                "runtime {} already installed at {}",
                display_version(probed.version.as_ref()),
                probed.root.display()
            );
            return Ok(probed);
        }

        if let Some(required) = required {
            if self.source.version < *required {
                return Err(CellarError::RuntimeNotReady {
                    reason: format!(
                        "version {} is required but the configured runtime package is {}",
                        required, self.source.version
                    ),
                });
            }
        }

        // Serializes installs across processes sharing the install root.
        let lock_path = self.lock_path();
        let _file_lock = match FileLock::try_exclusive(&lock_path) {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                return Err(CellarError::RuntimeNotReady {
                    reason: "another cellar process is installing the runtime".to_string(),
                })
            }
            Err(e) => {
                return Err(CellarError::Extraction {
                    url: self.source.url.clone(),
                    message: format!("failed to lock {}: {}", lock_path.display(), e),
                })
            }
        };

        self.set_status(InstallStatus::Installing);
        tracing::info!(
            "Installing runtime {} into {}",
            self.source.version,
            self.root.display()
        );

        match self.install(cancel, progress) {
            Ok(installed) => {
                tracing::info!(
                    "Installed runtime {} ({})",
                    self.source.version,
                    installed
                        .binary
                        .as_deref()
                        .map(|b| b.display().to_string())
                        .unwrap_or_default()
                );
                self.set_state(installed.clone());
                Ok(installed)
            }
            Err(e) => {
                tracing::warn!("runtime installation failed: {}", e);
                let mut failed = RuntimeInstallation::probe(&self.root);
                failed.status = InstallStatus::Failed;
                self.set_state(failed);
                Err(e)
            }
        }
    }

    fn install(
        &self,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> CellarResult<RuntimeInstallation> {
        let url = self.source.url.as_str();
        let parent = self.staging_parent();
        std::fs::create_dir_all(&parent).map_err(|e| extraction_error(url, &parent, e))?;

        sweep_stale_staging(&parent);
        check_space(&parent, self.min_free_space)?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| extraction_error(url, &parent, e))?;

        let archive = staging.path().join("package");
        let size = {
            let mut file =
                File::create(&archive).map_err(|e| extraction_error(url, &archive, e))?;
            self.fetcher.fetch(url, &mut file, cancel, progress)?
        };
        if size == 0 {
            return Err(CellarError::Download {
                url: url.to_string(),
                message: "the runtime package is empty".to_string(),
            });
        }

        if let Some(expected) = &self.source.sha256 {
            let actual = hash::sha256_file(&archive).map_err(|e| CellarError::Download {
                url: url.to_string(),
                message: format!("{e:#}"),
            })?;
            if !hash::digest_eq(expected, &actual) {
                return Err(CellarError::Download {
                    url: url.to_string(),
                    message: format!("checksum mismatch: expected {}, got {}", expected, actual),
                });
            }
            tracing::debug!("runtime package checksum verified: {}", &actual[..16]);
        }

        // Unpacked trees are commonly a few times the archive size.
        check_space(&parent, size.saturating_mul(3))?;
        cancel.check("runtime installation")?;

        let unpacked = staging.path().join("root");
        extract_archive(&archive, &unpacked, cancel).map_err(|e| {
            if cancel.is_cancelled() {
                CellarError::Cancelled {
                    operation: "runtime installation".to_string(),
                }
            } else {
                CellarError::Extraction {
                    url: url.to_string(),
                    message: format!("{e:#}"),
                }
            }
        })?;

        let binary = locate_runtime_binary(&unpacked).ok_or_else(|| CellarError::Extraction {
            url: url.to_string(),
            message: "the archive does not contain a wine binary".to_string(),
        })?;
        let relative = binary
            .strip_prefix(&unpacked)
            .map_err(|e| CellarError::Extraction {
                url: url.to_string(),
                message: e.to_string(),
            })?
            .to_path_buf();

        let manifest = RuntimeManifest {
            version: self.source.version.clone(),
            binary: relative,
            source: Some(url.to_string()),
        };
        let manifest_text = toml::to_string_pretty(&manifest).map_err(|e| CellarError::Extraction {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let manifest_path = unpacked.join(RUNTIME_MANIFEST);
        std::fs::write(&manifest_path, manifest_text)
            .map_err(|e| extraction_error(url, &manifest_path, e))?;

        cancel.check("runtime installation")?;
        swap_into_place(&unpacked, &self.root, staging.path())
            .map_err(|e| extraction_error(url, &self.root, e))?;

        let installed = RuntimeInstallation::probe(&self.root);
        if !installed.is_installed() {
            return Err(CellarError::Extraction {
                url: url.to_string(),
                message: format!("{} is not a usable runtime after install", self.root.display()),
            });
        }
        Ok(installed)
    }

    /// Probe the managed root, falling back to a system runtime when allowed.
    fn probe(&self) -> RuntimeInstallation {
        let managed = RuntimeInstallation::probe(&self.root);
        if managed.is_installed() || !self.allow_system {
            return managed;
        }
        probe_system().unwrap_or(managed)
    }

    fn staging_parent(&self) -> PathBuf {
        self.root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn lock_path(&self) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "runtime".to_string());
        self.staging_parent().join(format!(".{name}.lock"))
    }

    fn set_state(&self, installation: RuntimeInstallation) {
        match self.state.lock() {
            Ok(mut state) => *state = installation,
            Err(poisoned) => *poisoned.into_inner() = installation,
        }
    }

    fn set_status(&self, status: InstallStatus) {
        match self.state.lock() {
            Ok(mut state) => state.status = status,
            Err(poisoned) => poisoned.into_inner().status = status,
        }
    }
}

impl std::fmt::Debug for RuntimeInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeInstaller")
            .field("root", &self.root)
            .field("source", &self.source)
            .field("allow_system", &self.allow_system)
            .finish_non_exhaustive()
    }
}

fn display_version(version: Option<&Version>) -> String {
    version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(unknown version)".to_string())
}

fn extraction_error(url: &str, path: &Path, e: std::io::Error) -> CellarError {
    CellarError::Extraction {
        url: url.to_string(),
        message: format!("{}: {}", path.display(), e),
    }
}

/// A `wine` on PATH, with its version taken from `wine --version`.
fn probe_system() -> Option<RuntimeInstallation> {
    let binary = find_executable("wine").or_else(|| find_executable("wine64"))?;
    let output = ProcessBuilder::new(&binary).arg("--version").exec().ok()?;
    let version = parse_version_lenient(&String::from_utf8_lossy(&output.stdout));
    tracing::debug!(
        "found system runtime {} at {}",
        display_version(version.as_ref()),
        binary.display()
    );

    Some(RuntimeInstallation {
        root: binary.parent().map(Path::to_path_buf).unwrap_or_default(),
        version,
        binary: Some(binary),
        status: InstallStatus::Installed,
        origin: Some(RuntimeOrigin::System),
    })
}

/// Remove staging directories left behind by a killed process.
fn sweep_stale_staging(parent: &Path) {
    let Ok(entries) = std::fs::read_dir(parent) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        let path = entry.path();
        match std::fs::remove_dir_all(&path) {
            Ok(()) => tracing::debug!("removed stale staging directory {}", path.display()),
            Err(e) => tracing::warn!("could not remove {}: {}", path.display(), e),
        }
    }
}

fn check_space(path: &Path, required: u64) -> CellarResult<()> {
    if required == 0 {
        return Ok(());
    }
    match fs2::available_space(path) {
        Ok(available) if available < required => Err(CellarError::InsufficientSpace {
            path: path.to_path_buf(),
            required,
            available,
        }),
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::debug!("could not query free space of {}: {}", path.display(), e);
            Ok(())
        }
    }
}

/// Move `unpacked` to `root`, replacing any previous installation.
///
/// The previous root is parked inside `staging` and is deleted with it; it
/// is put back if the final rename fails.
fn swap_into_place(unpacked: &Path, root: &Path, staging: &Path) -> std::io::Result<()> {
    let previous = staging.join("previous");
    let had_previous = root.exists();
    if had_previous {
        std::fs::rename(root, &previous)?;
    }

    if let Err(e) = std::fs::rename(unpacked, root) {
        if had_previous {
            if let Err(restore) = std::fs::rename(&previous, root) {
                tracing::warn!(
                    "could not restore previous runtime at {}: {}",
                    root.display(),
                    restore
                );
            }
        }
        return Err(e);
    }
    Ok(())
}
