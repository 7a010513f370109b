//! Compatibility runtime installation state.

use std::fmt;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

/// Name of the manifest written into a managed install root.
pub const RUNTIME_MANIFEST: &str = ".cellar-runtime.toml";

/// Install status of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallStatus {
    #[default]
    NotInstalled,
    Installing,
    Installed,
    Failed,
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStatus::NotInstalled => write!(f, "not installed"),
            InstallStatus::Installing => write!(f, "installing"),
            InstallStatus::Installed => write!(f, "installed"),
            InstallStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Where the runtime binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeOrigin {
    /// Downloaded and unpacked into the install root.
    Managed,
    /// A `wine` already on `PATH`.
    System,
}

/// Snapshot of the runtime installation, refreshed by probing the disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeInstallation {
    pub root: PathBuf,
    pub version: Option<Version>,
    pub binary: Option<PathBuf>,
    pub status: InstallStatus,
    pub origin: Option<RuntimeOrigin>,
}

impl RuntimeInstallation {
    /// Nothing installed at `root`.
    pub fn absent(root: impl Into<PathBuf>) -> Self {
        RuntimeInstallation {
            root: root.into(),
            version: None,
            binary: None,
            status: InstallStatus::NotInstalled,
            origin: None,
        }
    }

    /// Read the manifest of a managed install root.
    ///
    /// Any missing piece (manifest, binary) means not installed.
    pub fn probe(root: &Path) -> Self {
        let manifest_path = root.join(RUNTIME_MANIFEST);
        let manifest = match std::fs::read_to_string(&manifest_path) {
            Ok(text) => text,
            Err(_) => return Self::absent(root),
        };

        let manifest: RuntimeManifest = match toml::from_str(&manifest) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("ignoring unreadable runtime manifest {}: {}", manifest_path.display(), e);
                return Self::absent(root);
            }
        };

        let binary = root.join(&manifest.binary);
        if !binary.is_file() {
            tracing::debug!("runtime binary {} is missing", binary.display());
            return Self::absent(root);
        }

        RuntimeInstallation {
            root: root.to_path_buf(),
            version: Some(manifest.version),
            binary: Some(binary),
            status: InstallStatus::Installed,
            origin: Some(RuntimeOrigin::Managed),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.status == InstallStatus::Installed && self.binary.is_some()
    }

    /// Whether this installation meets a minimum version.
    ///
    /// An installed runtime of unknown version only satisfies "any version".
    pub fn satisfies(&self, required: Option<&Version>) -> bool {
        if !self.is_installed() {
            return false;
        }
        match (required, &self.version) {
            (None, _) => true,
            (Some(req), Some(have)) => have >= req,
            (Some(_), None) => false,
        }
    }

    /// Library directory shipped with a managed runtime, if present.
    pub fn lib_dir(&self) -> Option<PathBuf> {
        if self.origin != Some(RuntimeOrigin::Managed) {
            return None;
        }
        let bin_dir = self.binary.as_ref()?.parent()?;
        let lib = bin_dir.parent()?.join("lib");
        lib.is_dir().then_some(lib)
    }
}

/// Manifest stored at the top of a managed install root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeManifest {
    pub version: Version,

    /// Runtime binary, relative to the install root.
    pub binary: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Parse versions the way humans write them: `8`, `8.0`, `8.0 or later`,
/// `wine-9.0 (Staging)`.
pub fn parse_version_lenient(text: &str) -> Option<Version> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let numeric: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut parts = numeric
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u64>());

    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// Serde adapter for optional lenient versions.
pub mod lenient_version {
    use semver::Version;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Version>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_str(&v.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Version>, D::Error> {
        let text = Option::<String>::deserialize(d)?;
        match text {
            None => Ok(None),
            Some(t) if t.trim().is_empty() => Ok(None),
            Some(t) => super::parse_version_lenient(&t)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid version `{}`", t))),
        }
    }
}
