//! Bottles: per-application isolation roots.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::application::AppId;

/// Bottle identity, one per application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BottleId(Uuid);

impl BottleId {
    /// The bottle id owned by an application.
    pub fn for_app(app: AppId) -> Self {
        BottleId(*app.as_uuid())
    }

    /// Directory name of the isolation root.
    pub fn dir_name(&self) -> String {
        format!("bottle-{}", self.0.simple())
    }

    /// Parse a directory name produced by [`BottleId::dir_name`].
    pub fn from_dir_name(name: &str) -> Option<Self> {
        name.strip_prefix("bottle-")
            .and_then(|hex| Uuid::try_parse(hex).ok())
            .map(BottleId)
    }
}

impl fmt::Display for BottleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bottle-{}", &self.0.simple().to_string()[..8])
    }
}

/// Lifecycle state of a bottle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BottleStatus {
    /// Recorded, isolation root not created yet.
    #[default]
    Uninitialized,
    Ready,
    /// Setup failed; reported, not retried automatically.
    Broken,
}

impl fmt::Display for BottleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BottleStatus::Uninitialized => write!(f, "uninitialized"),
            BottleStatus::Ready => write!(f, "ready"),
            BottleStatus::Broken => write!(f, "broken"),
        }
    }
}

/// An isolated environment bound to exactly one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottle {
    pub id: BottleId,

    pub app: AppId,

    /// Isolation root, used as the `WINEPREFIX`.
    pub root: PathBuf,

    /// Minimum runtime version this bottle needs, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<Version>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub status: BottleStatus,
}

impl Bottle {
    /// A new uninitialized bottle rooted under `bottles_dir`.
    pub fn new(app: AppId, bottles_dir: &Path) -> Self {
        let id = BottleId::for_app(app);
        Bottle {
            id,
            app,
            root: bottles_dir.join(id.dir_name()),
            runtime_version: None,
            created_at: Utc::now(),
            status: BottleStatus::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == BottleStatus::Ready
    }

    /// The Windows `C:` drive inside the isolation root.
    pub fn drive_c(&self) -> PathBuf {
        self.root.join("drive_c")
    }

    /// Whether the on-disk root is present and intact.
    pub fn root_is_intact(&self) -> bool {
        self.drive_c().is_dir()
    }
}
