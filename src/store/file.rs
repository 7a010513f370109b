//! On-disk format of `registry.toml`.
//!
//! ```toml
//! version = 1
//!
//! [[application]]
//! id = "6f1c..."
//! name = "Balatro"
//! source = "/games/Balatro.exe"
//! category = "Games"
//! ...
//!
//! [[bottle]]
//! id = "6f1c..."
//! app = "6f1c..."
//! root = "/home/me/.local/share/cellar/bottles/bottle-6f1c..."
//! status = "ready"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::application::Application;
use crate::core::bottle::Bottle;
use crate::core::error::{CellarError, CellarResult};
use crate::util::fs;

/// Current registry format version.
pub const REGISTRY_VERSION: u32 = 1;

/// Serialized registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryFile {
    pub version: u32,

    #[serde(default, rename = "application")]
    pub applications: Vec<Application>,

    #[serde(default, rename = "bottle")]
    pub bottles: Vec<Bottle>,
}

impl Default for RegistryFile {
    fn default() -> Self {
        RegistryFile {
            version: REGISTRY_VERSION,
            applications: Vec::new(),
            bottles: Vec::new(),
        }
    }
}

impl RegistryFile {
    /// Load a registry file. A missing file is an empty registry.
    pub fn load(path: &Path) -> CellarResult<Self> {
        if !path.exists() {
            return Ok(RegistryFile::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| CellarError::store(path, format!("{e:#}")))?;
        let file: RegistryFile =
            toml::from_str(&contents).map_err(|e| CellarError::store(path, e))?;

        if !file.is_compatible() {
            return Err(CellarError::store(
                path,
                format!(
                    "registry version {} is not supported by this version of cellar",
                    file.version
                ),
            ));
        }
        Ok(file)
    }

    /// Write the registry atomically, keeping the previous file as `.bak`.
    pub fn save(&self, path: &Path) -> CellarResult<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| CellarError::store(path, e))?;

        if path.is_file() {
            let backup = path.with_extension("toml.bak");
            if let Err(e) = std::fs::copy(path, &backup) {
                tracing::warn!("could not back up {}: {}", path.display(), e);
            }
        }

        fs::write_atomic(path, &contents).map_err(|e| CellarError::store(path, format!("{e:#}")))
    }

    pub fn is_compatible(&self) -> bool {
        self.version == REGISTRY_VERSION
    }
}
