//! Compatibility catalog: known applications and how well they run.
//!
//! The catalog is built once by merging the built-in entries with the
//! user's `catalog.toml` and is immutable afterwards. Keys are normalized
//! names, so `"Rocket  League"`, `"rocket league"` and `" ROCKET LEAGUE "`
//! all refer to the same entry.
//!
//! ```toml
//! [apps."Balatro"]
//! category = "Games"
//! rating = "gold"
//! runtime_version = "8.0"
//! notes = "Needs the Vulkan renderer"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::core::error::{CellarError, CellarResult};
use crate::core::runtime::{lenient_version, parse_version_lenient};

/// Compatibility rating, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Bronze => write!(f, "Bronze"),
            Rating::Silver => write!(f, "Silver"),
            Rating::Gold => write!(f, "Gold"),
            Rating::Platinum => write!(f, "Platinum"),
        }
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bronze" => Ok(Rating::Bronze),
            "silver" => Ok(Rating::Silver),
            "gold" => Ok(Rating::Gold),
            "platinum" => Ok(Rating::Platinum),
            _ => Err(format!(
                "invalid rating '{}'; expected bronze, silver, gold or platinum",
                s
            )),
        }
    }
}

/// What is known about one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityEntry {
    /// Name as written by the catalog author.
    #[serde(skip)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    pub rating: Rating,

    /// Minimum runtime version.
    #[serde(
        default,
        with = "lenient_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub runtime_version: Option<Version>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl CompatibilityEntry {
    pub fn new(name: impl Into<String>, rating: Rating) -> Self {
        CompatibilityEntry {
            name: name.into(),
            category: None,
            rating,
            runtime_version: None,
            notes: String::new(),
            description: String::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_runtime(mut self, version: &str) -> Self {
        self.runtime_version = parse_version_lenient(version);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Normalize an application name for lookup: trim, case-fold and collapse
/// inner whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The entries shipped with cellar.
pub fn builtin_entries() -> Vec<CompatibilityEntry> {
    vec![
        CompatibilityEntry::new("Balatro", Rating::Platinum)
            .with_category("Games")
            .with_runtime("8.0")
            .with_description("A unique deck-building poker roguelike")
            .with_notes("Runs perfectly out of the box"),
        CompatibilityEntry::new("Rocket League", Rating::Gold)
            .with_category("Games")
            .with_runtime("7.0")
            .with_description("Soccer meets driving in this popular sports game")
            .with_notes("Requires DirectX 11 and DXVK for best performance"),
        CompatibilityEntry::new("Notepad++", Rating::Platinum)
            .with_category("Productivity")
            .with_runtime("6.0")
            .with_description("Popular text and code editor")
            .with_notes("Works perfectly with native file dialogs"),
    ]
}

/// Immutable, merged compatibility catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: BTreeMap<String, CompatibilityEntry>,
}

impl Catalog {
    /// Merge built-ins with overrides; an override replaces any built-in
    /// with the same normalized name. Later overrides win over earlier ones.
    pub fn merge(
        builtins: impl IntoIterator<Item = CompatibilityEntry>,
        overrides: impl IntoIterator<Item = CompatibilityEntry>,
    ) -> Self {
        let mut entries = BTreeMap::new();
        for entry in builtins.into_iter().chain(overrides) {
            entries.insert(normalize_name(&entry.name), entry);
        }
        Catalog { entries }
    }

    /// Built-ins merged with the override file at `path`, if it exists.
    pub fn load(overrides_path: &Path) -> CellarResult<Self> {
        let overrides = if overrides_path.exists() {
            CatalogFile::load(overrides_path)?.into_entries()
        } else {
            Vec::new()
        };
        Ok(Self::merge(builtin_entries(), overrides))
    }

    pub fn lookup(&self, name: &str) -> Option<&CompatibilityEntry> {
        self.entries.get(&normalize_name(name))
    }

    /// Entries in normalized-name order.
    pub fn iter(&self) -> impl Iterator<Item = &CompatibilityEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// On-disk form of `catalog.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub apps: BTreeMap<String, CompatibilityEntry>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> CellarResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CellarError::Config {
            message: format!("failed to read catalog {}: {}", path.display(), e),
        })?;
        toml::from_str(&text).map_err(|e| CellarError::Config {
            message: format!("failed to parse catalog {}: {}", path.display(), e),
        })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CompatibilityEntry>) -> Self {
        CatalogFile {
            apps: entries
                .into_iter()
                .map(|e| (e.name.clone(), e))
                .collect(),
        }
    }

    pub fn to_toml(&self) -> CellarResult<String> {
        toml::to_string_pretty(self).map_err(|e| CellarError::Config {
            message: format!("failed to serialize catalog: {}", e),
        })
    }

    /// Entries with their names filled in from the table keys.
    pub fn into_entries(self) -> Vec<CompatibilityEntry> {
        self.apps
            .into_iter()
            .map(|(name, mut entry)| {
                entry.name = name;
                entry
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Rocket   League "), "rocket league");
        assert_eq!(normalize_name("BALATRO"), "balatro");
        assert_eq!(normalize_name("\tNotepad++\n"), "notepad++");
    }

    #[test]
    fn test_rating_order() {
        assert!(Rating::Bronze < Rating::Silver);
        assert!(Rating::Silver < Rating::Gold);
        assert!(Rating::Gold < Rating::Platinum);
        assert_eq!("PLATINUM".parse::<Rating>().unwrap(), Rating::Platinum);
        assert!("garbage".parse::<Rating>().is_err());
    }

    #[test]
    fn test_override_wins_case_insensitive() {
        let catalog = Catalog::merge(
            vec![CompatibilityEntry::new("Balatro", Rating::Platinum)],
            vec![CompatibilityEntry::new("balatro", Rating::Gold)],
        );

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup("BALATRO").unwrap().rating, Rating::Gold);
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let catalog = Catalog::merge(builtin_entries(), Vec::new());
        assert!(catalog.lookup("Some Unknown Tool").is_none());
        assert_eq!(
            catalog.lookup(" rocket league ").unwrap().runtime_version,
            Some(Version::new(7, 0, 0))
        );
    }

    #[test]
    fn test_merge_is_deterministic() {
        let overrides = || {
            vec![
                CompatibilityEntry::new("Zeta", Rating::Bronze),
                CompatibilityEntry::new("alpha", Rating::Silver),
            ]
        };
        let a = Catalog::merge(builtin_entries(), overrides());
        let b = Catalog::merge(builtin_entries(), overrides());
        assert_eq!(a, b);

        let names: Vec<_> = a.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"alpha"));
    }

    #[test]
    fn test_load_override_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("catalog.toml");
        std::fs::write(
            &path,
            r#"
[apps."balatro"]
rating = "gold"
runtime_version = "9.0 or later"
notes = "Needs Vulkan"

[apps."My Tool"]
category = "Productivity"
rating = "silver"
"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        let balatro = catalog.lookup("Balatro").unwrap();
        assert_eq!(balatro.rating, Rating::Gold);
        assert_eq!(balatro.runtime_version, Some(Version::new(9, 0, 0)));
        assert_eq!(balatro.category, None);
        assert_eq!(catalog.lookup("my tool").unwrap().rating, Rating::Silver);
        assert!(catalog.lookup("Notepad++").is_some());
    }

    #[test]
    fn test_catalog_file_round_trip() {
        let file = CatalogFile::from_entries(builtin_entries());
        let text = file.to_toml().unwrap();
        let reparsed: CatalogFile = toml::from_str(&text).unwrap();
        let mut expected = builtin_entries();
        expected.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(reparsed.into_entries(), expected);
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("catalog.toml");
        std::fs::write(&path, "[apps.x]\nrating = \"mythril\"\n").unwrap();
        let err = Catalog::load(&path).unwrap_err();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Config);
    }
}
