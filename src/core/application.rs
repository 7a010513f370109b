//! Registered Windows applications.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bottle::BottleId;

/// Namespace for path-derived application ids.
const APP_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_2a0e_93d4_4b8e_a5f1_0c7d_e2b9_4a31);

/// Stable application identity.
///
/// Derived from the canonical executable path, so re-adding the same file
/// after removal yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(Uuid);

impl AppId {
    /// Derive the id for an executable path.
    pub fn for_path(path: &Path) -> Self {
        let key = path.to_string_lossy();
        AppId(Uuid::new_v5(&APP_NAMESPACE, key.as_bytes()))
    }

    /// Random id, for imports whose source path cannot be canonicalized.
    pub fn random() -> Self {
        AppId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Short form for listings (first 8 hex digits).
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// Whether the hex form of this id starts with `prefix`.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.to_ascii_lowercase().replace('-', "");
        !prefix.is_empty() && self.0.simple().to_string().starts_with(&prefix)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for AppId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(AppId)
    }
}

/// A registered application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: AppId,

    /// Display name, never empty.
    pub name: String,

    /// Path to the Windows executable.
    pub source: PathBuf,

    pub category: String,

    /// Extra arguments passed verbatim after the executable.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub notes: String,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_launched: Option<DateTime<Utc>>,

    pub bottle: BottleId,
}

impl Application {
    /// Create a new application record bound to its bottle.
    pub fn new(source: PathBuf, name: Option<&str>, category: impl Into<String>) -> Self {
        let id = AppId::for_path(&source);
        let name = display_name(name, &source);
        Application {
            id,
            name,
            source,
            category: category.into(),
            args: Vec::new(),
            notes: String::new(),
            created_at: Utc::now(),
            last_launched: None,
            bottle: BottleId::for_app(id),
        }
    }

    /// Set the display name, falling back to the executable name when blank.
    pub fn rename(&mut self, name: &str) {
        self.name = display_name(Some(name), &self.source);
    }
}

/// Pick a display name: the given one if non-blank, else the file stem.
pub fn display_name(name: Option<&str>, source: &Path) -> String {
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    source
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| source.display().to_string())
}

/// Field changes accepted by `edit`. Source path and id are immutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppEdit {
    pub name: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub args: Option<Vec<String>>,
}

impl AppEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.category.is_none() && self.notes.is_none() && self.args.is_none()
    }

    /// Apply the changes to an application.
    pub fn apply(self, app: &mut Application) {
        if let Some(name) = self.name {
            app.rename(&name);
        }
        if let Some(category) = self.category {
            let category = category.trim();
            if !category.is_empty() {
                app.category = category.to_string();
            }
        }
        if let Some(notes) = self.notes {
            app.notes = notes;
        }
        if let Some(args) = self.args {
            app.args = args;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_stable_per_path() {
        let a = AppId::for_path(Path::new("/games/Balatro.exe"));
        let b = AppId::for_path(Path::new("/games/Balatro.exe"));
        let c = AppId::for_path(Path::new("/games/Other.exe"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_id_prefix_and_parse() {
        let id = AppId::for_path(Path::new("/games/Balatro.exe"));
        assert!(id.matches_prefix(&id.short()));
        assert!(id.matches_prefix(&id.to_string()[..10]));
        assert!(!id.matches_prefix(""));
        assert_eq!(id.to_string().parse::<AppId>().unwrap(), id);
    }

    #[test]
    fn test_display_name_falls_back_to_stem() {
        let path = Path::new("/games/Balatro.exe");
        assert_eq!(display_name(None, path), "Balatro");
        assert_eq!(display_name(Some("   "), path), "Balatro");
        assert_eq!(display_name(Some(" My Game "), path), "My Game");
    }

    #[test]
    fn test_new_application_binds_bottle() {
        let app = Application::new(PathBuf::from("/games/Balatro.exe"), None, "Games");
        assert_eq!(app.name, "Balatro");
        assert_eq!(app.bottle, BottleId::for_app(app.id));
        assert!(app.last_launched.is_none());
    }

    #[test]
    fn test_edit_keeps_name_non_empty() {
        let mut app = Application::new(PathBuf::from("/games/Balatro.exe"), Some("Cards"), "Games");
        AppEdit {
            name: Some(String::new()),
            notes: Some("runs great".into()),
            args: Some(vec!["-windowed".into()]),
            ..Default::default()
        }
        .apply(&mut app);

        assert_eq!(app.name, "Balatro");
        assert_eq!(app.notes, "runs great");
        assert_eq!(app.args, vec!["-windowed"]);
        assert_eq!(app.category, "Games");
    }
}
