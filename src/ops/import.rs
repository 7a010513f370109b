//! Import of the legacy `exes.json` application list.
//!
//! Two layouts exist in the wild: an object with an `exes` array (and a
//! `categories` index that is rebuilt from the records anyway), and a bare
//! array of records. Old bottle directories are not carried over; imported
//! applications get fresh, empty bottles.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{CellarError, CellarResult, ErrorKind};
use crate::ops::registry::{insert_with_bottle, Registry};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyFile {
    Indexed { exes: Vec<LegacyRecord> },
    Bare(Vec<LegacyRecord>),
}

#[derive(Debug, Deserialize)]
struct LegacyRecord {
    path: PathBuf,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    custom_name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    launch_options: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// A record that was not imported, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<crate::core::Application>,
    pub skipped: Vec<SkippedRecord>,
}

impl Registry {
    /// Register every application listed in a legacy `exes.json`.
    ///
    /// Records whose executable is gone or which are already registered are
    /// skipped. Everything else is added in one registry write.
    pub fn import_legacy(&self, path: &Path) -> CellarResult<ImportReport> {
        let contents = std::fs::read_to_string(path).map_err(|e| CellarError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let records = match serde_json::from_str::<LegacyFile>(&contents) {
            Ok(LegacyFile::Indexed { exes }) => exes,
            Ok(LegacyFile::Bare(exes)) => exes,
            Err(e) => {
                return Err(CellarError::Config {
                    message: format!("{} is not a legacy application list: {}", path.display(), e),
                })
            }
        };

        let mut report = ImportReport::default();
        let mut prepared = Vec::new();
        for record in records {
            let name = record.custom_name.as_deref().or(record.name.as_deref());
            match self.prepare_application(&record.path, record.category.as_deref(), name) {
                Ok((mut app, runtime_version)) => {
                    if let Some(options) = &record.launch_options {
                        app.args = options.split_whitespace().map(String::from).collect();
                    }
                    app.notes = record.notes.unwrap_or_default();
                    prepared.push((app, runtime_version));
                }
                Err(e) => report.skipped.push(SkippedRecord {
                    path: record.path,
                    reason: e.to_string(),
                }),
            }
        }

        let (imported, skipped) = self.mutate(|store| {
            let mut imported = Vec::new();
            let mut skipped = Vec::new();
            for (app, runtime_version) in prepared {
                let path = app.source.clone();
                match insert_with_bottle(store, app, runtime_version) {
                    Ok(app) => imported.push(app),
                    Err(e) if e.kind() == ErrorKind::DuplicateApplication => {
                        skipped.push(SkippedRecord {
                            path,
                            reason: e.to_string(),
                        })
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok((imported, skipped))
        })?;

        report.imported = imported;
        report.skipped.extend(skipped);
        tracing::info!(
            "imported {} applications from {} ({} skipped)",
            report.imported.len(),
            path.display(),
            report.skipped.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fake_exe, CountingFetcher};
    use crate::util::config::Config;
    use crate::util::context::GlobalContext;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn registry(tmp: &TempDir) -> Registry {
        let ctx = GlobalContext::with_home(tmp.path().join("home"), Config::default());
        Registry::open_with_fetcher(&ctx, Arc::new(CountingFetcher::new(Vec::new()))).unwrap()
    }

    fn json_path(path: &Path) -> String {
        serde_json::to_string(path).unwrap()
    }

    #[test]
    fn test_import_indexed_layout() {
        let tmp = TempDir::new().unwrap();
        let exe = fake_exe(&tmp.path().join("games"), "doom.exe");
        let list = tmp.path().join("exes.json");
        std::fs::write(
            &list,
            format!(
                r#"{{
                    "exes": [{{
                        "name": "doom.exe",
                        "path": {},
                        "bottle": "bottle_0",
                        "category": "Games",
                        "custom_name": "Doom",
                        "launch_options": "-skill 4  -fast",
                        "notes": "classic"
                    }}],
                    "categories": {{"Games": [0], "Other": []}}
                }}"#,
                json_path(&exe)
            ),
        )
        .unwrap();

        let registry = registry(&tmp);
        let report = registry.import_legacy(&list).unwrap();
        assert!(report.skipped.is_empty());
        let app = &report.imported[0];
        assert_eq!(app.name, "Doom");
        assert_eq!(app.category, "Games");
        assert_eq!(app.args, vec!["-skill", "4", "-fast"]);
        assert_eq!(app.notes, "classic");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_import_bare_list_skips_missing_and_duplicates() {
        let tmp = TempDir::new().unwrap();
        let exe = fake_exe(&tmp.path().join("apps"), "editor.exe");
        let gone = tmp.path().join("apps/gone.exe");
        let list = tmp.path().join("exes.json");
        std::fs::write(
            &list,
            format!(
                r#"[{{"path": {exe}}}, {{"path": {gone}, "name": "gone.exe"}}, {{"path": {exe}}}]"#,
                exe = json_path(&exe),
                gone = json_path(&gone)
            ),
        )
        .unwrap();

        let registry = registry(&tmp);
        let report = registry.import_legacy(&list).unwrap();
        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.imported[0].name, "editor");
        assert_eq!(report.imported[0].category, "Other");
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped.iter().any(|s| s.path == gone));

        // Importing again only produces duplicates.
        let again = registry.import_legacy(&list).unwrap();
        assert!(again.imported.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_import_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let list = tmp.path().join("exes.json");
        std::fs::write(&list, r#"{"apps": 3}"#).unwrap();

        let err = registry(&tmp).import_legacy(&list).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
