//! CLI integration tests for Cellar.
//!
//! Every test runs against its own data directory through `CELLAR_HOME`, so
//! nothing touches the real registry or runtime.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const FAKE_WINE: &str = "#!/bin/sh\necho \"args: $*\"\necho \"WINEPREFIX=$WINEPREFIX\"\n";

/// An isolated cellar home plus a directory of fake executables.
struct Env {
    tmp: TempDir,
}

impl Env {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        fs::write(
            home.join("config.toml"),
            "[runtime]\nallow_system = false\nmin_free_space_mb = 0\n",
        )
        .unwrap();
        Env { tmp }
    }

    fn home(&self) -> PathBuf {
        self.tmp.path().join("home")
    }

    /// Get the cellar binary command bound to this home.
    fn cellar(&self) -> Command {
        let mut cmd = Command::cargo_bin("cellar").unwrap();
        cmd.env("CELLAR_HOME", self.home())
            .env_remove("CELLAR_RUNTIME_URL")
            .env_remove("CELLAR_RUNTIME_VERSION")
            .env_remove("CELLAR_RUNTIME_ROOT")
            .env_remove("CELLAR_CATEGORIES")
            .env_remove("CELLAR_LOG")
            .arg("--no-color");
        cmd
    }

    fn exe(&self, name: &str) -> PathBuf {
        let dir = self.tmp.path().join("games");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, b"MZ\x90\x00").unwrap();
        path
    }

    /// A gzipped runtime package served from disk.
    fn runtime_package(&self) -> String {
        let path = self.tmp.path().join("wine-9.0.tar.gz");
        fs::write(&path, runtime_tarball()).unwrap();
        url::Url::from_file_path(&path).unwrap().to_string()
    }

    fn list_json(&self) -> serde_json::Value {
        let output = self.cellar().args(["list", "--json"]).output().unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

fn runtime_tarball() -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents, mode) in [
        ("wine-9.0/bin/wine", FAKE_WINE, 0o755),
        ("wine-9.0/lib/libwine.so.1", "ELF", 0o644),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(contents.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder.append(&header, contents.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn app_id(entry: &serde_json::Value) -> String {
    entry["application"]["id"].as_str().unwrap().to_string()
}

fn bottle_root(entry: &serde_json::Value) -> PathBuf {
    PathBuf::from(entry["bottle"]["root"].as_str().unwrap())
}

/// Staging directories an install left next to the runtime root.
fn staging_dirs(home: &Path) -> Vec<PathBuf> {
    fs::read_dir(home)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.file_name().to_string_lossy().starts_with(".runtime-staging-"))
                .map(|e| e.path())
                .collect()
        })
        .unwrap_or_default()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

// ============================================================================
// cellar add / list
// ============================================================================

#[test]
fn test_add_then_list() {
    let env = Env::new();
    let exe = env.exe("Solitaire.exe");

    env.cellar()
        .args(["add", path_arg(&exe), "--category", "Games"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Added"))
        .stderr(predicate::str::contains("Solitaire"));

    env.cellar()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Games:"))
        .stdout(predicate::str::contains("Solitaire"))
        .stdout(predicate::str::contains("uninitialized"));

    let list = env.list_json();
    let entries = list.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["bottle"]["status"], "uninitialized");
    assert!(!bottle_root(&entries[0]).exists());
    assert!(env.home().join("registry.toml").exists());
}

#[test]
fn test_add_uses_catalog_category() {
    let env = Env::new();
    let exe = env.exe("Balatro.exe");

    env.cellar()
        .args(["add", path_arg(&exe)])
        .assert()
        .success()
        .stderr(predicate::str::contains("in Games"));
}

#[test]
fn test_add_duplicate_fails() {
    let env = Env::new();
    let exe = env.exe("Solitaire.exe");

    env.cellar().args(["add", path_arg(&exe)]).assert().success();
    env.cellar()
        .args(["add", path_arg(&exe), "--name", "Again"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered"));

    assert_eq!(env.list_json().as_array().unwrap().len(), 1);
}

#[test]
fn test_add_missing_file_fails() {
    let env = Env::new();

    env.cellar()
        .args(["add", "/definitely/not/here.exe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("executable not found"))
        .stderr(predicate::str::contains("help:"));
}

#[test]
fn test_list_filters() {
    let env = Env::new();
    env.cellar()
        .args(["add", path_arg(&env.exe("alpha.exe")), "-c", "Games"])
        .assert()
        .success();
    env.cellar()
        .args(["add", path_arg(&env.exe("beta.exe")), "-c", "Tools"])
        .assert()
        .success();

    env.cellar()
        .args(["list", "--category", "tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("beta"))
        .stdout(predicate::str::contains("alpha").not());

    env.cellar()
        .args(["list", "--name", "ALP"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha"))
        .stdout(predicate::str::contains("beta").not());
}

#[test]
fn test_list_empty() {
    let env = Env::new();
    env.cellar()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// ============================================================================
// cellar edit / move / info / remove
// ============================================================================

#[test]
fn test_edit_move_and_info() {
    let env = Env::new();
    env.cellar()
        .args(["add", path_arg(&env.exe("doom.exe"))])
        .assert()
        .success();

    env.cellar()
        .args(["edit", "doom", "--name", "Doom", "--args", "-skill 4"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Updated"));

    env.cellar()
        .args(["move", "Doom", "Games"])
        .assert()
        .success();

    env.cellar()
        .args(["info", "doom"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Doom"))
        .stdout(predicate::str::contains("category:    Games"))
        .stdout(predicate::str::contains("-skill 4"))
        .stdout(predicate::str::contains("launched:    never"));
}

#[test]
fn test_edit_without_changes_fails() {
    let env = Env::new();
    env.cellar()
        .args(["add", path_arg(&env.exe("doom.exe"))])
        .assert()
        .success();

    env.cellar()
        .args(["edit", "doom"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to change"));
}

#[test]
fn test_unknown_application() {
    let env = Env::new();
    env.cellar()
        .args(["info", "nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no application matches `nobody`"));
}

#[test]
fn test_remove_by_id_prefix() {
    let env = Env::new();
    env.cellar()
        .args(["add", path_arg(&env.exe("doom.exe"))])
        .assert()
        .success();
    let list = env.list_json();
    let id = app_id(&list[0]);

    env.cellar()
        .args(["remove", &id[..8]])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));

    assert!(env.list_json().as_array().unwrap().is_empty());
}

// ============================================================================
// cellar catalog
// ============================================================================

#[test]
fn test_catalog_lookup() {
    let env = Env::new();
    env.cellar()
        .args(["catalog", "lookup", "BALATRO"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Balatro"))
        .stdout(predicate::str::contains("Platinum"));

    env.cellar()
        .args(["catalog", "lookup", "Nonexistent Game"])
        .assert()
        .failure();
}

#[test]
fn test_catalog_override_file() {
    let env = Env::new();
    fs::write(
        env.home().join("catalog.toml"),
        "[apps.\"balatro\"]\nrating = \"gold\"\n",
    )
    .unwrap();

    env.cellar()
        .args(["catalog", "lookup", "Balatro"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gold"));
}

// ============================================================================
// cellar runtime / launch
// ============================================================================

#[test]
fn test_runtime_status_not_installed() {
    let env = Env::new();
    env.cellar()
        .args(["runtime", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not installed"));
}

#[cfg(unix)]
#[test]
fn test_runtime_install_from_file() {
    let env = Env::new();
    let url = env.runtime_package();

    env.cellar()
        .env("CELLAR_RUNTIME_URL", &url)
        .env("CELLAR_RUNTIME_VERSION", "9.0")
        .args(["runtime", "install"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Installed"));

    assert!(env.home().join("runtime/bin/wine").exists());

    env.cellar()
        .env("CELLAR_RUNTIME_URL", &url)
        .env("CELLAR_RUNTIME_VERSION", "9.0")
        .args(["runtime", "install"])
        .assert()
        .success()
        .stderr(predicate::str::contains("already installed"));

    env.cellar()
        .args(["runtime", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed"))
        .stdout(predicate::str::contains("9.0.0"));
}

#[cfg(unix)]
#[test]
fn test_interrupted_install_removes_staging() {
    use std::io::Write;
    use std::process::Stdio;
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    let env = Env::new();
    let pipe_path = env.tmp.path().join("wine-9.0.pipe");
    assert!(Command::new("mkfifo").arg(&pipe_path).status().unwrap().success());

    let mut child = env
        .cellar()
        .env("CELLAR_RUNTIME_URL", &pipe_path)
        .env("CELLAR_RUNTIME_VERSION", "9.0")
        .args(["runtime", "install"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // The download reads from the pipe, so it stays in flight until we write
    let deadline = Instant::now() + Duration::from_secs(30);
    while staging_dirs(&env.home()).is_empty() {
        assert!(child.try_wait().unwrap().is_none(), "install exited early");
        assert!(Instant::now() < deadline, "install never started");
        sleep(Duration::from_millis(20));
    }
    let mut pipe = fs::OpenOptions::new().write(true).open(&pipe_path).unwrap();
    pipe.write_all(&runtime_tarball()[..64]).unwrap();

    let pid = child.id().to_string();
    assert!(Command::new("kill").args(["-INT", &pid]).status().unwrap().success());
    sleep(Duration::from_millis(300));
    pipe.write_all(&[0u8; 4096]).ok();

    let output = child.wait_with_output().unwrap();
    drop(pipe);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cancelled"));
    assert!(staging_dirs(&env.home()).is_empty());
    assert!(!env.home().join("runtime/bin/wine").exists());
}

#[cfg(unix)]
#[test]
fn test_launch_materializes_bottle() {
    let env = Env::new();
    let url = env.runtime_package();
    env.cellar()
        .args(["add", path_arg(&env.exe("game.exe"))])
        .assert()
        .success();

    env.cellar()
        .env("CELLAR_RUNTIME_URL", &url)
        .env("CELLAR_RUNTIME_VERSION", "9.0")
        .args(["launch", "game"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Launched"));

    let list = env.list_json();
    assert_eq!(list[0]["bottle"]["status"], "ready");
    assert!(bottle_root(&list[0]).join("drive_c").is_dir());
    assert!(list[0]["application"]["last_launched"].is_string());
}

#[test]
fn test_launch_with_unreachable_runtime_fails() {
    let env = Env::new();
    env.cellar()
        .args(["add", path_arg(&env.exe("game.exe"))])
        .assert()
        .success();

    let missing = env.tmp.path().join("missing.tar.gz");
    env.cellar()
        .env(
            "CELLAR_RUNTIME_URL",
            url::Url::from_file_path(&missing).unwrap().to_string(),
        )
        .args(["launch", "game"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to download runtime"));

    let list = env.list_json();
    assert_eq!(list[0]["bottle"]["status"], "uninitialized");
}

// ============================================================================
// cellar prune / import / completions
// ============================================================================

#[test]
fn test_prune_removes_orphans() {
    let env = Env::new();
    let orphan = env
        .home()
        .join("bottles/bottle-0123456789abcdef0123456789abcdef");
    fs::create_dir_all(orphan.join("drive_c")).unwrap();

    env.cellar()
        .args(["prune", "--dry-run"])
        .assert()
        .success()
        .stderr(predicate::str::contains("would remove"));
    assert!(orphan.exists());

    env.cellar().arg("prune").assert().success();
    assert!(!orphan.exists());
}

#[test]
fn test_prune_removes_file_shaped_orphan() {
    let env = Env::new();
    let bottles = env.home().join("bottles");
    fs::create_dir_all(&bottles).unwrap();
    let leftover = bottles.join("bottle-fedcba9876543210fedcba9876543210");
    fs::write(&leftover, "half-written").unwrap();

    env.cellar().arg("prune").assert().success();
    assert!(!leftover.exists());
}

#[test]
fn test_import_legacy_list() {
    let env = Env::new();
    let exe = env.exe("doom.exe");
    let list = env.tmp.path().join("exes.json");
    fs::write(
        &list,
        serde_json::json!({
            "exes": [{
                "name": "doom.exe",
                "path": exe,
                "bottle": "bottle_0",
                "category": "Games",
                "custom_name": "Doom",
                "launch_options": "-fast",
                "notes": ""
            }],
            "categories": {"Games": [0]}
        })
        .to_string(),
    )
    .unwrap();

    env.cellar()
        .args(["import", path_arg(&list)])
        .assert()
        .success()
        .stderr(predicate::str::contains("imported 1 applications"));

    let apps = env.list_json();
    assert_eq!(apps[0]["application"]["name"], "Doom");
    assert_eq!(apps[0]["application"]["args"][0], "-fast");
}

#[test]
fn test_completions() {
    let env = Env::new();
    env.cellar()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cellar"));
}

#[test]
fn test_quiet_suppresses_status() {
    let env = Env::new();
    env.cellar()
        .args(["--quiet", "add", path_arg(&env.exe("doom.exe"))])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}
