//! Launch coordinator: starts an application inside its bottle.
//!
//! Launching is fire and forget. The child's output goes to a per-application
//! log file and a detached thread waits on it so it never lingers as a zombie.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::application::{AppId, Application};
use crate::core::bottle::Bottle;
use crate::core::error::{CellarError, CellarResult};
use crate::core::runtime::RuntimeInstallation;
use crate::util::config::LaunchConfig;
use crate::util::process::ProcessBuilder;

/// Environment variable the dynamic loader searches for libraries.
#[cfg(target_os = "macos")]
const LIBRARY_PATH_VAR: &str = "DYLD_FALLBACK_LIBRARY_PATH";
#[cfg(not(target_os = "macos"))]
const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// A started application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchResult {
    pub app: AppId,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub command: String,
    pub log: Option<PathBuf>,
}

/// Assembles the bottle environment and starts processes.
#[derive(Debug, Clone, Default)]
pub struct LaunchCoordinator {
    logs_dir: Option<PathBuf>,
    winedebug: Option<String>,
    env: BTreeMap<String, String>,
}

impl LaunchCoordinator {
    /// Output is discarded unless a log directory is set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LaunchConfig, logs_dir: impl Into<PathBuf>) -> Self {
        LaunchCoordinator {
            logs_dir: config.capture_logs.then(|| logs_dir.into()),
            winedebug: config.winedebug.clone(),
            env: config.env.clone(),
        }
    }

    pub fn with_logs_dir(mut self, logs_dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = Some(logs_dir.into());
        self
    }

    /// Log file for an application, when output is captured.
    pub fn log_path(&self, app: AppId) -> Option<PathBuf> {
        self.logs_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", app)))
    }

    /// Check preconditions and build the command without starting it.
    ///
    /// Preconditions are checked in order: bottle ready, runtime installed,
    /// executable present.
    pub fn prepare(
        &self,
        app: &Application,
        bottle: &Bottle,
        runtime: &RuntimeInstallation,
    ) -> CellarResult<ProcessBuilder> {
        if !bottle.is_ready() {
            return Err(CellarError::BottleNotReady {
                bottle: bottle.id,
                status: bottle.status,
            });
        }

        let binary = match (&runtime.binary, runtime.is_installed()) {
            (Some(binary), true) => binary,
            _ => {
                return Err(CellarError::RuntimeNotReady {
                    reason: format!("runtime is {}", runtime.status),
                })
            }
        };

        if !app.source.is_file() {
            return Err(CellarError::ExecutableMissing {
                path: app.source.clone(),
            });
        }

        let mut cmd = ProcessBuilder::new(binary)
            .arg(&app.source)
            .args(&app.args)
            .env("WINEPREFIX", &bottle.root);

        if let Some(lib_dir) = runtime.lib_dir() {
            cmd = cmd.env(LIBRARY_PATH_VAR, prepend_path(&lib_dir, LIBRARY_PATH_VAR));
        }
        if let Some(winedebug) = &self.winedebug {
            cmd = cmd.env("WINEDEBUG", winedebug);
        }
        for (key, value) in &self.env {
            cmd = cmd.env(key, value);
        }

        if let Some(dir) = app.source.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd = cmd.cwd(dir);
        }
        if let Some(log) = self.log_path(app.id) {
            cmd = cmd.log_to(log);
        }

        Ok(cmd)
    }

    /// Start `app` in `bottle` using `runtime`.
    pub fn launch(
        &self,
        app: &Application,
        bottle: &Bottle,
        runtime: &RuntimeInstallation,
    ) -> CellarResult<LaunchResult> {
        let cmd = self.prepare(app, bottle, runtime)?;
        let command = cmd.display_command();
        tracing::debug!("launching {}: {}", app.id, command);

        let child = cmd.spawn().map_err(|source| CellarError::ProcessStart {
            app: app.id,
            program: cmd.get_program().display().to_string(),
            source,
        })?;
        let pid = child.id();
        reap(child);

        tracing::info!("Launched {} (pid {})", app.name, pid);
        Ok(LaunchResult {
            app: app.id,
            pid,
            started_at: Utc::now(),
            command,
            log: self.log_path(app.id),
        })
    }
}

/// Wait for `child` on a detached thread.
fn reap(mut child: std::process::Child) {
    let pid = child.id();
    let spawned = std::thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => tracing::debug!("process {} exited: {}", pid, status),
            Err(e) => tracing::debug!("failed to wait for process {}: {}", pid, e),
        });
    if let Err(e) = spawned {
        tracing::warn!("could not watch process {}: {}", pid, e);
    }
}

/// `dir` followed by the current value of the search path variable `var`.
fn prepend_path(dir: &Path, var: &str) -> OsString {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os(var) {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths).unwrap_or_else(|_| OsString::from(dir.as_os_str()))
}
