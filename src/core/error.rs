//! Error taxonomy for bottle, runtime and launch operations.
//!
//! Every variant names the offending path, application id or bottle id so a
//! collaborator never has to render a bare "something failed".

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::core::application::AppId;
use crate::core::bottle::{BottleId, BottleStatus};

/// Result alias used across the library.
pub type CellarResult<T> = Result<T, CellarError>;

/// Discriminant of a [`CellarError`], stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ExecutableMissing,
    UnsupportedPath,
    DuplicateApplication,
    DuplicateBottle,
    IsolationSetup,
    Deletion,
    Download,
    Extraction,
    InsufficientSpace,
    RuntimeNotReady,
    ProcessStart,
    BottleNotReady,
    Cancelled,
    ApplicationNotFound,
    AmbiguousApplication,
    Store,
    Config,
}

#[derive(Debug, Error, Diagnostic)]
pub enum CellarError {
    #[error("executable not found: {}", path.display())]
    #[diagnostic(
        code(cellar::executable_missing),
        help("the file may have been moved or deleted; remove the entry and add it again")
    )]
    ExecutableMissing { path: PathBuf },

    #[error("path is not valid UTF-8: {}", path.display())]
    #[diagnostic(
        code(cellar::unsupported_path),
        help("rename the file or one of its parent directories")
    )]
    UnsupportedPath { path: PathBuf },

    #[error("`{}` is already registered as application {existing}", path.display())]
    #[diagnostic(code(cellar::duplicate_application))]
    DuplicateApplication { path: PathBuf, existing: AppId },

    #[error("application {app} already owns a bottle")]
    #[diagnostic(code(cellar::duplicate_bottle))]
    DuplicateBottle { app: AppId },

    #[error("failed to set up bottle {bottle} at {}", path.display())]
    #[diagnostic(
        code(cellar::isolation_setup),
        help("check permissions and free space of the bottles directory")
    )]
    IsolationSetup {
        bottle: BottleId,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("bottle {bottle} could not be fully removed from {}", path.display())]
    #[diagnostic(
        code(cellar::deletion),
        severity(Warning),
        help("remove the directory by hand or run `cellar prune`")
    )]
    Deletion {
        bottle: BottleId,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to download runtime from {url}: {message}")]
    #[diagnostic(
        code(cellar::download),
        help("check your network connection or set CELLAR_RUNTIME_URL")
    )]
    Download { url: String, message: String },

    #[error("failed to extract runtime archive from {url}: {message}")]
    #[diagnostic(code(cellar::extraction))]
    Extraction { url: String, message: String },

    #[error(
        "not enough free space at {}: need {required} bytes, {available} available",
        path.display()
    )]
    #[diagnostic(code(cellar::insufficient_space))]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    #[error("runtime is not ready: {reason}")]
    #[diagnostic(
        code(cellar::runtime_not_ready),
        help("run `cellar runtime install` and try again")
    )]
    RuntimeNotReady { reason: String },

    #[error("failed to start {app} via `{program}`")]
    #[diagnostic(code(cellar::process_start))]
    ProcessStart {
        app: AppId,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("bottle {bottle} is {status}, not ready")]
    #[diagnostic(code(cellar::bottle_not_ready))]
    BottleNotReady { bottle: BottleId, status: BottleStatus },

    #[error("{operation} was cancelled")]
    #[diagnostic(code(cellar::cancelled))]
    Cancelled { operation: String },

    #[error("no application matches `{query}`")]
    #[diagnostic(code(cellar::not_found), help("run `cellar list` to see registered applications"))]
    ApplicationNotFound { query: String },

    #[error("`{query}` matches several applications: {}", matches.join(", "))]
    #[diagnostic(code(cellar::ambiguous), help("use a longer id prefix"))]
    AmbiguousApplication { query: String, matches: Vec<String> },

    #[error("registry store error at {}: {message}", path.display())]
    #[diagnostic(code(cellar::store))]
    Store { path: PathBuf, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(cellar::config))]
    Config { message: String },

    #[error("application {app}: {inner}")]
    #[diagnostic(code(cellar::application))]
    InApplication { app: AppId, inner: Box<CellarError> },
}

impl CellarError {
    /// The error kind, looking through application context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CellarError::ExecutableMissing { .. } => ErrorKind::ExecutableMissing,
            CellarError::UnsupportedPath { .. } => ErrorKind::UnsupportedPath,
            CellarError::DuplicateApplication { .. } => ErrorKind::DuplicateApplication,
            CellarError::DuplicateBottle { .. } => ErrorKind::DuplicateBottle,
            CellarError::IsolationSetup { .. } => ErrorKind::IsolationSetup,
            CellarError::Deletion { .. } => ErrorKind::Deletion,
            CellarError::Download { .. } => ErrorKind::Download,
            CellarError::Extraction { .. } => ErrorKind::Extraction,
            CellarError::InsufficientSpace { .. } => ErrorKind::InsufficientSpace,
            CellarError::RuntimeNotReady { .. } => ErrorKind::RuntimeNotReady,
            CellarError::ProcessStart { .. } => ErrorKind::ProcessStart,
            CellarError::BottleNotReady { .. } => ErrorKind::BottleNotReady,
            CellarError::Cancelled { .. } => ErrorKind::Cancelled,
            CellarError::ApplicationNotFound { .. } => ErrorKind::ApplicationNotFound,
            CellarError::AmbiguousApplication { .. } => ErrorKind::AmbiguousApplication,
            CellarError::Store { .. } => ErrorKind::Store,
            CellarError::Config { .. } => ErrorKind::Config,
            CellarError::InApplication { inner, .. } => inner.kind(),
        }
    }

    /// Attach the application an error occurred for.
    ///
    /// Errors that already carry the application id are returned as-is.
    pub fn for_app(self, app: AppId) -> Self {
        match &self {
            CellarError::InApplication { .. }
            | CellarError::DuplicateBottle { .. }
            | CellarError::ProcessStart { .. } => self,
            _ => CellarError::InApplication {
                app,
                inner: Box::new(self),
            },
        }
    }

    /// The underlying error with application context removed.
    pub fn root(&self) -> &CellarError {
        match self {
            CellarError::InApplication { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Whether this error is reported as a warning rather than a failure.
    pub fn is_warning(&self) -> bool {
        self.kind() == ErrorKind::Deletion
    }

    pub(crate) fn store(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        CellarError::Store {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
