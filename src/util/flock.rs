//! Advisory file locks coordinating several `cellar` processes.
//!
//! The lock is held for as long as the returned [`FileLock`] lives.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// A held advisory lock on a file.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until an exclusive lock on `path` is held.
    ///
    /// The lock file and its parent directories are created as needed.
    pub fn exclusive(path: &Path) -> io::Result<Self> {
        let file = open_for_write(path)?;
        file.lock_exclusive()?;
        tracing::trace!("locked {}", path.display());
        Ok(FileLock {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Take an exclusive lock on `path` if nobody else holds one.
    pub fn try_exclusive(path: &Path) -> io::Result<Option<Self>> {
        let file = open_for_write(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FileLock {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Block until a shared lock on `path` is held.
    ///
    /// Returns `None` when the lock file doesn't exist: no writer has ever
    /// run, so there is nothing to coordinate with.
    pub fn shared(path: &Path) -> io::Result<Option<Self>> {
        match OpenOptions::new().read(true).open(path) {
            Ok(file) => {
                file.lock_shared()?;
                Ok(Some(FileLock {
                    file,
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!("failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

fn open_for_write(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
}
