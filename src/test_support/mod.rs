//! Test utilities and mocks for cellar unit tests.
//!
//! Provides mock [`Fetcher`]s so runtime installs never touch the network,
//! plus builders for runtime tarballs, fake executables and ready-made
//! runtime roots.
//!
//! # Example
//!
//! ```rust,ignore
//! use cellar::test_support::{runtime_tarball, CountingFetcher};
//!
//! let fetcher = Arc::new(CountingFetcher::new(runtime_tarball("wine-9.0")));
//! let installer = RuntimeInstaller::new(root, source, fetcher.clone());
//! installer.ensure_installed(None, &CancelToken::never())?;
//! assert_eq!(fetcher.calls(), 1);
//! ```

pub mod fixtures;

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::error::{CellarError, CellarResult};
use crate::runtime::cancel::CancelToken;
use crate::runtime::fetch::{Fetcher, ProgressFn};

pub use fixtures::*;

/// Serves fixed bytes and counts how often it was asked to.
#[derive(Debug, Default)]
pub struct CountingFetcher {
    data: Vec<u8>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn new(data: Vec<u8>) -> Self {
        CountingFetcher {
            data,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetches performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for CountingFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &mut dyn Write,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> CellarResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        cancel.check("runtime download")?;

        dest.write_all(&self.data).map_err(|e| CellarError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let len = self.data.len() as u64;
        progress(len, Some(len));
        Ok(len)
    }
}

/// Always fails like an unreachable server.
#[derive(Debug, Default)]
pub struct FailingFetcher;

impl Fetcher for FailingFetcher {
    fn fetch(
        &self,
        url: &str,
        _dest: &mut dyn Write,
        _cancel: &CancelToken,
        _progress: ProgressFn<'_>,
    ) -> CellarResult<u64> {
        Err(CellarError::Download {
            url: url.to_string(),
            message: "connection refused".to_string(),
        })
    }
}

/// Writes half of its payload, then cancels the token it was given.
#[derive(Debug)]
pub struct CancellingFetcher {
    data: Vec<u8>,
    trigger: CancelToken,
}

impl CancellingFetcher {
    pub fn new(data: Vec<u8>, trigger: CancelToken) -> Self {
        CancellingFetcher { data, trigger }
    }
}

impl Fetcher for CancellingFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &mut dyn Write,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> CellarResult<u64> {
        let half = &self.data[..self.data.len() / 2];
        dest.write_all(half).map_err(|e| CellarError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        progress(half.len() as u64, Some(self.data.len() as u64));

        self.trigger.cancel();
        cancel.check("runtime download")?;
        Ok(half.len() as u64)
    }
}

/// Holds a download open until the test releases it.
///
/// The fetcher reports on its [`Gate`] once it has started, then blocks
/// until [`Gate::release`] before writing its payload.
#[derive(Debug)]
pub struct GatedFetcher {
    data: Vec<u8>,
    started: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

/// The test side of a [`GatedFetcher`].
#[derive(Debug)]
pub struct Gate {
    started: Receiver<()>,
    release: Sender<()>,
}

impl GatedFetcher {
    pub fn new(data: Vec<u8>) -> (Self, Gate) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let fetcher = GatedFetcher {
            data,
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        };
        let gate = Gate {
            started: started_rx,
            release: release_tx,
        };
        (fetcher, gate)
    }
}

impl Gate {
    /// Block until the fetcher is inside a download.
    pub fn wait_started(&self) {
        self.started
            .recv_timeout(Duration::from_secs(10))
            .expect("download never started");
    }

    /// Let the blocked download finish.
    pub fn release(&self) {
        self.release.send(()).unwrap();
    }
}

impl Fetcher for GatedFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &mut dyn Write,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> CellarResult<u64> {
        self.started.lock().unwrap().send(()).ok();
        self.release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(10))
            .map_err(|e| CellarError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        cancel.check("runtime download")?;

        dest.write_all(&self.data).map_err(|e| CellarError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let len = self.data.len() as u64;
        progress(len, Some(len));
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_counting_fetcher() {
        let fetcher = CountingFetcher::new(b"payload".to_vec());
        let mut out = Vec::new();
        let n = fetcher
            .fetch("mock://x", &mut out, &CancelToken::never(), &mut |_, _| {})
            .unwrap();
        assert_eq!(n, 7);
        assert_eq!(out, b"payload");
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_cancelling_fetcher() {
        let cancel = CancelToken::new();
        let fetcher = CancellingFetcher::new(vec![0u8; 10], cancel.clone());
        let mut out = Vec::new();
        let err = fetcher
            .fetch("mock://x", &mut out, &cancel, &mut |_, _| {})
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(out.len(), 5);
    }
}
