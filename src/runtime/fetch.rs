//! Fetching runtime packages.
//!
//! [`Fetcher`] is the seam between the installer and the network. The
//! production [`UrlFetcher`] understands `http(s)://` URLs (reqwest,
//! blocking), `file://` URLs and plain local paths.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::core::error::{CellarError, CellarResult};
use crate::runtime::cancel::CancelToken;
use crate::util::config::RuntimeConfig;

const CHUNK_SIZE: usize = 64 * 1024;

/// Progress callback: bytes written so far, total when known.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// Opaque package fetch with cancellation and progress reporting.
pub trait Fetcher: Send + Sync {
    /// Write the resource at `url` into `dest`, returning the byte count.
    ///
    /// Implementations check `cancel` between chunks and fail with
    /// `Cancelled` once it fires.
    fn fetch(
        &self,
        url: &str,
        dest: &mut dyn Write,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> CellarResult<u64>;
}

/// Where a package location points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Remote(Url),
    Local(PathBuf),
}

fn parse_location(raw: &str) -> CellarResult<Location> {
    match Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(Location::Remote(url)),
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(Location::Local)
            .map_err(|()| download_error(raw, "not a valid file URL")),
        // `C:\runtime.tar.gz` parses with a one-letter scheme
        Ok(url) if url.scheme().len() == 1 => Ok(Location::Local(PathBuf::from(raw))),
        Ok(url) => Err(download_error(
            raw,
            format!("unsupported URL scheme `{}`", url.scheme()),
        )),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Location::Local(PathBuf::from(raw))),
        Err(e) => Err(download_error(raw, e)),
    }
}

fn download_error(url: &str, message: impl std::fmt::Display) -> CellarError {
    CellarError::Download {
        url: url.to_string(),
        message: message.to_string(),
    }
}

/// Copy `reader` into `dest` in chunks, honouring cancellation.
fn copy_chunks(
    url: &str,
    reader: &mut dyn Read,
    dest: &mut dyn Write,
    total: Option<u64>,
    cancel: &CancelToken,
    progress: ProgressFn<'_>,
) -> CellarResult<u64> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;

    progress(0, total);
    loop {
        cancel.check("runtime download")?;

        let n = reader
            .read(&mut buffer)
            .map_err(|e| download_error(url, e))?;
        if n == 0 {
            break;
        }
        dest.write_all(&buffer[..n])
            .map_err(|e| download_error(url, format!("failed to write package: {e}")))?;
        written += n as u64;
        progress(written, total);
    }
    dest.flush()
        .map_err(|e| download_error(url, format!("failed to write package: {e}")))?;

    Ok(written)
}

/// Fetcher for http(s), file:// and local paths.
#[derive(Debug, Clone)]
pub struct UrlFetcher {
    timeout: Duration,
}

impl UrlFetcher {
    pub fn new() -> Self {
        UrlFetcher {
            timeout: Duration::from_secs(30 * 60),
        }
    }

    /// A fetcher using the `[runtime]` download timeout.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        UrlFetcher::new().with_timeout(Duration::from_secs(config.download_timeout_secs.max(1)))
    }

    /// Overall request timeout for remote downloads.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn fetch_remote(
        &self,
        url: &Url,
        dest: &mut dyn Write,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> CellarResult<u64> {
        let raw = url.as_str();
        tracing::info!("Downloading runtime from {}", raw);

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("cellar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| download_error(raw, e))?;

        let mut response = client
            .get(url.clone())
            .send()
            .map_err(|e| download_error(raw, e))?;

        if !response.status().is_success() {
            return Err(download_error(raw, format!("HTTP {}", response.status())));
        }

        let total = response.content_length();
        copy_chunks(raw, &mut response, dest, total, cancel, progress)
    }

    fn fetch_local(
        &self,
        raw: &str,
        path: &Path,
        dest: &mut dyn Write,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> CellarResult<u64> {
        tracing::info!("Copying runtime package from {}", path.display());

        let mut file = File::open(path)
            .map_err(|e| download_error(raw, format!("{}: {}", path.display(), e)))?;
        let total = file.metadata().ok().map(|m| m.len());
        copy_chunks(raw, &mut file, dest, total, cancel, progress)
    }
}

impl Default for UrlFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for UrlFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &mut dyn Write,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> CellarResult<u64> {
        cancel.check("runtime download")?;
        match parse_location(url)? {
            Location::Remote(remote) => self.fetch_remote(&remote, dest, cancel, progress),
            Location::Local(path) => self.fetch_local(url, &path, dest, cancel, progress),
        }
    }
}
