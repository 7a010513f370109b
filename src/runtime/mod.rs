//! Compatibility runtime management: fetching, unpacking and probing.

pub mod archive;
pub mod cancel;
pub mod fetch;
pub mod installer;

pub use cancel::CancelToken;
pub use fetch::{Fetcher, UrlFetcher};
pub use installer::{RuntimeInstaller, RuntimeSource};
