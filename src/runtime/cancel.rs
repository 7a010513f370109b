//! Cooperative cancellation for long-running runtime operations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::error::{CellarError, CellarResult};

/// Shared flag checked between chunks of a download or extraction.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token nobody holds a handle to cancel.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` once the token has been triggered.
    pub fn check(&self, operation: &str) -> CellarResult<()> {
        if self.is_cancelled() {
            return Err(CellarError::Cancelled {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}
