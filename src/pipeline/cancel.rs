//! Cooperative cancellation shared between a run and its controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Returned from a checkpoint once cancellation has been requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Processing cancelled")]
pub struct Cancelled;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The run stops at its next checkpoint.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Checkpoint: fails with [`Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Returns true if the error chain is a cancellation rather than a failure.
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Cancelled>().is_some()
}
