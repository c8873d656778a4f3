//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is handed to every stage of the pipeline. Stages
//! poll it between units of work (one type, one document) and stop early when
//! it is set. Nothing is rolled back: whatever was produced before the check
//! stays on disk.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared, clonable cancellation flag.
///
/// Clones observe the same flag, so the controller keeps one clone and the
/// worker thread another.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
