//! Cooperative cancellation shared by a runner and all of its forks

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

/// Handle used to stop a running program from another thread.
///
/// The runner polls the token before each statement and each command, so
/// cancellation takes effect at the next node boundary. Child processes
/// already started by an exec hook are not touched.
#[derive(Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Only the first reason is kept.
    pub fn cancel(&self, reason: impl Into<String>) {
        let mut slot = self.state.reason.lock();
        if slot.is_none() {
            *slot = Some(reason.into());
        }
        self.state.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn reason(&self) -> String {
        self.state
            .reason
            .lock()
            .clone()
            .unwrap_or_else(|| "context canceled".to_string())
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
