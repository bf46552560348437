use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::events::Interrupt;

/// Per-script abort flag that also wakes the script's current blocking wait
pub struct AbortSignal {
    aborted: AtomicBool,
    /// The wait the script is blocked in, if any
    parked: Mutex<Option<Arc<dyn Interrupt>>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self {
            aborted: AtomicBool::new(false),
            parked: Mutex::new(None),
        }
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        if let Some(waiter) = self.parked.lock().take() {
            waiter.interrupt();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Record the wait about to block; false if the script is already aborted
    pub(crate) fn park(&self, waiter: Arc<dyn Interrupt>) -> bool {
        let mut parked = self.parked.lock();
        if self.is_aborted() {
            return false;
        }
        *parked = Some(waiter);
        true
    }

    pub(crate) fn unpark(&self) {
        self.parked.lock().take();
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
