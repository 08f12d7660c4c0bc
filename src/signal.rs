//! Shared cross-thread flags for cooperative shutdown.
//!
//! Two instances are used per pipeline: the termination signal ("die") that
//! every worker polls at least once per queue-wait timeout, and the
//! viewer-closed signal raised by the renderer. Setting a signal is
//! idempotent; it never resets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A set-once boolean flag shared by reference across threads.
#[derive(Clone, Debug, Default)]
pub struct Signal {
    flag: Arc<AtomicBool>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag. Safe to call any number of times.
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_the_same_flag() {
        let a = Signal::new();
        let b = a.clone();
        assert!(!b.is_set());
        a.set();
        assert!(b.is_set());
        // Idempotent.
        a.set();
        assert!(a.is_set());
    }
}
