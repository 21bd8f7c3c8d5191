//! Single-flight guard for discovery runs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-device flag allowing at most one discovery run at a time
#[derive(Debug, Default, Clone)]
pub struct DiscoveryGuard {
    active: Arc<AtomicBool>,
}

impl DiscoveryGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard; `None` when a run is already active
    #[must_use]
    pub fn try_start(&self) -> Option<ActiveRun> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveRun {
                active: Arc::clone(&self.active),
            })
    }

    /// Whether a run currently holds the guard
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Held for the duration of a run; releases the guard on drop
#[derive(Debug)]
pub struct ActiveRun {
    active: Arc<AtomicBool>,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_is_rejected_until_release() {
        let guard = DiscoveryGuard::new();
        let run = guard.try_start().unwrap();
        assert!(guard.is_active());
        assert!(guard.try_start().is_none());
        drop(run);
        assert!(!guard.is_active());
        assert!(guard.try_start().is_some());
    }
}
