//! Supersession primitive for in-flight replay scans.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Notify;

/// Marker that a wider merged request is queued behind an in-flight scan.
///
/// Can be cloned and shared across tasks without locking the scheduler. The
/// scan engine checks it between work units and may yield early; yielding is
/// cooperative and never required mid-unit. Each merge that widens the
/// pending window raises the flag again, so the count doubles as a measure
/// of how much demand accumulated behind the scan.
#[derive(Clone)]
pub struct SupersededFlag {
    widenings: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl SupersededFlag {
    /// Create a flag in the not-superseded state.
    pub fn new() -> Self {
        Self {
            widenings: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Returns `true` once a wider merged request is waiting.
    pub fn is_superseded(&self) -> bool {
        self.times_widened() > 0
    }

    /// How many times the pending window behind this scan has widened.
    pub fn times_widened(&self) -> usize {
        self.widenings.load(Ordering::Acquire)
    }

    /// Record a widening, wake any waiters, and return the new count.
    pub fn raise(&self) -> usize {
        let count = self.widenings.fetch_add(1, Ordering::AcqRel) + 1;
        self.notify.notify_waiters();
        count
    }

    /// Await until the scan is superseded.
    pub async fn superseded(&self) {
        if self.is_superseded() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for SupersededFlag {
    fn default() -> Self {
        Self::new()
    }
}
