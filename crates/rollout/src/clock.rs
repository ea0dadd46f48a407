//! Suspension points for every wait in a run.

use std::thread;
use std::time::Duration;

/// Source of blocking waits.
///
/// Drain settle time, rejoin polling and the post-reboot buffer all go
/// through this trait so tests can run against a virtual clock.
pub trait Clock: Send + Sync {
    /// Suspend the run for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Clock that blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}
