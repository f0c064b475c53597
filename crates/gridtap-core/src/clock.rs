//! Blocking waits, injectable for tests.

use std::time::Duration;

/// Source of the fixed settle delays and polling intervals.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
