//! Time sources for deferred delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Logical time in seconds, as seen by a dispatcher.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// A clock that only moves when told to. Used by tests and tools.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    /// Moves the clock forward by `delta` and returns the new time.
    pub fn advance(&self, delta: f64) -> f64 {
        let now = self.now() + delta;
        self.set(now);
        now
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Monotonic wall time since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}
