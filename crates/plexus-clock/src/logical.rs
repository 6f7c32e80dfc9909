//! The logical clock a pump drives.

use std::sync::atomic::{AtomicU64, Ordering};

use plexus_dispatch::Clock;

/// Logical seconds plus a tick counter, shared between a [`crate::ClockPump`]
/// and the dispatchers that read it.
///
/// Only the pump moves it. Everything else reads.
#[derive(Debug)]
pub struct LogicalClock {
    seconds: AtomicU64,
    ticks: AtomicU64,
}

impl LogicalClock {
    pub fn new(start_seconds: f64) -> Self {
        Self {
            seconds: AtomicU64::new(start_seconds.to_bits()),
            ticks: AtomicU64::new(0),
        }
    }

    /// Number of advances so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Moves time forward by `delta` seconds and returns the new time.
    pub(crate) fn advance(&self, delta: f64) -> f64 {
        let now = self.now() + delta;
        self.seconds.store(now.to_bits(), Ordering::Release);
        self.ticks.fetch_add(1, Ordering::AcqRel);
        now
    }
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Clock for LogicalClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_moves_time_and_counts() {
        let clock = LogicalClock::new(10.0);
        assert_eq!(clock.advance(0.5), 10.5);
        assert_eq!(clock.advance(0.5), 11.0);
        assert_eq!(clock.now(), 11.0);
        assert_eq!(clock.ticks(), 2);
    }
}
