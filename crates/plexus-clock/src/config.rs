//! Clock pump configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClockPolicy {
    /// Forget the missed ticks and schedule the next one from now.
    /// Logical time falls behind wall time by the missed amount.
    #[default]
    Skip,
    /// Fire up to `max_catchup` missed ticks back to back, then skip the
    /// rest.
    CatchUp {
        /// Cap on back-to-back ticks. Without one a slow dispatcher falls
        /// further behind with every burst.
        max_catchup: u32,
    },
    /// Keep the original cadence. The late tick is not made up.
    Drop,
}

/// Full configuration for a [`crate::ClockPump`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Ticks per second. 0 = event-driven: time only moves through
    /// [`crate::ClockPump::advance_manually`].
    pub tick_rate_hz: u32,
    pub policy: ClockPolicy,
    /// Logical time of the clock before the first tick.
    pub start_seconds: f64,
    /// Warn when pumping one tick takes more than this fraction of the
    /// tick budget (0.0–1.0).
    pub budget_warn_threshold: f64,
    /// Track average and maximum pump time.
    pub metrics_enabled: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 0,
            policy: ClockPolicy::default(),
            start_seconds: 0.0,
            budget_warn_threshold: 0.80,
            metrics_enabled: true,
        }
    }
}

impl ClockConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`crate::ClockPump::new`].
    ///
    /// - `tick_rate_hz` is capped at [`Self::MAX_TICK_RATE_HZ`].
    /// - `budget_warn_threshold` is clamped to `0.0..=1.0`.
    /// - A negative or non-finite `start_seconds` becomes 0.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        if !self.start_seconds.is_finite() || self.start_seconds < 0.0 {
            warn!(start = self.start_seconds, "invalid start_seconds, using 0");
            self.start_seconds = 0.0;
        }
        self
    }

    /// Length of one tick, or `None` when event-driven.
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.tick_rate_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64))
        }
    }
}
