//! Dispatcher configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tuning knobs for a [`crate::Dispatcher`].
///
/// Queues are unbounded; these thresholds only decide when a growing
/// queue is worth a warning in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Warn when the live queue grows past this many messages.
    pub live_warn_len: usize,
    /// Warn when the deferred queue grows past this many messages.
    pub deferred_warn_len: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            live_warn_len: 1024,
            deferred_warn_len: 4096,
        }
    }
}

impl DispatchConfig {
    /// Fixes values that would make the warnings fire constantly.
    ///
    /// Called by [`crate::Dispatcher::with_config`]. A threshold of 0 is
    /// raised to 1.
    pub fn validated(mut self) -> Self {
        if self.live_warn_len == 0 {
            warn!("live_warn_len is 0, raising to 1");
            self.live_warn_len = 1;
        }
        if self.deferred_warn_len == 0 {
            warn!("deferred_warn_len is 0, raising to 1");
            self.deferred_warn_len = 1;
        }
        self
    }
}
