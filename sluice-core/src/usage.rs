//! Adaptive buffer sizing policy.
//!
//! Pure bookkeeping: the buffer owner reports each operation's size and gets
//! back an occasional shrink target. Growth is the owner's business and
//! happens immediately when a payload does not fit.

use crate::config::IoBufferConfig;
use tracing::debug;

/// Rolling usage window over the last `sample_window` operations.
#[derive(Debug, Clone)]
pub struct UsageWindow {
    config: IoBufferConfig,
    operations: usize,
    total_bytes: usize,
}

impl UsageWindow {
    #[must_use]
    pub const fn new(config: IoBufferConfig) -> Self {
        Self {
            config,
            operations: 0,
            total_bytes: 0,
        }
    }

    /// Record one operation of `used` bytes against a buffer of `capacity`.
    ///
    /// Returns the new capacity when the window closes and the buffer is
    /// oversized: capacity is at least `shrink_factor` times the average
    /// and the average is at least `min_shrink_average`.
    pub fn record(&mut self, used: usize, capacity: usize) -> Option<usize> {
        self.operations += 1;
        self.total_bytes = self.total_bytes.saturating_add(used);

        if self.operations < self.config.sample_window.max(1) {
            return None;
        }

        let average = self.total_bytes / self.operations;
        self.operations = 0;
        self.total_bytes = 0;

        if average < self.config.min_shrink_average {
            return None;
        }
        if capacity < average.saturating_mul(self.config.shrink_factor) {
            return None;
        }

        let target = average
            .saturating_mul(2)
            .saturating_add(self.config.shrink_margin);
        if target >= capacity {
            return None;
        }
        debug!(
            "[UsageWindow] shrinking {} -> {} (average {})",
            capacity, target, average
        );
        Some(target)
    }

    /// Operations recorded in the current window.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.operations
    }

    #[must_use]
    pub const fn config(&self) -> &IoBufferConfig {
        &self.config
    }
}

impl Default for UsageWindow {
    fn default() -> Self {
        Self::new(IoBufferConfig::default())
    }
}
