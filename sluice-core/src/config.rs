//! Sizing tables and tunables
//!
//! Pool bucket layout and the knobs for adaptive I/O buffers, object pools
//! and poll sets. Tuning these trades retained memory for allocation rate.

/// Size classes of the native buffer pool: powers of two from 16B to 4MB.
pub const BUCKET_SIZES: [usize; 19] = [
    16,
    32,
    64,
    128,
    256,
    512,
    1024,
    2048,
    4096,
    8192,
    16 * 1024,
    32 * 1024,
    64 * 1024,
    128 * 1024,
    256 * 1024,
    512 * 1024,
    1024 * 1024,
    2 * 1024 * 1024,
    4 * 1024 * 1024,
];

/// Maximum number of free entries retained per bucket.
///
/// Small classes keep many entries, large ones few, which bounds the
/// worst-case memory held by expensive buffers.
pub const BUCKET_CAPS: [usize; 19] = [
    1000, 1000, 1000, 1000, 1000, 1000, // 16B - 512B
    500, 500, 500, // 1KB - 4KB
    250, 250, 250, 250, // 8KB - 64KB
    100, 100, 100, // 128KB - 512KB
    50, 50, 50, // 1MB - 4MB
];

/// Largest request served from a bucket. Anything above is a one-off allocation.
pub const MAX_POOLABLE_SIZE: usize = BUCKET_SIZES[BUCKET_SIZES.len() - 1];

/// Number of guard cells allocated when the guard pool is first touched
pub const GUARD_PREALLOCATION: usize = 1000;

/// Default I/O buffer capacity (8KB)
pub const DEFAULT_IO_BUFFER_CAPACITY: usize = 8192;

/// Operations per usage sample
pub const DEFAULT_SAMPLE_WINDOW: usize = 100;

/// Shrink when capacity is at least this multiple of the average use
pub const DEFAULT_SHRINK_FACTOR: usize = 4;

/// Never shrink while the average use is below this (1KB)
pub const DEFAULT_MIN_SHRINK_AVERAGE: usize = 1024;

/// Bytes added on top of `2 * average` when shrinking
pub const DEFAULT_SHRINK_MARGIN: usize = 1024;

/// Default number of wrappers an object pool retains
pub const DEFAULT_MAX_RETAINED: usize = 256;

/// Default poll-set slot count
pub const DEFAULT_POLL_CAPACITY: usize = 16;

/// Adaptive I/O buffer configuration
///
/// Controls the per-socket scratch regions used for copying send/receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoBufferConfig {
    /// Capacity each buffer starts with
    pub initial_capacity: usize,
    /// Number of operations averaged before a shrink decision
    pub sample_window: usize,
    /// Capacity-to-average ratio that triggers a shrink
    pub shrink_factor: usize,
    /// Average use below which the buffer never shrinks
    pub min_shrink_average: usize,
    /// Slack added to `2 * average` on shrink
    pub shrink_margin: usize,
}

impl Default for IoBufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_IO_BUFFER_CAPACITY,
            sample_window: DEFAULT_SAMPLE_WINDOW,
            shrink_factor: DEFAULT_SHRINK_FACTOR,
            min_shrink_average: DEFAULT_MIN_SHRINK_AVERAGE,
            shrink_margin: DEFAULT_SHRINK_MARGIN,
        }
    }
}

impl IoBufferConfig {
    /// Small starting buffers (1KB) for chatty request/reply traffic.
    #[must_use]
    pub const fn small() -> Self {
        Self {
            initial_capacity: 1024,
            sample_window: DEFAULT_SAMPLE_WINDOW,
            shrink_factor: DEFAULT_SHRINK_FACTOR,
            min_shrink_average: DEFAULT_MIN_SHRINK_AVERAGE,
            shrink_margin: DEFAULT_SHRINK_MARGIN,
        }
    }

    /// Large starting buffers (64KB) for bulk transfer.
    #[must_use]
    pub const fn large() -> Self {
        Self {
            initial_capacity: 64 * 1024,
            sample_window: DEFAULT_SAMPLE_WINDOW,
            shrink_factor: DEFAULT_SHRINK_FACTOR,
            min_shrink_average: DEFAULT_MIN_SHRINK_AVERAGE,
            shrink_margin: DEFAULT_SHRINK_MARGIN,
        }
    }

    #[must_use]
    pub const fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the sample window. Zero is treated as one.
    #[must_use]
    pub const fn with_sample_window(mut self, window: usize) -> Self {
        self.sample_window = if window == 0 { 1 } else { window };
        self
    }

    #[must_use]
    pub const fn with_shrink_factor(mut self, factor: usize) -> Self {
        self.shrink_factor = factor;
        self
    }

    #[must_use]
    pub const fn with_min_shrink_average(mut self, bytes: usize) -> Self {
        self.min_shrink_average = bytes;
        self
    }

    #[must_use]
    pub const fn with_shrink_margin(mut self, bytes: usize) -> Self {
        self.shrink_margin = bytes;
        self
    }
}

/// Object pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectPoolConfig {
    /// Wrappers kept for reuse; releases beyond this are disposed
    pub max_retained: usize,
}

impl Default for ObjectPoolConfig {
    fn default() -> Self {
        Self {
            max_retained: DEFAULT_MAX_RETAINED,
        }
    }
}

impl ObjectPoolConfig {
    /// Retain at most `max` wrappers. Zero is treated as one.
    #[must_use]
    pub const fn with_max_retained(mut self, max: usize) -> Self {
        self.max_retained = if max == 0 { 1 } else { max };
        self
    }
}

/// Poll set configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSetConfig {
    /// Slots allocated up front
    pub initial_capacity: usize,
}

impl Default for PollSetConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_POLL_CAPACITY,
        }
    }
}

impl PollSetConfig {
    /// Zero is treated as one.
    #[must_use]
    pub const fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }
}
