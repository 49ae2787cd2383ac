//! Bucketed native buffer pool
//!
//! Size classes are powers of two from 16B to 4MB (see [`crate::config`]).
//! Each class has one lock-free queue of free entries with a fixed cap.
//!
//! - `rent(size)` picks the smallest class that fits and pops a free entry
//!   (hit) or allocates a fresh one from the arena (miss).
//! - `release(buffer)` pushes the entry back if the class is under its cap.
//!   Otherwise the entry is dropped (overflow). Arena memory is never freed,
//!   so an overflow loses reuse, not memory safety.
//! - Requests above the ceiling get a one-off [`OwnedRegion`] that is never
//!   cached and is freed when the entry is dropped.
//!
//! Pool operations never fail and never block a producer.

use crate::arena::{self, NativeRegion, OwnedRegion};
use crate::config::{BUCKET_CAPS, BUCKET_SIZES, MAX_POOLABLE_SIZE};
use crossbeam_queue::ArrayQueue;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

static GLOBAL_POOL: Lazy<NativeBufferPool> = Lazy::new(NativeBufferPool::new);

/// A region checked out of a [`NativeBufferPool`].
///
/// While checked out the holder has exclusive access to the bytes.
#[derive(Debug)]
pub struct PooledBuffer {
    region: NativeRegion,
    bucket: Option<usize>,
    allocated_at: Instant,
    // Backing allocation for oversize entries, freed with the entry.
    owned: Option<OwnedRegion>,
}

impl PooledBuffer {
    fn pooled(bucket: usize) -> Self {
        Self {
            region: arena::leak(BUCKET_SIZES[bucket]),
            bucket: Some(bucket),
            allocated_at: Instant::now(),
            owned: None,
        }
    }

    fn oversize(size: usize) -> Self {
        let owned = OwnedRegion::new(size);
        Self {
            region: owned.region(),
            bucket: None,
            allocated_at: Instant::now(),
            owned: Some(owned),
        }
    }

    /// Usable bytes. At least the size that was requested.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.region.len()
    }

    /// Size class index, or `None` for oversize entries.
    #[inline]
    #[must_use]
    pub const fn bucket(&self) -> Option<usize> {
        self.bucket
    }

    #[inline]
    #[must_use]
    pub const fn is_oversize(&self) -> bool {
        self.owned.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn allocated_at(&self) -> Instant {
        self.allocated_at
    }

    /// Raw region descriptor, for handing to the native engine.
    #[inline]
    #[must_use]
    pub const fn region(&self) -> NativeRegion {
        self.region
    }

    #[inline]
    #[must_use]
    #[allow(unsafe_code)]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the region is live for the life of `self` and the entry is
        // checked out, so nothing else writes to it.
        unsafe { self.region.as_slice() }
    }

    #[inline]
    #[must_use]
    #[allow(unsafe_code)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` rules out other views.
        unsafe { self.region.as_mut_slice() }
    }
}

/// Per-bucket counters.
#[derive(Debug, Default)]
struct BucketStatistics {
    rents: AtomicU64,
    returns: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    overflows: AtomicU64,
}

impl BucketStatistics {
    fn reset(&self) {
        self.rents.store(0, Ordering::Relaxed);
        self.returns.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.overflows.store(0, Ordering::Relaxed);
    }
}

struct Bucket {
    free: ArrayQueue<PooledBuffer>,
    stats: BucketStatistics,
}

/// Bucketed free-list of reusable native regions.
pub struct NativeBufferPool {
    buckets: Vec<Bucket>,
    oversize_rents: AtomicU64,
}

impl fmt::Debug for NativeBufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBufferPool")
            .field("buckets", &self.buckets.len())
            .field("oversize_rents", &self.oversize_rents.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for NativeBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBufferPool {
    /// Create an independent pool with the standard bucket layout.
    #[must_use]
    pub fn new() -> Self {
        let buckets = BUCKET_CAPS
            .iter()
            .map(|&cap| Bucket {
                free: ArrayQueue::new(cap),
                stats: BucketStatistics::default(),
            })
            .collect();
        Self {
            buckets,
            oversize_rents: AtomicU64::new(0),
        }
    }

    /// The process-wide pool.
    pub fn global() -> &'static Self {
        &GLOBAL_POOL
    }

    /// Smallest size class that fits `size`, or `None` above the ceiling.
    #[must_use]
    pub fn select_bucket(size: usize) -> Option<usize> {
        if size > MAX_POOLABLE_SIZE {
            return None;
        }
        BUCKET_SIZES.iter().position(|&bucket_size| bucket_size >= size)
    }

    /// Rent a region of at least `size` bytes.
    pub fn rent(&self, size: usize) -> PooledBuffer {
        let Some(index) = Self::select_bucket(size) else {
            self.oversize_rents.fetch_add(1, Ordering::Relaxed);
            trace!("[NativeBufferPool] oversize rent of {} bytes", size);
            return PooledBuffer::oversize(size);
        };

        let bucket = &self.buckets[index];
        bucket.stats.rents.fetch_add(1, Ordering::Relaxed);

        if let Some(buffer) = bucket.free.pop() {
            bucket.stats.hits.fetch_add(1, Ordering::Relaxed);
            return buffer;
        }

        bucket.stats.misses.fetch_add(1, Ordering::Relaxed);
        trace!(
            "[NativeBufferPool] miss for {} bytes, allocating {}-byte entry",
            size,
            BUCKET_SIZES[index]
        );
        PooledBuffer::pooled(index)
    }

    /// Return a region to its bucket.
    ///
    /// Oversize entries are freed. Entries beyond the bucket cap are dropped.
    pub fn release(&self, buffer: PooledBuffer) {
        let Some(index) = buffer.bucket else {
            return;
        };
        let Some(bucket) = self.buckets.get(index) else {
            return;
        };
        bucket.stats.returns.fetch_add(1, Ordering::Relaxed);

        if bucket.free.push(buffer).is_err() {
            bucket.stats.overflows.fetch_add(1, Ordering::Relaxed);
            trace!(
                "[NativeBufferPool] bucket {} full, discarding entry",
                BUCKET_SIZES[index]
            );
        }
    }

    /// Pre-populate the bucket serving `size` with up to `count` entries.
    ///
    /// Never fills past the bucket cap. Returns the number of entries added.
    pub fn prewarm(&self, size: usize, count: usize) -> usize {
        let Some(index) = Self::select_bucket(size) else {
            return 0;
        };
        let bucket = &self.buckets[index];
        let room = bucket.free.capacity().saturating_sub(bucket.free.len());
        let mut added = 0;
        for _ in 0..count.min(room) {
            if bucket.free.push(PooledBuffer::pooled(index)).is_err() {
                break;
            }
            added += 1;
        }
        debug!(
            "[NativeBufferPool] prewarmed {} entries of {} bytes",
            added, BUCKET_SIZES[index]
        );
        added
    }

    /// Drop every pooled entry and reset the counters.
    ///
    /// Entries already checked out are unaffected and may still be released.
    pub fn clear(&self) {
        for bucket in &self.buckets {
            while bucket.free.pop().is_some() {}
            bucket.stats.reset();
        }
        self.oversize_rents.store(0, Ordering::Relaxed);
    }

    /// Free entries currently held for `size`'s bucket.
    #[must_use]
    pub fn pooled_count(&self, size: usize) -> usize {
        Self::select_bucket(size).map_or(0, |index| self.buckets[index].free.len())
    }

    /// Snapshot of all counters.
    #[must_use]
    pub fn statistics(&self) -> PoolStatistics {
        let buckets: Vec<BucketInfo> = self
            .buckets
            .iter()
            .enumerate()
            .map(|(index, bucket)| {
                let rents = bucket.stats.rents.load(Ordering::Relaxed);
                let returns = bucket.stats.returns.load(Ordering::Relaxed);
                let hits = bucket.stats.hits.load(Ordering::Relaxed);
                let misses = bucket.stats.misses.load(Ordering::Relaxed);
                BucketInfo {
                    bucket_size: BUCKET_SIZES[index],
                    pooled: bucket.free.len(),
                    rents,
                    returns,
                    hits,
                    misses,
                    overflows: bucket.stats.overflows.load(Ordering::Relaxed),
                    outstanding: rents.saturating_sub(returns),
                    hit_rate: hit_rate(hits, misses),
                }
            })
            .collect();

        let mut totals = PoolStatistics {
            rents: 0,
            returns: 0,
            hits: 0,
            misses: 0,
            overflows: 0,
            outstanding: 0,
            oversize_rents: self.oversize_rents.load(Ordering::Relaxed),
            hit_rate: 0.0,
            buckets: Vec::new(),
        };
        for info in &buckets {
            totals.rents += info.rents;
            totals.returns += info.returns;
            totals.hits += info.hits;
            totals.misses += info.misses;
            totals.overflows += info.overflows;
        }
        totals.outstanding = totals.rents.saturating_sub(totals.returns);
        totals.hit_rate = hit_rate(totals.hits, totals.misses);
        totals.buckets = buckets;
        totals
    }
}

#[allow(clippy::cast_precision_loss)]
fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Immutable snapshot of one size class.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketInfo {
    pub bucket_size: usize,
    /// Free entries held right now
    pub pooled: usize,
    pub rents: u64,
    pub returns: u64,
    pub hits: u64,
    pub misses: u64,
    pub overflows: u64,
    /// Rents not yet returned
    pub outstanding: u64,
    /// `hits / (hits + misses)`, 0 when nothing was rented
    pub hit_rate: f64,
}

impl fmt::Display for BucketInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bucket[size={}, pooled={}, rents={}, returns={}, hits={}, misses={}, \
             overflows={}, outstanding={}, hitRate={:.2}%]",
            self.bucket_size,
            self.pooled,
            self.rents,
            self.returns,
            self.hits,
            self.misses,
            self.overflows,
            self.outstanding,
            self.hit_rate * 100.0
        )
    }
}

/// Immutable snapshot of a whole pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStatistics {
    pub rents: u64,
    pub returns: u64,
    pub hits: u64,
    pub misses: u64,
    pub overflows: u64,
    pub outstanding: u64,
    /// Requests above the ceiling, served without pooling
    pub oversize_rents: u64,
    pub hit_rate: f64,
    pub buckets: Vec<BucketInfo>,
}

impl PoolStatistics {
    /// Snapshot of the bucket serving `size`.
    #[must_use]
    pub fn bucket_for(&self, size: usize) -> Option<&BucketInfo> {
        NativeBufferPool::select_bucket(size).and_then(|index| self.buckets.get(index))
    }
}

impl fmt::Display for PoolStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PoolStatistics[rents={}, returns={}, hits={}, misses={}, overflows={}, \
             outstanding={}, oversize={}, hitRate={:.2}%]",
            self.rents,
            self.returns,
            self.hits,
            self.misses,
            self.overflows,
            self.outstanding,
            self.oversize_rents,
            self.hit_rate * 100.0
        )
    }
}
