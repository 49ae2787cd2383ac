//! Object-level recycling.
//!
//! Distinct from [`crate::pool`], which recycles buffer memory: this pool
//! keeps whole wrapper objects alive so hot polling loops skip
//! construction and native init.

use crate::config::ObjectPoolConfig;
use crate::error::Result;
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// An object that can be reset in place for reuse.
pub trait Recycle: Sized + Send {
    /// Build a fresh object.
    fn create() -> Result<Self>;

    /// Return the object to an empty, reusable state.
    ///
    /// An error means the object may be corrupt; the pool disposes of it.
    fn reset(&mut self) -> Result<()>;
}

/// Bounded, thread-safe pool of reusable objects.
#[derive(Debug)]
pub struct ObjectPool<T: Recycle> {
    free: ArrayQueue<T>,
    stats: ObjectPoolCounters,
}

#[derive(Debug, Default)]
struct ObjectPoolCounters {
    created: AtomicU64,
    reused: AtomicU64,
    recycled: AtomicU64,
    disposed: AtomicU64,
    reset_failures: AtomicU64,
}

/// Object pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectPoolStats {
    /// Objects built because the pool was empty
    pub created: u64,
    /// Rents served from the pool
    pub reused: u64,
    /// Releases that went back into the pool
    pub recycled: u64,
    /// Releases dropped (reset failure or pool full)
    pub disposed: u64,
    pub reset_failures: u64,
}

impl<T: Recycle> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new(ObjectPoolConfig::default())
    }
}

impl<T: Recycle> ObjectPool<T> {
    #[must_use]
    pub fn new(config: ObjectPoolConfig) -> Self {
        Self {
            free: ArrayQueue::new(config.max_retained.max(1)),
            stats: ObjectPoolCounters::default(),
        }
    }

    /// Take an object from the pool, or build one.
    pub fn rent(&self) -> Result<T> {
        if let Some(object) = self.free.pop() {
            self.stats.reused.fetch_add(1, Ordering::Relaxed);
            return Ok(object);
        }
        let object = T::create()?;
        self.stats.created.fetch_add(1, Ordering::Relaxed);
        Ok(object)
    }

    /// Reset `object` and keep it for the next rent.
    ///
    /// Objects that fail to reset, or arrive while the pool is full, are
    /// dropped instead.
    pub fn release(&self, mut object: T) {
        if let Err(e) = object.reset() {
            self.stats.reset_failures.fetch_add(1, Ordering::Relaxed);
            self.stats.disposed.fetch_add(1, Ordering::Relaxed);
            debug!("[ObjectPool] reset failed, disposing: {}", e);
            return;
        }
        match self.free.push(object) {
            Ok(()) => {
                self.stats.recycled.fetch_add(1, Ordering::Relaxed);
            }
            Err(_dropped) => {
                self.stats.disposed.fetch_add(1, Ordering::Relaxed);
                trace!("[ObjectPool] pool full, disposing");
            }
        }
    }

    /// Objects currently held for reuse.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn max_retained(&self) -> usize {
        self.free.capacity()
    }

    /// Drop every retained object.
    pub fn clear(&self) {
        while self.free.pop().is_some() {}
    }

    #[must_use]
    pub fn stats(&self) -> ObjectPoolStats {
        ObjectPoolStats {
            created: self.stats.created.load(Ordering::Relaxed),
            reused: self.stats.reused.load(Ordering::Relaxed),
            recycled: self.stats.recycled.load(Ordering::Relaxed),
            disposed: self.stats.disposed.load(Ordering::Relaxed),
            reset_failures: self.stats.reset_failures.load(Ordering::Relaxed),
        }
    }
}
