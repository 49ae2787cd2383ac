//! Release confirmation registry for zero-copy buffers.
//!
//! When caller-owned memory is handed to the native engine, the engine
//! decides when it is done with it and says so from one of its own I/O
//! threads. The handle that sent the buffer may be long gone by then.
//!
//! The registry bridges the two sides:
//!
//! 1. The sender registers a release action and gets a monotonic id.
//! 2. The id is written into a [`Guard`] cell, whose address travels through
//!    the native engine as the opaque hint pointer.
//! 3. The engine's release notification reads the id back, resolves and
//!    removes the action, runs it, and returns the guard cell.
//!
//! Closing the sending handle never touches the registry. Only the release
//! notification removes an entry, so each action runs exactly once.
//!
//! Guard cells are atomics allocated from the global allocator and recycled
//! through a lock-free queue. They are written on the sending thread and read
//! on the engine thread, so they must never come from thread-local storage.

use crate::config::GUARD_PREALLOCATION;
use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::ffi::c_void;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::trace;

/// Action run once the native engine releases a zero-copy buffer.
///
/// Receives the data pointer the engine hands back. Only `Send` is
/// required; the registry wraps each action in a lock to share it.
pub type ReleaseFn = Box<dyn FnOnce(*mut u8) + Send + 'static>;

static GLOBAL_REGISTRY: Lazy<ReleaseRegistry> = Lazy::new(ReleaseRegistry::new);

static GLOBAL_GUARDS: Lazy<GuardPool> = Lazy::new(|| GuardPool::with_preallocated(GUARD_PREALLOCATION));

/// Concurrent map from callback id to release action.
pub struct ReleaseRegistry {
    // The mutex makes a `Send`-only action `Sync`. It is never locked:
    // entries are unwrapped with `into_inner` once removed.
    actions: DashMap<u64, Mutex<ReleaseFn>>,
    next_id: AtomicU64,
    registered: AtomicU64,
    resolved: AtomicU64,
    discarded: AtomicU64,
}

impl fmt::Debug for ReleaseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseRegistry")
            .field("live", &self.actions.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for ReleaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
            // 0 never names a registration
            next_id: AtomicU64::new(1),
            registered: AtomicU64::new(0),
            resolved: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// The process-wide registry used by zero-copy messages.
    pub fn global() -> &'static Self {
        &GLOBAL_REGISTRY
    }

    /// Register a release action and return its id.
    ///
    /// Ids are monotonic and never reused.
    pub fn register(&self, action: ReleaseFn) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.actions.insert(id, Mutex::new(action));
        self.registered.fetch_add(1, Ordering::Relaxed);
        trace!("[ReleaseRegistry] registered callback {}", id);
        id
    }

    /// Remove and return the action for `id`.
    ///
    /// A second call for the same id returns `None`.
    pub fn resolve_and_remove(&self, id: u64) -> Option<ReleaseFn> {
        let (_, action) = self.actions.remove(&id)?;
        self.resolved.fetch_add(1, Ordering::Relaxed);
        Some(action.into_inner())
    }

    /// Drop the action for `id` without running it.
    ///
    /// Used to roll back a registration whose native init failed.
    pub fn discard(&self, id: u64) -> bool {
        let removed = self.actions.remove(&id).is_some();
        if removed {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!("[ReleaseRegistry] discarded callback {}", id);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.actions.contains_key(&id)
    }

    /// Registrations still waiting for their release.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            registered: self.registered.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub registered: u64,
    pub resolved: u64,
    /// Registrations rolled back without running
    pub discarded: u64,
}

/// A cross-thread cell carrying one callback id.
///
/// The cell's address is the native hint pointer. It lives forever and is
/// recycled through a [`GuardPool`].
#[derive(Debug, Clone, Copy)]
pub struct Guard(&'static AtomicU64);

impl Guard {
    #[inline]
    #[must_use]
    pub fn id(self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Address to pass through the native engine.
    #[inline]
    #[must_use]
    pub fn as_hint(self) -> *mut c_void {
        (self.0 as *const AtomicU64).cast_mut().cast()
    }

    /// Recover a guard from a hint pointer.
    ///
    /// # Safety
    ///
    /// `hint` must come from [`Guard::as_hint`].
    #[inline]
    #[must_use]
    #[allow(unsafe_code)]
    pub unsafe fn from_hint(hint: *mut c_void) -> Option<Self> {
        // SAFETY: guard cells are leaked, so any pointer from `as_hint` stays valid.
        hint.cast::<AtomicU64>().cast_const().as_ref().map(Self)
    }
}

/// Lock-free pool of guard cells.
pub struct GuardPool {
    free: SegQueue<&'static AtomicU64>,
    allocated: AtomicUsize,
}

impl fmt::Debug for GuardPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardPool")
            .field("free", &self.free.len())
            .field("allocated", &self.allocated())
            .finish()
    }
}

impl GuardPool {
    /// Create a pool holding `count` ready cells.
    #[must_use]
    pub fn with_preallocated(count: usize) -> Self {
        let pool = Self {
            free: SegQueue::new(),
            allocated: AtomicUsize::new(0),
        };
        for _ in 0..count {
            pool.free.push(pool.allocate());
        }
        pool
    }

    /// The process-wide pool used by zero-copy messages.
    pub fn global() -> &'static Self {
        &GLOBAL_GUARDS
    }

    fn allocate(&self) -> &'static AtomicU64 {
        self.allocated.fetch_add(1, Ordering::Relaxed);
        Box::leak(Box::new(AtomicU64::new(0)))
    }

    /// Take a cell and store `id` in it.
    pub fn acquire(&self, id: u64) -> Guard {
        let cell = self.free.pop().unwrap_or_else(|| self.allocate());
        cell.store(id, Ordering::Release);
        Guard(cell)
    }

    /// Return a cell for reuse. Safe to call from any thread.
    pub fn release(&self, guard: Guard) {
        guard.0.store(0, Ordering::Release);
        self.free.push(guard.0);
    }

    /// Cells ever allocated by this pool.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Cells ready for reuse.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }
}
