//! Native memory regions for Sluice
//!
//! This module and the message binding are the only places where raw memory
//! is touched. Everything built on top of [`NativeRegion`] stays safe.
//!
//! Two allocation disciplines exist:
//! - **Arena**: fixed-size regions that are allocated once and never freed.
//!   They back pooled buffers, which may be referenced by the native engine
//!   long after the pool itself forgot about them.
//! - **Owned**: one-off regions for requests above the pooling ceiling,
//!   freed when their [`OwnedRegion`] is dropped.

#![allow(unsafe_code)]

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Alignment of every region handed out by this module.
pub const REGION_ALIGN: usize = 16;

/// Bytes ever leaked into the arena.
static ARENA_BYTES: AtomicUsize = AtomicUsize::new(0);

/// A contiguous native memory region: base pointer plus length.
///
/// This is a plain descriptor. It does not own the memory it points at and
/// copying it does not copy the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: a region is an address range. Exclusive access is enforced by
// whoever owns the backing allocation, not by the descriptor.
unsafe impl Send for NativeRegion {}
unsafe impl Sync for NativeRegion {}

impl NativeRegion {
    /// Build a region from a raw pointer and length.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for as long as
    /// the region (or any copy of it) is used.
    #[inline]
    pub const unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Describe a `'static` mutable buffer.
    ///
    /// The usual source is `Box::leak(vec.into_boxed_slice())`.
    #[inline]
    pub fn from_static(buf: &'static mut [u8]) -> Self {
        let len = buf.len();
        Self {
            ptr: NonNull::from(buf).cast(),
            len,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_ptr(self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// View the region as a byte slice.
    ///
    /// # Safety
    ///
    /// The backing memory must be live and not mutated for `'a`.
    #[inline]
    #[must_use]
    pub unsafe fn as_slice<'a>(self) -> &'a [u8] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.len)
    }

    /// View the region as a mutable byte slice.
    ///
    /// # Safety
    ///
    /// The backing memory must be live and not aliased for `'a`.
    #[inline]
    #[must_use]
    pub unsafe fn as_mut_slice<'a>(self) -> &'a mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }
}

#[inline]
fn layout_for(len: usize) -> Layout {
    match Layout::from_size_align(len.max(1), REGION_ALIGN) {
        Ok(layout) => layout,
        // Only reachable for lengths near isize::MAX, which no allocator serves.
        Err(_) => handle_alloc_error(Layout::new::<u8>()),
    }
}

#[inline]
fn allocate(layout: Layout) -> NonNull<u8> {
    // SAFETY: layout has a non-zero size.
    let raw = unsafe { alloc_zeroed(layout) };
    NonNull::new(raw).unwrap_or_else(|| handle_alloc_error(layout))
}

/// Allocate a zeroed region that lives for the rest of the process.
#[must_use]
pub fn leak(len: usize) -> NativeRegion {
    let ptr = allocate(layout_for(len));
    ARENA_BYTES.fetch_add(len, Ordering::Relaxed);
    NativeRegion { ptr, len }
}

/// Total bytes allocated through [`leak`].
#[must_use]
pub fn arena_bytes() -> usize {
    ARENA_BYTES.load(Ordering::Relaxed)
}

/// A one-off native region freed on drop.
#[derive(Debug)]
pub struct OwnedRegion {
    region: NativeRegion,
}

impl OwnedRegion {
    /// Allocate a zeroed region of `len` bytes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let ptr = allocate(layout_for(len));
        Self {
            region: NativeRegion { ptr, len },
        }
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> NativeRegion {
        self.region
    }
}

impl Drop for OwnedRegion {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout and never freed elsewhere.
        unsafe { dealloc(self.region.as_ptr(), layout_for(self.region.len)) }
    }
}
