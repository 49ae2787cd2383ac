//! Reusable poll set.
//!
//! Keeps a `zmq_pollitem_t` array alive between calls so polling does not
//! allocate. Registration writes straight into the array; a full array
//! doubles its capacity, copying existing entries. `poll` is a single
//! native call over the live prefix and never reallocates.
//!
//! `unregister` shifts later entries down, so every index above the removed
//! one moves down by one. Callers that keep indices must account for this.
//!
//! A poll set is confined to one thread (`!Send`, `!Sync`).

#![allow(unsafe_code)]

use crate::ffi;
use crate::socket::Socket;
use sluice_core::config::PollSetConfig;
use sluice_core::error::SluiceError;
use sluice_core::flags::PollEvents;
use sluice_core::Result;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::os::raw::{c_int, c_long, c_short};
use tracing::trace;

#[cfg(unix)]
type NativeFd = std::os::unix::io::RawFd;
#[cfg(windows)]
type NativeFd = std::os::windows::io::RawSocket;

/// Layout-compatible with `zmq_pollitem_t`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct PollItem {
    socket: *mut c_void,
    fd: NativeFd,
    events: c_short,
    revents: c_short,
}

/// Reusable native poll-item array.
#[derive(Debug)]
pub struct PollSet<'a> {
    items: Vec<PollItem>,
    _sockets: PhantomData<&'a Socket>,
}

impl Default for PollSet<'_> {
    fn default() -> Self {
        Self::new(PollSetConfig::default())
    }
}

impl<'a> PollSet<'a> {
    #[must_use]
    pub fn new(config: PollSetConfig) -> Self {
        Self {
            items: Vec::with_capacity(config.initial_capacity.max(1)),
            _sockets: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Slots available before the next growth.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    fn push(&mut self, item: PollItem) -> usize {
        if self.items.len() == self.items.capacity() {
            let old = self.items.capacity();
            self.items.reserve_exact(old.max(1));
            trace!("[PollSet] grew {} -> {}", old, self.items.capacity());
        }
        self.items.push(item);
        self.items.len() - 1
    }

    /// Watch `socket` for `events`. Returns the entry index.
    pub fn register(&mut self, socket: &'a Socket, events: PollEvents) -> usize {
        self.push(PollItem {
            socket: socket.raw().as_ptr(),
            fd: 0 as NativeFd,
            events: events.bits(),
            revents: 0,
        })
    }

    /// Watch a raw OS descriptor for `events`. Returns the entry index.
    #[cfg(unix)]
    pub fn register_fd(&mut self, fd: std::os::unix::io::RawFd, events: PollEvents) -> usize {
        self.push(PollItem {
            socket: std::ptr::null_mut(),
            fd,
            events: events.bits(),
            revents: 0,
        })
    }

    fn item(&self, index: usize) -> Result<&PollItem> {
        self.items.get(index).ok_or(SluiceError::IndexOutOfBounds {
            index,
            len: self.items.len(),
        })
    }

    /// Replace the interest mask of entry `index` in place.
    pub fn modify(&mut self, index: usize, events: PollEvents) -> Result<()> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(SluiceError::IndexOutOfBounds { index, len })?;
        item.events = events.bits();
        Ok(())
    }

    /// Remove entry `index`, shifting later entries down by one.
    pub fn unregister(&mut self, index: usize) -> Result<()> {
        self.item(index)?;
        self.items.remove(index);
        Ok(())
    }

    /// Wait up to `timeout_ms` for any entry to become ready.
    ///
    /// `0` returns immediately, a negative timeout waits forever. Returns
    /// the number of ready entries (0 on timeout). An empty set returns 0
    /// without calling into libzmq.
    pub fn poll(&mut self, timeout_ms: i64) -> Result<usize> {
        if self.items.is_empty() {
            return Ok(0);
        }
        for item in &mut self.items {
            item.revents = 0;
        }
        let timeout = timeout_ms.clamp(c_long::MIN as i64, c_long::MAX as i64) as c_long;
        // SAFETY: `PollItem` is layout-compatible with `zmq_pollitem_t`, the
        // array holds `len` initialized entries, and every socket pointer is
        // borrowed for `'a`.
        let rc = unsafe {
            zmq_sys::zmq_poll(
                self.items.as_mut_ptr().cast::<zmq_sys::zmq_pollitem_t>(),
                self.items.len() as c_int,
                timeout,
            )
        };
        if rc == -1 {
            return Err(ffi::last_error());
        }
        Ok(rc as usize)
    }

    /// Events reported for entry `index` by the last poll.
    pub fn returned_events(&self, index: usize) -> Result<PollEvents> {
        self.item(index).map(|item| PollEvents::from_bits(item.revents))
    }

    /// Interest mask of entry `index`.
    pub fn interest(&self, index: usize) -> Result<PollEvents> {
        self.item(index).map(|item| PollEvents::from_bits(item.events))
    }

    pub fn is_readable(&self, index: usize) -> Result<bool> {
        self.returned_events(index).map(|ev| ev.contains(PollEvents::IN))
    }

    pub fn is_writable(&self, index: usize) -> Result<bool> {
        self.returned_events(index).map(|ev| ev.contains(PollEvents::OUT))
    }

    pub fn has_error(&self, index: usize) -> Result<bool> {
        self.returned_events(index).map(|ev| ev.contains(PollEvents::ERR))
    }

    /// Remove every entry, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
