//! Native message handle.
//!
//! [`MessageHandle`] owns exactly one libzmq message record (`zmq_msg_t`)
//! and remembers how its content is owned:
//!
//! - **Owned**: content allocated by libzmq, freed when the record closes
//! - **Borrowed**: caller memory handed over zero-copy; a registered release
//!   action runs once libzmq lets go of it
//! - **PooledBuffer**: a [`NativeBufferPool`] region whose release action
//!   puts it back into the pool
//!
//! # Zero-copy release
//!
//! libzmq calls the release function from whichever thread drops the last
//! reference to the content, usually one of its I/O threads. The release
//! action is therefore registered in the global [`ReleaseRegistry`] under a
//! monotonic id, and the id travels through libzmq inside a [`Guard`] cell.
//! [`release_trampoline`] resolves the id, runs the action and recycles the
//! guard.
//!
//! Closing the handle never removes the registration. The engine may still
//! be holding the content, and only its release notification may resolve it.

#![allow(unsafe_code)]

use crate::ffi::{self, RawSocket};
use bytes::Bytes;
use sluice_core::arena::NativeRegion;
use sluice_core::error::SluiceError;
use sluice_core::flags::{MessageProperty, RecvFlags, SendFlags};
use sluice_core::outcome::Outcome;
use sluice_core::pool::NativeBufferPool;
use sluice_core::recycle::Recycle;
use sluice_core::registry::{Guard, GuardPool, ReleaseFn, ReleaseRegistry};
use sluice_core::Result;
use std::cell::Cell;
use std::ffi::{c_void, CStr, CString};
use std::fmt;
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::NonNull;
use tracing::{debug, error, trace, warn};

/// How a handle's content is owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// libzmq owns the content and frees it on close
    Owned,

    /// Caller memory, released through the registered callback
    Borrowed {
        callback_id: u64,
        /// Whether the content may be written through `data_mut`
        writable: bool,
    },

    /// Pool region, returned to the pool through the registered callback
    PooledBuffer {
        callback_id: u64,
        bucket: Option<usize>,
    },
}

impl Ownership {
    /// Release registration backing this content, if any.
    #[must_use]
    pub const fn callback_id(self) -> Option<u64> {
        match self {
            Self::Owned => None,
            Self::Borrowed { callback_id, .. } | Self::PooledBuffer { callback_id, .. } => {
                Some(callback_id)
            }
        }
    }
}

/// One libzmq message record.
///
/// `Send` but not `Sync`: a handle may move between threads but must not be
/// used from two at once.
pub struct MessageHandle {
    msg: zmq_sys::zmq_msg_t,
    ownership: Ownership,
    initialized: bool,
    closed: bool,
    _not_sync: PhantomData<Cell<()>>,
}

// SAFETY: the record is only reachable through `&mut self` or `&self`
// methods of this handle. The content it references is either libzmq-owned
// (refcounted atomically by libzmq) or kept alive by a registered action
// that is itself `Send`.
unsafe impl Send for MessageHandle {}

impl fmt::Debug for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("MessageHandle");
        dbg.field("ownership", &self.ownership)
            .field("initialized", &self.initialized)
            .field("closed", &self.closed);
        if let Ok(size) = self.size() {
            dbg.field("size", &size);
        }
        dbg.finish()
    }
}

/// Release notification called by libzmq.
///
/// `hint` is the guard cell written at construction, `data` the content
/// pointer. Never unwinds into libzmq.
unsafe extern "C" fn release_trampoline(data: *mut c_void, hint: *mut c_void) {
    let Some(guard) = Guard::from_hint(hint) else {
        error!("[MessageHandle] release notification without a guard cell");
        return;
    };
    let id = guard.id();

    match ReleaseRegistry::global().resolve_and_remove(id) {
        Some(action) => {
            let data = data.cast::<u8>();
            if catch_unwind(AssertUnwindSafe(move || action(data))).is_err() {
                error!("[MessageHandle] release action {} panicked", id);
            } else {
                trace!("[MessageHandle] released callback {}", id);
            }
        }
        None => {
            warn!("[MessageHandle] no release action registered for callback {}", id);
        }
    }

    GuardPool::global().release(guard);
}

/// What happens to a release action when its message never initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rollback {
    /// Drop the action unrun; the caller still owns the memory
    Discard,
    /// Run the action now, e.g. to hand a pool region back
    Release,
}

/// Undo a registration whose native init failed.
fn roll_back(callback_id: u64, guard: Guard, rollback: Rollback) {
    let registry = ReleaseRegistry::global();
    match rollback {
        Rollback::Discard => {
            registry.discard(callback_id);
        }
        Rollback::Release => {
            if let Some(action) = registry.resolve_and_remove(callback_id) {
                action(std::ptr::null_mut());
            }
        }
    }
    GuardPool::global().release(guard);
}

impl MessageHandle {
    fn blank() -> Self {
        Self {
            // SAFETY: zmq_msg_t is a plain C struct; all-zero is a valid
            // pre-init state and every constructor initializes it before use.
            msg: unsafe { std::mem::zeroed() },
            ownership: Ownership::Owned,
            initialized: false,
            closed: false,
            _not_sync: PhantomData,
        }
    }

    #[inline]
    fn msg_ptr(&self) -> *mut zmq_sys::zmq_msg_t {
        std::ptr::addr_of!(self.msg).cast_mut()
    }

    #[inline]
    fn msg_mut_ptr(&mut self) -> *mut zmq_sys::zmq_msg_t {
        std::ptr::addr_of_mut!(self.msg)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(SluiceError::InvalidState("message is closed"))
        } else if !self.initialized {
            Err(SluiceError::InvalidState("message is not initialized"))
        } else {
            Ok(())
        }
    }

    /// Create an empty message.
    pub fn new() -> Result<Self> {
        let mut handle = Self::blank();
        // SAFETY: `msg` is owned by `handle` and not yet initialized.
        ffi::check(unsafe { zmq_sys::zmq_msg_init(handle.msg_mut_ptr()) })?;
        handle.initialized = true;
        Ok(handle)
    }

    /// Create a message with `size` bytes of libzmq-owned content.
    pub fn with_size(size: usize) -> Result<Self> {
        let mut handle = Self::blank();
        // SAFETY: as in `new`.
        ffi::check(unsafe { zmq_sys::zmq_msg_init_size(handle.msg_mut_ptr(), size) })?;
        handle.initialized = true;
        Ok(handle)
    }

    /// Create a message holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut handle = Self::with_size(bytes.len())?;
        handle.data_mut()?.copy_from_slice(bytes);
        Ok(handle)
    }

    /// Create a zero-copy message over caller memory.
    ///
    /// The first `size` bytes of `region` become the content. `release` runs
    /// exactly once, on whichever thread libzmq drops the content from.
    /// Until then the caller must keep `region` alive and unmodified.
    ///
    /// # Errors
    ///
    /// - `Size` if `size` exceeds the region
    /// - `NativeInit` if libzmq rejects the record; the registration is
    ///   rolled back and `release` is dropped without running
    pub fn borrowed(region: NativeRegion, size: usize, release: ReleaseFn) -> Result<Self> {
        if size > region.len() {
            return Err(SluiceError::Size {
                requested: size,
                available: region.len(),
            });
        }
        Self::init_zero_copy(region, size, release, Rollback::Discard, |callback_id| {
            Ownership::Borrowed {
                callback_id,
                writable: true,
            }
        })
    }

    /// Create a zero-copy message over any byte owner (`Vec<u8>`, `Bytes`, ...).
    ///
    /// The owner is dropped by the release action. Content is read-only.
    pub fn from_owner<T>(owner: T) -> Result<Self>
    where
        T: AsRef<[u8]> + Send + 'static,
    {
        let owner = Box::new(owner);
        let content = (*owner).as_ref();
        let len = content.len();
        let ptr = NonNull::new(content.as_ptr().cast_mut())
            .ok_or(SluiceError::InvalidState("owner returned a null pointer"))?;
        // SAFETY: the boxed owner keeps `ptr..ptr+len` alive and in place
        // until the release action drops it. The content is never written
        // because the handle is marked read-only.
        let region = unsafe { NativeRegion::from_raw_parts(ptr, len) };
        let release: ReleaseFn = Box::new(move |_| drop(owner));
        Self::init_zero_copy(region, len, release, Rollback::Discard, |callback_id| {
            Ownership::Borrowed {
                callback_id,
                writable: false,
            }
        })
    }

    /// Create a zero-copy message over a region rented from the global pool.
    ///
    /// `bytes` is copied into the region once; libzmq's release returns the
    /// region to the pool. A failed init returns it immediately.
    pub fn from_pool(bytes: &[u8]) -> Result<Self> {
        let pool = NativeBufferPool::global();
        let mut buffer = pool.rent(bytes.len());
        buffer.as_mut_slice()[..bytes.len()].copy_from_slice(bytes);
        let region = buffer.region();
        let bucket = buffer.bucket();
        let release: ReleaseFn = Box::new(move |_| pool.release(buffer));
        Self::init_zero_copy(region, bytes.len(), release, Rollback::Release, |callback_id| {
            Ownership::PooledBuffer {
                callback_id,
                bucket,
            }
        })
    }

    fn init_zero_copy(
        region: NativeRegion,
        size: usize,
        release: ReleaseFn,
        rollback: Rollback,
        ownership: impl FnOnce(u64) -> Ownership,
    ) -> Result<Self> {
        let registry = ReleaseRegistry::global();
        let guards = GuardPool::global();

        let callback_id = registry.register(release);
        let guard = guards.acquire(callback_id);

        let mut handle = Self::blank();
        // SAFETY: `region` covers `size` bytes that stay valid until the
        // trampoline runs the registered action. The guard cell is never
        // freed, so the hint stays valid on any thread.
        let rc = unsafe {
            zmq_sys::zmq_msg_init_data(
                handle.msg_mut_ptr(),
                region.as_ptr().cast(),
                size,
                Some(release_trampoline),
                guard.as_hint(),
            )
        };

        if rc == -1 {
            let code = ffi::last_errno();
            roll_back(callback_id, guard, rollback);
            debug!(
                "[MessageHandle] zero-copy init failed ({}), rolled back callback {}",
                code, callback_id
            );
            return Err(SluiceError::NativeInit {
                code,
                message: ffi::strerror(code),
            });
        }

        handle.initialized = true;
        handle.ownership = ownership(callback_id);
        trace!(
            "[MessageHandle] zero-copy message of {} bytes, callback {}",
            size,
            callback_id
        );
        Ok(handle)
    }

    /// Content length in bytes.
    pub fn size(&self) -> Result<usize> {
        self.ensure_open()?;
        // SAFETY: the record is initialized and open.
        Ok(unsafe { zmq_sys::zmq_msg_size(self.msg_ptr()) } as usize)
    }

    /// Whether more frames of the same multipart message follow.
    pub fn more(&self) -> Result<bool> {
        self.ensure_open()?;
        // SAFETY: as in `size`.
        Ok(unsafe { zmq_sys::zmq_msg_more(self.msg_ptr()) } != 0)
    }

    /// Read a native message property.
    pub fn property(&self, property: MessageProperty) -> Result<i32> {
        self.ensure_open()?;
        // SAFETY: as in `size`.
        let rc = unsafe { zmq_sys::zmq_msg_get(self.msg_ptr(), property.to_raw() as c_int) };
        if rc == -1 {
            Err(ffi::last_error())
        } else {
            Ok(rc)
        }
    }

    /// Look up connection metadata attached to a received message, such as
    /// `"Socket-Type"`, `"Peer-Address"` or `"User-Id"`.
    ///
    /// Returns `None` when the key is unknown or the message carries no
    /// metadata (it was not received from a peer).
    pub fn metadata(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        let key = CString::new(key)
            .map_err(|_| SluiceError::invalid_argument("metadata key contains NUL"))?;
        // SAFETY: the record is open and `key` is NUL-terminated. The value
        // points into the message's metadata, which `&self` keeps alive
        // while it is copied.
        let value = unsafe { zmq_sys::zmq_msg_gets(self.msg_ptr(), key.as_ptr()) };
        if value.is_null() {
            let code = ffi::last_errno();
            if code == zmq::Error::EINVAL.to_raw() {
                return Ok(None);
            }
            return Err(ffi::error_from_code(code));
        }
        // SAFETY: non-null results are NUL-terminated strings.
        let value = unsafe { CStr::from_ptr(value) };
        Ok(Some(value.to_string_lossy().into_owned()))
    }

    /// Borrow the content.
    pub fn data(&self) -> Result<&[u8]> {
        let size = self.size()?;
        if size == 0 {
            return Ok(&[]);
        }
        // SAFETY: libzmq guarantees `size` readable bytes at `zmq_msg_data`
        // while the record is open; `&self` keeps it open.
        unsafe {
            let data = zmq_sys::zmq_msg_data(self.msg_ptr()).cast::<u8>();
            Ok(std::slice::from_raw_parts(data, size))
        }
    }

    /// Mutably borrow the content.
    ///
    /// # Errors
    ///
    /// `InvalidState` for read-only owners and for content shared with
    /// another message through [`copy_from`](Self::copy_from).
    pub fn data_mut(&mut self) -> Result<&mut [u8]> {
        let size = self.size()?;
        if matches!(self.ownership, Ownership::Borrowed { writable: false, .. }) {
            return Err(SluiceError::InvalidState("message content is read-only"));
        }
        if size == 0 {
            return Ok(&mut []);
        }
        if self.property(MessageProperty::Shared)? != 0 {
            return Err(SluiceError::InvalidState("message content is shared"));
        }
        // SAFETY: as in `data`; `&mut self` excludes other views.
        unsafe {
            let data = zmq_sys::zmq_msg_data(self.msg_mut_ptr()).cast::<u8>();
            Ok(std::slice::from_raw_parts_mut(data, size))
        }
    }

    /// Copy the content out.
    pub fn to_bytes(&self) -> Result<Bytes> {
        self.data().map(Bytes::copy_from_slice)
    }

    /// Content as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> Result<String> {
        self.data().map(|d| String::from_utf8_lossy(d).into_owned())
    }

    /// Close the current record and start over empty.
    pub fn rebuild(&mut self) -> Result<()> {
        self.ensure_open()?;
        // SAFETY: the record is open; it is re-initialized right after.
        unsafe {
            ffi::check(zmq_sys::zmq_msg_close(self.msg_mut_ptr()))?;
            ffi::check(zmq_sys::zmq_msg_init(self.msg_mut_ptr()))?;
        }
        self.ownership = Ownership::Owned;
        Ok(())
    }

    /// Close the current record and start over with `size` bytes.
    pub fn rebuild_with_size(&mut self, size: usize) -> Result<()> {
        self.ensure_open()?;
        // SAFETY: as in `rebuild`.
        unsafe {
            ffi::check(zmq_sys::zmq_msg_close(self.msg_mut_ptr()))?;
        }
        // SAFETY: the record was just closed.
        if let Err(e) = ffi::check(unsafe { zmq_sys::zmq_msg_init_size(self.msg_mut_ptr(), size) }) {
            // Leave a valid empty record behind so close/drop stay sound.
            // SAFETY: zmq_msg_init cannot fail.
            unsafe { zmq_sys::zmq_msg_init(self.msg_mut_ptr()) };
            self.ownership = Ownership::Owned;
            return Err(e);
        }
        self.ownership = Ownership::Owned;
        Ok(())
    }

    /// Take over `src`'s content. `src` is left empty.
    pub fn move_from(&mut self, src: &mut Self) -> Result<()> {
        self.ensure_open()?;
        src.ensure_open()?;
        // SAFETY: both records are open and distinct (`&mut` aliasing rules).
        ffi::check(unsafe { zmq_sys::zmq_msg_move(self.msg_mut_ptr(), src.msg_mut_ptr()) })?;
        self.ownership = std::mem::replace(&mut src.ownership, Ownership::Owned);
        Ok(())
    }

    /// Share `src`'s content. Both handles then read the same bytes.
    pub fn copy_from(&mut self, src: &mut Self) -> Result<()> {
        self.ensure_open()?;
        src.ensure_open()?;
        // SAFETY: as in `move_from`.
        ffi::check(unsafe { zmq_sys::zmq_msg_copy(self.msg_mut_ptr(), src.msg_mut_ptr()) })?;
        self.ownership = src.ownership;
        Ok(())
    }

    /// Send the record on `socket`.
    ///
    /// On success libzmq takes the content and the handle is left empty.
    pub fn send(&mut self, socket: RawSocket, flags: SendFlags) -> Result<Outcome<usize>> {
        self.ensure_open()?;
        // SAFETY: the record is open and `socket` is a live socket.
        let rc = unsafe {
            zmq_sys::zmq_msg_send(self.msg_mut_ptr(), socket.as_ptr(), flags.bits() as c_int)
        };
        let outcome = ffi::transfer_outcome(rc)?;
        if outcome.is_ready() {
            self.ownership = Ownership::Owned;
        }
        Ok(outcome)
    }

    /// Receive one frame from `socket` into this record.
    pub fn recv(&mut self, socket: RawSocket, flags: RecvFlags) -> Result<Outcome<usize>> {
        self.ensure_open()?;
        // SAFETY: as in `send`.
        let rc = unsafe {
            zmq_sys::zmq_msg_recv(self.msg_mut_ptr(), socket.as_ptr(), flags.bits() as c_int)
        };
        let outcome = ffi::transfer_outcome(rc)?;
        if outcome.is_ready() {
            self.ownership = Ownership::Owned;
        }
        Ok(outcome)
    }

    /// Close the record. Further calls are no-ops.
    ///
    /// Zero-copy registrations are left alone; they resolve when libzmq
    /// releases the content.
    pub fn close(&mut self) -> Result<()> {
        if self.closed || !self.initialized {
            self.closed = true;
            return Ok(());
        }
        self.closed = true;
        // SAFETY: the record was open and is never touched again.
        ffi::check(unsafe { zmq_sys::zmq_msg_close(self.msg_mut_ptr()) })
    }

    #[inline]
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        self.ownership
    }
}

impl Drop for MessageHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!("[MessageHandle] close on drop failed: {}", e);
        }
    }
}

impl Recycle for MessageHandle {
    fn create() -> Result<Self> {
        Self::new()
    }

    fn reset(&mut self) -> Result<()> {
        self.rebuild()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_message() {
        let msg = MessageHandle::new().unwrap();
        assert_eq!(msg.size().unwrap(), 0);
        assert!(msg.data().unwrap().is_empty());
        assert!(!msg.more().unwrap());
        assert_eq!(msg.ownership(), Ownership::Owned);
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let msg = MessageHandle::from_bytes(b"hello").unwrap();
        assert_eq!(msg.to_bytes().unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(msg.to_string_lossy().unwrap(), "hello");
    }

    #[test]
    fn test_operations_after_close_fail() {
        let mut msg = MessageHandle::from_bytes(b"x").unwrap();
        msg.close().unwrap();
        msg.close().unwrap();
        assert!(msg.is_closed());
        assert!(matches!(msg.size(), Err(SluiceError::InvalidState(_))));
        assert!(matches!(msg.rebuild(), Err(SluiceError::InvalidState(_))));
    }

    #[test]
    fn test_borrowed_size_check() {
        let buf: &'static mut [u8] = Box::leak(vec![0u8; 8].into_boxed_slice());
        let region = NativeRegion::from_static(buf);
        let err = MessageHandle::borrowed(region, 9, Box::new(|_| {})).unwrap_err();
        assert_eq!(
            err,
            SluiceError::Size {
                requested: 9,
                available: 8
            }
        );
    }

    #[test]
    fn test_move_leaves_source_empty() {
        let mut src = MessageHandle::from_bytes(b"payload").unwrap();
        let mut dst = MessageHandle::new().unwrap();
        dst.move_from(&mut src).unwrap();
        assert_eq!(dst.data().unwrap(), b"payload");
        assert_eq!(src.size().unwrap(), 0);
    }

    #[test]
    fn test_copy_shares_content() {
        let mut src = MessageHandle::from_bytes(&[1u8; 100]).unwrap();
        let mut dst = MessageHandle::new().unwrap();
        dst.copy_from(&mut src).unwrap();
        assert_eq!(dst.data().unwrap(), src.data().unwrap());
    }

    #[test]
    fn test_rebuild_with_size() {
        let mut msg = MessageHandle::from_bytes(b"abc").unwrap();
        msg.rebuild_with_size(16).unwrap();
        assert_eq!(msg.size().unwrap(), 16);
        msg.rebuild().unwrap();
        assert_eq!(msg.size().unwrap(), 0);
    }

    #[test]
    fn test_owner_content_is_read_only() {
        let mut msg = MessageHandle::from_owner(vec![1u8, 2, 3]).unwrap();
        assert_eq!(msg.data().unwrap(), &[1, 2, 3]);
        assert!(matches!(msg.data_mut(), Err(SluiceError::InvalidState(_))));
    }

    #[test]
    fn test_rollback_returns_pool_region() {
        let pool: &'static NativeBufferPool = Box::leak(Box::new(NativeBufferPool::new()));
        let buffer = pool.rent(100);
        let release: ReleaseFn = Box::new(move |_| pool.release(buffer));

        let callback_id = ReleaseRegistry::global().register(release);
        let guard = GuardPool::global().acquire(callback_id);
        roll_back(callback_id, guard, Rollback::Release);

        assert!(!ReleaseRegistry::global().contains(callback_id));
        let stats = pool.statistics();
        assert_eq!(stats.outstanding, 0);
        assert_eq!(pool.pooled_count(100), 1);
    }

    #[test]
    fn test_rollback_discard_skips_action() {
        let callback_id =
            ReleaseRegistry::global().register(Box::new(|_| panic!("must not run")));
        let guard = GuardPool::global().acquire(callback_id);
        roll_back(callback_id, guard, Rollback::Discard);
        assert!(!ReleaseRegistry::global().contains(callback_id));
    }

    #[test]
    fn test_metadata_absent_on_local_message() {
        let msg = MessageHandle::from_bytes(b"local").unwrap();
        assert_eq!(msg.metadata("Socket-Type").unwrap(), None);
        assert!(matches!(
            msg.metadata("bad\0key"),
            Err(SluiceError::InvalidArgument(_))
        ));
    }
}
