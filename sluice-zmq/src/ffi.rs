//! Thin helpers over the raw libzmq call surface.
//!
//! Everything here is about translating native return codes: `-1` plus
//! `zmq_errno()` becomes either [`Outcome::WouldBlock`] (for `EAGAIN`) or a
//! [`SluiceError::Native`] carrying the errno and libzmq's description.

#![allow(unsafe_code)]

use sluice_core::error::SluiceError;
use sluice_core::outcome::Outcome;
use sluice_core::Result;
use std::ffi::{c_void, CStr};
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::ptr::NonNull;

/// Borrowed native socket pointer.
///
/// The lifetime ties it to the socket it came from, so it cannot outlive
/// the native socket object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSocket<'a> {
    ptr: NonNull<c_void>,
    _socket: PhantomData<&'a zmq::Socket>,
}

impl<'a> RawSocket<'a> {
    /// Borrow the native handle of a `zmq` socket.
    pub fn of(socket: &'a mut zmq::Socket) -> Result<Self> {
        NonNull::new(socket.as_mut_ptr())
            .map(|ptr| Self {
                ptr,
                _socket: PhantomData,
            })
            .ok_or(SluiceError::InvalidState("socket has no native handle"))
    }

    /// Wrap a native socket pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live libzmq socket for all of `'a`.
    #[must_use]
    pub const unsafe fn from_ptr(ptr: NonNull<c_void>) -> Self {
        Self {
            ptr,
            _socket: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_ptr(self) -> *mut c_void {
        self.ptr.as_ptr()
    }
}

/// errno value for "try again".
#[inline]
pub(crate) fn eagain() -> i32 {
    zmq::Error::EAGAIN.to_raw()
}

/// Description libzmq gives for `code`.
pub fn strerror(code: i32) -> String {
    // SAFETY: zmq_strerror returns a pointer to a static, NUL-terminated string.
    unsafe {
        let text = zmq_sys::zmq_strerror(code as c_int);
        if text.is_null() {
            return format!("errno {code}");
        }
        CStr::from_ptr(text).to_string_lossy().into_owned()
    }
}

/// The calling thread's last libzmq errno.
#[inline]
pub fn last_errno() -> i32 {
    // SAFETY: no preconditions.
    unsafe { zmq_sys::zmq_errno() }
}

/// Build a native error from the current errno.
pub fn last_error() -> SluiceError {
    error_from_code(last_errno())
}

pub fn error_from_code(code: i32) -> SluiceError {
    SluiceError::native(code, strerror(code))
}

/// Convert an error from the `zmq` crate, keeping the raw errno.
pub fn from_zmq(err: zmq::Error) -> SluiceError {
    SluiceError::native(err.to_raw(), err.message())
}

/// Interpret a native byte-count return code.
///
/// `rc >= 0` is a completed transfer, `-1` with `EAGAIN` is would-block,
/// anything else is a failure.
pub(crate) fn transfer_outcome(rc: c_int) -> Result<Outcome<usize>> {
    if rc >= 0 {
        return Ok(Outcome::Ready(rc as usize));
    }
    let code = last_errno();
    if code == eagain() {
        Ok(Outcome::WouldBlock)
    } else {
        Err(error_from_code(code))
    }
}

/// Interpret a native status return code (`0` or `-1`).
pub(crate) fn check(rc: c_int) -> Result<()> {
    if rc == -1 {
        Err(last_error())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strerror_known_code() {
        let text = strerror(eagain());
        assert!(!text.is_empty());
    }

    #[test]
    fn test_from_zmq_keeps_code() {
        let err = from_zmq(zmq::Error::EINVAL);
        assert_eq!(err.native_code(), Some(zmq::Error::EINVAL.to_raw()));
    }

    #[test]
    fn test_raw_socket_of() {
        let ctx = zmq::Context::new();
        let mut socket = ctx.socket(zmq::PAIR).unwrap();
        let raw = RawSocket::of(&mut socket).unwrap();
        assert!(!raw.as_ptr().is_null());
    }
}
