//! Adaptive per-socket scratch buffers for copying send/receive.
//!
//! Each socket owns one buffer per direction. A payload larger than the
//! buffer grows it immediately to fit. Every `sample_window` operations the
//! average use is checked and an oversized buffer is cut back to about
//! twice the average (see [`UsageWindow`]), so one huge message does not
//! pin a huge buffer forever and tiny messages do not cause churn.

#![allow(unsafe_code)]

use crate::ffi::{self, RawSocket};
use sluice_core::config::IoBufferConfig;
use sluice_core::flags::{RecvFlags, SendFlags};
use sluice_core::outcome::Outcome;
use sluice_core::usage::UsageWindow;
use sluice_core::Result;
use std::os::raw::c_int;
use tracing::trace;

/// Reusable scratch region with adaptive capacity.
#[derive(Debug)]
pub struct AdaptiveIoBuffer {
    buf: Vec<u8>,
    window: UsageWindow,
}

impl Default for AdaptiveIoBuffer {
    fn default() -> Self {
        Self::new(IoBufferConfig::default())
    }
}

impl AdaptiveIoBuffer {
    #[must_use]
    pub fn new(config: IoBufferConfig) -> Self {
        Self {
            buf: vec![0; config.initial_capacity],
            window: UsageWindow::new(config),
        }
    }

    /// Start at `capacity` bytes with the default sizing policy.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(IoBufferConfig::default().with_initial_capacity(capacity))
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn grow_to(&mut self, len: usize) {
        if len > self.buf.len() {
            trace!("[AdaptiveIoBuffer] growing {} -> {}", self.buf.len(), len);
            self.buf.resize(len, 0);
        }
    }

    // Never cuts below the frame just handled, so views of it stay valid.
    fn record(&mut self, used: usize) {
        if let Some(target) = self.window.record(used, self.buf.len()) {
            self.buf.truncate(target.max(used));
            self.buf.shrink_to_fit();
        }
    }

    /// Copy `data` into the buffer and send it as one frame.
    pub fn send(&mut self, socket: RawSocket, data: &[u8], flags: SendFlags) -> Result<Outcome<usize>> {
        self.send_with(socket, data.len(), flags, |buf| buf.copy_from_slice(data))
    }

    /// Let `fill` write `len` bytes straight into the buffer, then send them.
    pub fn send_with<F>(
        &mut self,
        socket: RawSocket,
        len: usize,
        flags: SendFlags,
        fill: F,
    ) -> Result<Outcome<usize>>
    where
        F: FnOnce(&mut [u8]),
    {
        self.grow_to(len);
        fill(&mut self.buf[..len]);
        // SAFETY: `buf` holds at least `len` initialized bytes and libzmq
        // copies them before returning.
        let rc = unsafe {
            zmq_sys::zmq_send(
                socket.as_ptr(),
                self.buf.as_ptr().cast(),
                len,
                flags.bits() as c_int,
            )
        };
        let outcome = ffi::transfer_outcome(rc)?;
        if outcome.is_ready() {
            self.record(len);
        }
        Ok(outcome)
    }

    /// Receive one frame into the buffer.
    ///
    /// The returned [`ReceivedFrame`] carries the native frame length next to
    /// the copied bytes, so a frame longer than the buffer is reported as
    /// truncated. A truncated receive grows the buffer so the next frame of
    /// that size fits.
    pub fn recv(&mut self, socket: RawSocket, flags: RecvFlags) -> Result<Outcome<ReceivedFrame<'_>>> {
        let native_len = match self.recv_native(socket, flags)? {
            Outcome::Ready(n) => n,
            Outcome::WouldBlock => return Ok(Outcome::WouldBlock),
        };
        let copied = native_len.min(self.buf.len());
        if native_len > copied {
            trace!(
                "[AdaptiveIoBuffer] frame of {} bytes truncated to {}",
                native_len,
                copied
            );
        }
        self.record(native_len);
        self.grow_to(native_len);
        Ok(Outcome::Ready(ReceivedFrame {
            data: &self.buf[..copied],
            len: native_len,
        }))
    }

    /// Receive one frame and copy it into `out`.
    ///
    /// The buffer is grown to `out.len()` first, so only a frame longer than
    /// `out` is truncated. Returns the native frame length.
    pub fn recv_into(&mut self, socket: RawSocket, out: &mut [u8], flags: RecvFlags) -> Result<Outcome<usize>> {
        self.grow_to(out.len());
        let native_len = match self.recv_native(socket, flags)? {
            Outcome::Ready(n) => n,
            Outcome::WouldBlock => return Ok(Outcome::WouldBlock),
        };

        let copied = native_len.min(out.len());
        out[..copied].copy_from_slice(&self.buf[..copied]);
        if copied < native_len {
            trace!(
                "[AdaptiveIoBuffer] frame of {} bytes truncated to {}",
                native_len,
                copied
            );
        }
        self.record(native_len);
        self.grow_to(native_len);
        Ok(Outcome::Ready(native_len))
    }

    fn recv_native(&mut self, socket: RawSocket, flags: RecvFlags) -> Result<Outcome<usize>> {
        let capacity = self.buf.len();
        // SAFETY: `buf` is writable for `capacity` bytes and libzmq writes at
        // most that many.
        let rc = unsafe {
            zmq_sys::zmq_recv(
                socket.as_ptr(),
                self.buf.as_mut_ptr().cast(),
                capacity,
                flags.bits() as c_int,
            )
        };
        ffi::transfer_outcome(rc)
    }
}

/// One frame received through an [`AdaptiveIoBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedFrame<'a> {
    /// Bytes copied out of the frame
    pub data: &'a [u8],
    /// Native frame length, larger than `data.len()` when truncated
    pub len: usize,
}

impl ReceivedFrame<'_> {
    #[inline]
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.len > self.data.len()
    }
}
