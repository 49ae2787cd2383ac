//! Socket owner tying the per-socket pieces together.
//!
//! `Socket` wraps a `zmq::Socket` (connection management stays with the
//! `zmq` crate) and owns:
//!
//! - one [`AdaptiveIoBuffer`] per direction for copying send/receive
//! - one reusable [`MessageHandle`] for single-frame receives
//! - one [`MultipartReceiver`] for atomic multipart receives
//!
//! Methods take `&self` so sockets can sit in a [`PollSet`](crate::poll::PollSet)
//! while being used. The per-socket state lives in a `RefCell`, which makes
//! `Socket` `Send` but not `Sync`.

#![allow(unsafe_code)]

use crate::ffi::{self, RawSocket};
use crate::io_buffer::AdaptiveIoBuffer;
use crate::message::MessageHandle;
use crate::multipart::{self, MultipartReceiver};
use bytes::Bytes;
use sluice_core::config::IoBufferConfig;
use sluice_core::envelope::Multipart;
use sluice_core::error::SluiceError;
use sluice_core::flags::{RecvFlags, SendFlags};
use sluice_core::monitor::MonitorEvent;
use sluice_core::outcome::Outcome;
use sluice_core::Result;
use std::cell::{RefCell, RefMut};
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use tracing::debug;

struct SocketState {
    send_buf: AdaptiveIoBuffer,
    recv_buf: AdaptiveIoBuffer,
    recv_msg: MessageHandle,
    multipart: MultipartReceiver,
}

/// A libzmq socket with reusable transfer state.
pub struct Socket {
    inner: zmq::Socket,
    raw: NonNull<c_void>,
    state: RefCell<SocketState>,
}

// SAFETY: `zmq::Socket` is `Send`, and `raw` points at the same native
// object. The `RefCell` keeps the type `!Sync`.
unsafe impl Send for Socket {}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("raw", &self.raw)
            .field("unreliable", &self.is_unreliable())
            .finish()
    }
}

impl Socket {
    /// Create a socket of `socket_type` in `ctx`.
    pub fn new(ctx: &zmq::Context, socket_type: zmq::SocketType, config: IoBufferConfig) -> Result<Self> {
        let socket = ctx.socket(socket_type).map_err(ffi::from_zmq)?;
        Self::from_zmq(socket, config)
    }

    /// Take ownership of an existing `zmq` socket.
    pub fn from_zmq(mut inner: zmq::Socket, config: IoBufferConfig) -> Result<Self> {
        let raw = NonNull::new(inner.as_mut_ptr())
            .ok_or(SluiceError::InvalidState("socket has no native handle"))?;
        let state = SocketState {
            send_buf: AdaptiveIoBuffer::new(config),
            recv_buf: AdaptiveIoBuffer::new(config),
            recv_msg: MessageHandle::new()?,
            multipart: MultipartReceiver::new()?,
        };
        Ok(Self {
            inner,
            raw,
            state: RefCell::new(state),
        })
    }

    /// The native handle, borrowed for as long as `self`.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> RawSocket<'_> {
        // SAFETY: `raw` belongs to `inner`, which lives as long as `self`.
        unsafe { RawSocket::from_ptr(self.raw) }
    }

    /// The wrapped `zmq` socket, for options and other connection management.
    #[inline]
    #[must_use]
    pub const fn inner(&self) -> &zmq::Socket {
        &self.inner
    }

    fn state(&self) -> Result<RefMut<'_, SocketState>> {
        self.state
            .try_borrow_mut()
            .map_err(|_| SluiceError::InvalidState("socket is already in use"))
    }

    pub fn bind(&self, endpoint: &str) -> Result<()> {
        self.inner.bind(endpoint).map_err(ffi::from_zmq)?;
        debug!("[Socket] bound {}", endpoint);
        Ok(())
    }

    pub fn connect(&self, endpoint: &str) -> Result<()> {
        self.inner.connect(endpoint).map_err(ffi::from_zmq)?;
        debug!("[Socket] connected {}", endpoint);
        Ok(())
    }

    pub fn disconnect(&self, endpoint: &str) -> Result<()> {
        self.inner.disconnect(endpoint).map_err(ffi::from_zmq)
    }

    pub fn unbind(&self, endpoint: &str) -> Result<()> {
        self.inner.unbind(endpoint).map_err(ffi::from_zmq)
    }

    /// Last endpoint bound or connected, with wildcard ports resolved.
    pub fn last_endpoint(&self) -> Result<String> {
        match self.inner.get_last_endpoint().map_err(ffi::from_zmq)? {
            Ok(endpoint) => Ok(endpoint),
            Err(raw) => Ok(String::from_utf8_lossy(&raw).into_owned()),
        }
    }

    /// Copy `data` through the send buffer and send it as one frame.
    pub fn send(&self, data: &[u8], flags: SendFlags) -> Result<Outcome<usize>> {
        self.state()?.send_buf.send(self.raw(), data, flags)
    }

    pub fn send_str(&self, text: &str, flags: SendFlags) -> Result<Outcome<usize>> {
        self.send(text.as_bytes(), flags)
    }

    /// Send a prepared message. On success `msg` is left empty.
    pub fn send_message(&self, msg: &mut MessageHandle, flags: SendFlags) -> Result<Outcome<usize>> {
        msg.send(self.raw(), flags)
    }

    /// Send `owner`'s bytes without copying; `owner` is dropped once
    /// libzmq releases it.
    pub fn send_owned<T>(&self, owner: T, flags: SendFlags) -> Result<Outcome<usize>>
    where
        T: AsRef<[u8]> + Send + 'static,
    {
        let mut msg = MessageHandle::from_owner(owner)?;
        msg.send(self.raw(), flags)
    }

    /// Send `data` through a region of the global buffer pool.
    pub fn send_pooled(&self, data: &[u8], flags: SendFlags) -> Result<Outcome<usize>> {
        let mut msg = MessageHandle::from_pool(data)?;
        msg.send(self.raw(), flags)
    }

    /// Receive one frame into `out` through the receive buffer.
    ///
    /// Returns the native frame length; a longer frame is truncated to `out`.
    pub fn recv_into(&self, out: &mut [u8], flags: RecvFlags) -> Result<Outcome<usize>> {
        self.state()?.recv_buf.recv_into(self.raw(), out, flags)
    }

    /// Receive one whole frame.
    pub fn recv_bytes(&self, flags: RecvFlags) -> Result<Outcome<Bytes>> {
        let mut state = self.state()?;
        match state.recv_msg.recv(self.raw(), flags)? {
            Outcome::Ready(_) => Ok(Outcome::Ready(state.recv_msg.to_bytes()?)),
            Outcome::WouldBlock => Ok(Outcome::WouldBlock),
        }
    }

    /// Receive one frame as UTF-8, replacing invalid sequences.
    pub fn recv_string(&self, flags: RecvFlags) -> Result<Outcome<String>> {
        let mut state = self.state()?;
        match state.recv_msg.recv(self.raw(), flags)? {
            Outcome::Ready(_) => Ok(Outcome::Ready(state.recv_msg.to_string_lossy()?)),
            Outcome::WouldBlock => Ok(Outcome::WouldBlock),
        }
    }

    /// Receive one frame into a caller-owned message.
    pub fn recv_message(&self, msg: &mut MessageHandle, flags: RecvFlags) -> Result<Outcome<usize>> {
        msg.recv(self.raw(), flags)
    }

    /// Whether the last received frame has more frames after it.
    pub fn has_more(&self) -> Result<bool> {
        self.inner.get_rcvmore().map_err(ffi::from_zmq)
    }

    /// Send all frames of `msg` as one multipart message.
    pub fn send_multipart(&self, msg: &Multipart, flags: SendFlags) -> Result<Outcome<usize>> {
        multipart::send_multipart(self.raw(), msg, flags)
    }

    /// Receive one complete multipart message without blocking for its start.
    pub fn recv_multipart(&self) -> Result<Outcome<Multipart>> {
        self.state()?.multipart.recv(self.raw())
    }

    /// Whether a multipart receive failed part-way on this socket.
    ///
    /// Once set, the socket may hold the tail of a message and should be
    /// closed and replaced by the owner.
    #[must_use]
    pub fn is_unreliable(&self) -> bool {
        self.state
            .try_borrow()
            .map_or(false, |state| state.multipart.is_poisoned())
    }

    /// Publish lifecycle events for `events` (a `SocketEvent` mask) on the
    /// `inproc` endpoint `monitor_endpoint`.
    pub fn monitor(&self, monitor_endpoint: &str, events: u16) -> Result<()> {
        self.inner
            .monitor(monitor_endpoint, i32::from(events))
            .map_err(ffi::from_zmq)
    }

    /// Read one event from a PAIR socket connected to a monitor endpoint.
    pub fn recv_monitor_event(&self) -> Result<Outcome<MonitorEvent>> {
        let Outcome::Ready(msg) = self.recv_multipart()? else {
            return Ok(Outcome::WouldBlock);
        };
        let (Some(frame), Some(address)) = (msg.get(0), msg.get(1)) else {
            return Err(SluiceError::invalid_argument(format!(
                "monitor message must have 2 frames, got {}",
                msg.len()
            )));
        };
        let address = String::from_utf8_lossy(address);
        MonitorEvent::parse(frame, &address).map(Outcome::Ready)
    }

    #[must_use]
    pub fn send_buffer_capacity(&self) -> usize {
        self.state.try_borrow().map_or(0, |s| s.send_buf.capacity())
    }

    #[must_use]
    pub fn recv_buffer_capacity(&self) -> usize {
        self.state.try_borrow().map_or(0, |s| s.recv_buf.capacity())
    }
}
