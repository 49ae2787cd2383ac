//! Atomic multipart receive and send.
//!
//! Receive protocol:
//!
//! 1. The first frame is received with `DONT_WAIT`. Would-block means no
//!    message is pending and nothing was consumed.
//! 2. Once a first frame has arrived the rest of the message is in flight,
//!    so the remaining frames (signalled by the native "more" flag) are
//!    received **blocking**.
//! 3. A genuine error on a later frame returns
//!    [`SluiceError::MultipartIncomplete`] with the number of frames already
//!    consumed and leaves the receiver poisoned. libzmq has no way to abort
//!    mid-message, so the socket may hold the rest of the failed message.
//!
//! Callers only ever see complete envelopes.

use crate::ffi::{self, RawSocket};
use crate::message::MessageHandle;
use bytes::Bytes;
use sluice_core::envelope::Multipart;
use sluice_core::error::SluiceError;
use sluice_core::flags::{RecvFlags, SendFlags};
use sluice_core::outcome::Outcome;
use sluice_core::poison::PoisonGuard;
use sluice_core::Result;
use tracing::{trace, warn};

/// Multipart receiver with one reusable frame record.
///
/// **NOT** thread-safe; owned by a single socket.
#[derive(Debug)]
pub struct MultipartReceiver {
    frame: MessageHandle,
    poisoned: bool,
}

impl MultipartReceiver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            frame: MessageHandle::new()?,
            poisoned: false,
        })
    }

    /// Whether an earlier receive failed part-way through a message.
    ///
    /// Sticky: the owner should replace the socket.
    #[inline]
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Receive one complete multipart message, or report that none is pending.
    pub fn recv(&mut self, socket: RawSocket) -> Result<Outcome<Multipart>> {
        let Self { frame, poisoned } = self;
        match frame.recv(socket, RecvFlags::DONT_WAIT)? {
            Outcome::WouldBlock => return Ok(Outcome::WouldBlock),
            Outcome::Ready(_) => {}
        }

        let first = frame.to_bytes()?;
        let more = frame.more()?;
        let envelope = collect_frames(poisoned, first, more, || {
            match frame.recv(socket, RecvFlags::NONE)? {
                Outcome::Ready(_) => Ok((frame.to_bytes()?, frame.more()?)),
                // A blocking receive does not report would-block; treat it
                // as an interrupted sequence like any other failure.
                Outcome::WouldBlock => {
                    let code = ffi::eagain();
                    Err(SluiceError::native(code, ffi::strerror(code)))
                }
            }
        })?;
        Ok(Outcome::Ready(envelope))
    }
}

/// Drain the rest of a message whose first frame has arrived.
///
/// `next` yields each following frame and its "more" flag. Any failure
/// becomes `MultipartIncomplete` and leaves `poisoned` set.
fn collect_frames<F>(poisoned: &mut bool, first: Bytes, mut more: bool, mut next: F) -> Result<Multipart>
where
    F: FnMut() -> Result<(Bytes, bool)>,
{
    let guard = PoisonGuard::new(poisoned);
    let mut envelope = Multipart::new();
    envelope.push_frame(first);

    while more {
        match next() {
            Ok((bytes, has_more)) => {
                envelope.push_frame(bytes);
                more = has_more;
            }
            Err(e) => {
                let (code, message) = match e {
                    SluiceError::Native { code, message } => (code, message),
                    other => (-1, other.to_string()),
                };
                return Err(incomplete(envelope.len(), code, message));
            }
        }
    }

    guard.disarm();
    trace!("[MultipartReceiver] received {} frame(s)", envelope.len());
    Ok(envelope)
}

fn incomplete(frames_received: usize, code: i32, message: String) -> SluiceError {
    warn!(
        "[MultipartReceiver] receive failed after {} frame(s): {} ({})",
        frames_received, message, code
    );
    SluiceError::MultipartIncomplete {
        frames_received,
        code,
        message,
    }
}

/// Send every frame of `frames`, all but the last with `SEND_MORE`.
///
/// With `DONT_WAIT`, only the first frame may report would-block; in that
/// case nothing was sent. Once the first frame is queued the rest are sent
/// blocking so the message cannot be left half-written.
pub fn send_multipart<'a, I>(socket: RawSocket, frames: I, flags: SendFlags) -> Result<Outcome<usize>>
where
    I: IntoIterator<Item = &'a Bytes>,
{
    let mut frames = frames.into_iter().peekable();
    let mut sent = 0;
    let mut first = true;

    while let Some(frame) = frames.next() {
        let mut frame_flags = if first { flags } else { SendFlags::NONE };
        if frames.peek().is_some() {
            frame_flags |= SendFlags::SEND_MORE;
        }

        let mut msg = MessageHandle::from_bytes(frame)?;
        match msg.send(socket, frame_flags)? {
            Outcome::Ready(_) => sent += 1,
            Outcome::WouldBlock if first => return Ok(Outcome::WouldBlock),
            Outcome::WouldBlock => {
                let code = ffi::eagain();
                return Err(SluiceError::native(code, ffi::strerror(code)));
            }
        }
        first = false;
    }

    Ok(Outcome::Ready(sent))
}
