//! # Sluice ZMQ
//!
//! libzmq binding for the Sluice buffer lifecycle.
//!
//! ## Overview
//!
//! - **MessageHandle**: one native message record, owned, borrowed zero-copy
//!   or backed by a pooled region
//! - **MessageObjectPool**: recycles message handles for polling loops
//! - **AdaptiveIoBuffer**: per-socket scratch buffers that grow on demand
//!   and shrink back after sustained small traffic
//! - **MultipartReceiver**: all-or-nothing multipart receive
//! - **PollSet**: reusable native poll-item array
//! - **Socket**: a `zmq::Socket` owning the per-socket pieces
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sluice_core::config::IoBufferConfig;
//! use sluice_core::flags::{RecvFlags, SendFlags};
//! use sluice_zmq::Socket;
//!
//! fn main() -> sluice_core::Result<()> {
//!     let ctx = zmq::Context::new();
//!     let push = Socket::new(&ctx, zmq::PUSH, IoBufferConfig::default())?;
//!     let pull = Socket::new(&ctx, zmq::PULL, IoBufferConfig::default())?;
//!     pull.bind("inproc://quickstart")?;
//!     push.connect("inproc://quickstart")?;
//!
//!     // Zero-copy: the Vec is dropped once libzmq releases it
//!     push.send_owned(b"hello".to_vec(), SendFlags::NONE)?;
//!     let frame = pull.recv_bytes(RecvFlags::NONE)?;
//!     assert!(frame.is_ready());
//!     Ok(())
//! }
//! ```

#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod ffi;
pub mod io_buffer;
pub mod message;
pub mod message_pool;
pub mod multipart;
pub mod poll;
pub mod socket;

pub use ffi::RawSocket;
pub use io_buffer::{AdaptiveIoBuffer, ReceivedFrame};
pub use message::{MessageHandle, Ownership};
pub use message_pool::MessageObjectPool;
pub use multipart::{send_multipart, MultipartReceiver};
pub use poll::PollSet;
pub use socket::Socket;

// Context and socket types stay with the `zmq` crate.
pub use zmq::{Context, SocketType};
