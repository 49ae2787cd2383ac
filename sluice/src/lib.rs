//! # Sluice
//!
//! Allocation-free, use-after-free-proof byte buffer exchange with libzmq.
//!
//! ## Architecture
//!
//! - **`sluice-core`**: native regions, the bucketed buffer pool, the
//!   release registry, object recycling and the buffer sizing policy
//! - **`sluice-zmq`**: the libzmq binding (messages, sockets, polling)
//! - **`sluice`**: public API surface (this crate)
//!
//! ## Engines (opt-in via features)
//!
//! - **`zmq`** (default) - libzmq via the `zmq` crate
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "zmq")]
//! use sluice::zmq::prelude::*;
//!
//! # #[cfg(feature = "zmq")]
//! # fn example() -> sluice::Result<()> {
//! let ctx = Context::new();
//! let server = Socket::new(&ctx, SocketType::PULL, IoBufferConfig::default())?;
//! server.bind("tcp://127.0.0.1:5555")?;
//!
//! let client = Socket::new(&ctx, SocketType::PUSH, IoBufferConfig::default())?;
//! client.connect("tcp://127.0.0.1:5555")?;
//!
//! // Zero-copy send: the buffer is dropped once libzmq is done with it
//! client.send_owned(vec![0u8; 4096], SendFlags::NONE)?;
//!
//! // Multipart messages arrive whole or not at all
//! client.send_multipart(&Multipart::new().push_str("key").push_str("value"), SendFlags::NONE)?;
//!
//! let mut poller = PollSet::default();
//! poller.register(&server, PollEvents::IN);
//! if poller.poll(1000)? > 0 {
//!     let frame = server.recv_bytes(RecvFlags::DONT_WAIT)?;
//!     println!("received {:?}", frame);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! All crates log through `tracing`. Call [`dev_tracing::init_tracing`] with
//! `RUST_LOG` set to see pool, registry and socket activity.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Logging setup for tests and benches.
pub mod dev_tracing;

pub use bytes::Bytes;
pub use sluice_core::{arena, config, envelope, error, flags, monitor, outcome, pool, recycle, registry};
pub use sluice_core::{Outcome, Result, SluiceError};

/// libzmq binding.
#[cfg(feature = "zmq")]
pub mod zmq {
    pub use sluice_zmq::*;

    /// Convenient imports for libzmq sockets.
    ///
    /// ```rust
    /// use sluice::zmq::prelude::*;
    ///
    /// let msg = Multipart::new().push_str("hello");
    /// assert_eq!(msg.len(), 1);
    /// assert!(SendFlags::NONE.bits() == 0);
    /// ```
    pub mod prelude {
        pub use super::{Context, MessageHandle, PollSet, Socket, SocketType};
        pub use bytes::Bytes;
        pub use sluice_core::prelude::*;
    }
}
