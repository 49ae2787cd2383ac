//! Sluice Core
//!
//! Engine-independent building blocks of the native message lifecycle:
//! - Native memory regions and the never-freed arena (`arena`)
//! - Bucketed native buffer pool (`pool`)
//! - Cross-thread release confirmation registry and guard cells (`registry`)
//! - Generic object recycling (`recycle`)
//! - Adaptive I/O buffer sizing policy (`usage`)
//! - Multipart envelopes (`envelope`)
//! - Native flag constants, would-block outcomes and error types

// Raw memory is confined to `arena` and two accessors in `pool`/`registry`
#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]

pub mod arena;
pub mod config;
pub mod envelope;
pub mod error;
pub mod flags;
pub mod monitor;
pub mod outcome;
pub mod poison;
pub mod pool;
pub mod recycle;
pub mod registry;
pub mod usage;

pub use error::{Result, SluiceError};
pub use outcome::Outcome;

pub mod prelude {
    pub use crate::arena::NativeRegion;
    pub use crate::config::{IoBufferConfig, ObjectPoolConfig, PollSetConfig};
    pub use crate::envelope::Multipart;
    pub use crate::error::{Result, SluiceError};
    pub use crate::flags::{MessageProperty, PollEvents, RecvFlags, SendFlags};
    pub use crate::monitor::{MonitorEvent, SocketEvent};
    pub use crate::outcome::Outcome;
    pub use crate::poison::PoisonGuard;
    pub use crate::pool::{NativeBufferPool, PoolStatistics, PooledBuffer};
    pub use crate::recycle::{ObjectPool, Recycle};
    pub use crate::registry::{ReleaseFn, ReleaseRegistry};
}
