//! Message wrapper recycling.
//!
//! Receive loops that poll many sockets would otherwise construct and
//! close a native record for every attempt. Released handles are rebuilt
//! empty and kept; handles that fail to rebuild (for example, closed ones)
//! are dropped.

use crate::message::MessageHandle;
use once_cell::sync::Lazy;
use sluice_core::recycle::ObjectPool;

/// Pool of reusable [`MessageHandle`]s.
pub type MessageObjectPool = ObjectPool<MessageHandle>;

static GLOBAL_MESSAGE_POOL: Lazy<MessageObjectPool> = Lazy::new(MessageObjectPool::default);

/// The process-wide message pool.
pub fn global() -> &'static MessageObjectPool {
    &GLOBAL_MESSAGE_POOL
}
