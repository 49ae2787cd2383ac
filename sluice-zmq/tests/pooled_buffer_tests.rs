//! Pooled-buffer messages return their region to the global pool once
//! libzmq releases them.
//!
//! Kept in its own test binary: it reads global pool counters.

use sluice_core::config::IoBufferConfig;
use sluice_core::flags::{RecvFlags, SendFlags};
use sluice_core::outcome::Outcome;
use sluice_core::pool::NativeBufferPool;
use sluice_zmq::{MessageHandle, Ownership, Socket};
use std::time::{Duration, Instant};

const SIZE: usize = 3000;

fn returns_for(size: usize) -> u64 {
    NativeBufferPool::global()
        .statistics()
        .bucket_for(size)
        .map_or(0, |bucket| bucket.returns)
}

fn wait_for_returns(size: usize, expected: u64) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if returns_for(size) >= expected {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_pooled_buffer_returns_to_pool() {
    let before = returns_for(SIZE);

    // Closed without sending: libzmq releases on close.
    let payload = vec![7u8; SIZE];
    let mut msg = MessageHandle::from_pool(&payload).unwrap();
    assert!(matches!(msg.ownership(), Ownership::PooledBuffer { bucket: Some(_), .. }));
    assert_eq!(msg.data().unwrap(), &payload[..]);
    msg.close().unwrap();
    assert!(wait_for_returns(SIZE, before + 1));
    assert!(NativeBufferPool::global().pooled_count(SIZE) >= 1);

    // Sent over tcp: released by an I/O thread after transmission.
    let ctx = zmq::Context::new();
    let pull = Socket::new(&ctx, zmq::PULL, IoBufferConfig::default()).unwrap();
    pull.bind("tcp://127.0.0.1:*").unwrap();
    let push = Socket::new(&ctx, zmq::PUSH, IoBufferConfig::default()).unwrap();
    push.connect(&pull.last_endpoint().unwrap()).unwrap();

    assert_eq!(push.send_pooled(&payload, SendFlags::NONE).unwrap(), Outcome::Ready(SIZE));
    let frame = pull.recv_bytes(RecvFlags::NONE).unwrap().ready().unwrap();
    assert_eq!(frame.len(), SIZE);
    assert!(wait_for_returns(SIZE, before + 2));

    // The second rent reused the region returned by the first.
    let bucket = NativeBufferPool::global()
        .statistics()
        .bucket_for(SIZE)
        .cloned()
        .unwrap();
    assert!(bucket.hits >= 1);
}
