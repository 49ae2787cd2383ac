//! Zero-copy release tests
//!
//! Release actions must run exactly once, from whichever thread libzmq
//! drops the content on, and closing the wrapper must not cancel them.

use sluice_core::arena::NativeRegion;
use sluice_core::config::IoBufferConfig;
use sluice_core::flags::{MessageProperty, RecvFlags, SendFlags};
use sluice_core::outcome::Outcome;
use sluice_core::registry::ReleaseRegistry;
use sluice_zmq::{MessageHandle, Ownership, Socket};
use std::thread::{self, ThreadId};
use std::time::Duration;

const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

struct Tracked {
    data: Vec<u8>,
    released: flume::Sender<ThreadId>,
}

impl AsRef<[u8]> for Tracked {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let _ = self.released.send(thread::current().id());
    }
}

fn tcp_push_pull(ctx: &zmq::Context) -> (Socket, Socket) {
    let pull = Socket::new(ctx, zmq::PULL, IoBufferConfig::default()).unwrap();
    pull.bind("tcp://127.0.0.1:*").unwrap();
    let endpoint = pull.last_endpoint().unwrap();
    let push = Socket::new(ctx, zmq::PUSH, IoBufferConfig::default()).unwrap();
    push.connect(&endpoint).unwrap();
    (push, pull)
}

#[test]
fn test_release_runs_on_engine_thread() {
    let ctx = zmq::Context::new();
    let (push, pull) = tcp_push_pull(&ctx);
    let (tx, rx) = flume::unbounded();

    let owner = Tracked {
        data: vec![42u8; 1024],
        released: tx,
    };
    assert_eq!(push.send_owned(owner, SendFlags::NONE).unwrap(), Outcome::Ready(1024));

    let frame = pull.recv_bytes(RecvFlags::NONE).unwrap().ready().unwrap();
    assert_eq!(&frame[..], &[42u8; 1024][..]);

    let release_thread = rx.recv_timeout(RELEASE_TIMEOUT).unwrap();
    assert_ne!(release_thread, thread::current().id());
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err(), "released twice");
}

#[test]
fn test_close_before_release_keeps_action() {
    let (tx, rx) = flume::unbounded::<()>();
    let buf: &'static mut [u8] = Box::leak(vec![3u8; 256].into_boxed_slice());
    let region = NativeRegion::from_static(buf);

    let mut first = MessageHandle::borrowed(
        region,
        256,
        Box::new(move |_| {
            let _ = tx.send(());
        }),
    )
    .unwrap();
    let Ownership::Borrowed { callback_id, .. } = first.ownership() else {
        panic!("expected borrowed ownership");
    };

    let mut second = MessageHandle::new().unwrap();
    second.copy_from(&mut first).unwrap();
    assert_eq!(second.property(MessageProperty::Shared).unwrap(), 1);

    first.close().unwrap();
    assert!(rx.try_recv().is_err(), "released while content is still shared");
    assert!(ReleaseRegistry::global().contains(callback_id));

    second.close().unwrap();
    rx.recv_timeout(RELEASE_TIMEOUT).unwrap();
    assert!(!ReleaseRegistry::global().contains(callback_id));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_borrowed_send_then_close() {
    let ctx = zmq::Context::new();
    let (push, pull) = tcp_push_pull(&ctx);
    let (tx, rx) = flume::unbounded::<usize>();

    let buf: &'static mut [u8] = Box::leak(b"borrowed-payload".to_vec().into_boxed_slice());
    let region = NativeRegion::from_static(buf);
    let mut msg = MessageHandle::borrowed(
        region,
        region.len(),
        Box::new(move |data| {
            let _ = tx.send(data as usize);
        }),
    )
    .unwrap();

    assert!(push.send_message(&mut msg, SendFlags::NONE).unwrap().is_ready());
    msg.close().unwrap();

    assert_eq!(
        pull.recv_string(RecvFlags::NONE).unwrap(),
        Outcome::Ready("borrowed-payload".to_owned())
    );
    let released_ptr = rx.recv_timeout(RELEASE_TIMEOUT).unwrap();
    assert_eq!(released_ptr, region.as_ptr() as usize);
}

#[test]
fn test_panicking_release_is_contained() {
    let buf: &'static mut [u8] = Box::leak(vec![0u8; 64].into_boxed_slice());
    let region = NativeRegion::from_static(buf);
    let mut msg = MessageHandle::borrowed(region, 64, Box::new(|_| panic!("release failed"))).unwrap();
    let callback_id = msg.ownership().callback_id().unwrap();

    msg.close().unwrap();
    assert!(!ReleaseRegistry::global().contains(callback_id));
}
