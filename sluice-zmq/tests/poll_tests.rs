//! Poll set tests

use sluice_core::config::{IoBufferConfig, PollSetConfig};
use sluice_core::error::SluiceError;
use sluice_core::flags::{PollEvents, RecvFlags, SendFlags};
use sluice_zmq::{PollSet, Socket};

fn pull(ctx: &zmq::Context, endpoint: &str) -> Socket {
    let socket = Socket::new(ctx, zmq::PULL, IoBufferConfig::default()).unwrap();
    socket.bind(endpoint).unwrap();
    socket
}

#[test]
fn test_idle_then_one_ready() {
    let ctx = zmq::Context::new();
    let a = pull(&ctx, "inproc://poll-a");
    let b = pull(&ctx, "inproc://poll-b");
    let push = Socket::new(&ctx, zmq::PUSH, IoBufferConfig::default()).unwrap();
    push.connect("inproc://poll-b").unwrap();

    let mut set = PollSet::default();
    let ia = set.register(&a, PollEvents::IN);
    let ib = set.register(&b, PollEvents::IN);

    assert_eq!(set.poll(0).unwrap(), 0);
    assert!(!set.is_readable(ia).unwrap());
    assert!(!set.is_readable(ib).unwrap());

    assert!(push.send(b"wake", SendFlags::NONE).unwrap().is_ready());
    assert_eq!(set.poll(5000).unwrap(), 1);
    assert!(!set.is_readable(ia).unwrap());
    assert!(set.is_readable(ib).unwrap());
    assert!(!set.has_error(ib).unwrap());

    // The registered socket is still usable while in the set.
    assert!(b.recv_bytes(RecvFlags::DONT_WAIT).unwrap().is_ready());
    assert_eq!(set.poll(0).unwrap(), 0);
}

#[test]
fn test_empty_set_returns_zero() {
    let mut set = PollSet::default();
    assert_eq!(set.poll(1000).unwrap(), 0);
    assert!(set.is_empty());
}

#[test]
fn test_growth_keeps_entries() {
    let ctx = zmq::Context::new();
    let sockets: Vec<Socket> = (0..5)
        .map(|i| pull(&ctx, &format!("inproc://grow-{i}")))
        .collect();

    let mut set = PollSet::new(PollSetConfig::default().with_initial_capacity(2));
    let masks = [
        PollEvents::IN,
        PollEvents::OUT,
        PollEvents::IN | PollEvents::OUT,
        PollEvents::IN,
        PollEvents::OUT,
    ];
    for (socket, mask) in sockets.iter().zip(masks) {
        set.register(socket, mask);
    }
    assert_eq!(set.len(), 5);
    assert!(set.capacity() >= 5);
    for (index, mask) in masks.iter().enumerate() {
        assert_eq!(set.interest(index).unwrap(), *mask);
    }
}

#[test]
fn test_unregister_shifts_and_modify_in_place() {
    let ctx = zmq::Context::new();
    let a = pull(&ctx, "inproc://shift-a");
    let b = pull(&ctx, "inproc://shift-b");
    let c = pull(&ctx, "inproc://shift-c");

    let mut set = PollSet::default();
    set.register(&a, PollEvents::IN);
    set.register(&b, PollEvents::OUT);
    set.register(&c, PollEvents::IN | PollEvents::OUT);

    set.unregister(0).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.interest(0).unwrap(), PollEvents::OUT);
    assert_eq!(set.interest(1).unwrap(), PollEvents::IN | PollEvents::OUT);

    set.modify(0, PollEvents::IN).unwrap();
    assert_eq!(set.interest(0).unwrap(), PollEvents::IN);

    assert_eq!(
        set.unregister(2),
        Err(SluiceError::IndexOutOfBounds { index: 2, len: 2 })
    );
    assert!(set.is_readable(5).is_err());
}

#[cfg(unix)]
#[test]
fn test_register_fd() {
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    let (mut left, right) = UnixStream::pair().unwrap();
    let mut set = PollSet::default();
    let index = set.register_fd(right.as_raw_fd(), PollEvents::IN);

    assert_eq!(set.poll(0).unwrap(), 0);
    left.write_all(b"x").unwrap();
    assert_eq!(set.poll(5000).unwrap(), 1);
    assert!(set.is_readable(index).unwrap());
}
