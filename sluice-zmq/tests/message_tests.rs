//! Integration tests for message handles over real libzmq sockets

use bytes::Bytes;
use rand::Rng;
use sluice_core::config::IoBufferConfig;
use sluice_core::error::SluiceError;
use sluice_core::flags::{MessageProperty, RecvFlags, SendFlags};
use sluice_core::outcome::Outcome;
use sluice_zmq::{MessageHandle, MessageObjectPool, Socket};

fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

fn random_payload(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}

fn pair(ctx: &zmq::Context, name: &str) -> (Socket, Socket) {
    let endpoint = format!("inproc://{name}");
    let a = Socket::new(ctx, zmq::PAIR, IoBufferConfig::default()).unwrap();
    let b = Socket::new(ctx, zmq::PAIR, IoBufferConfig::default()).unwrap();
    a.bind(&endpoint).unwrap();
    b.connect(&endpoint).unwrap();
    (a, b)
}

#[test]
fn test_from_bytes_to_bytes_round_trip() {
    for len in [0, 1, 32, 33, 1000, 100_000] {
        let payload = random_payload(len);
        let msg = MessageHandle::from_bytes(&payload).unwrap();
        assert_eq!(msg.size().unwrap(), len);
        assert_eq!(msg.to_bytes().unwrap(), Bytes::from(payload));
    }
}

#[test]
fn test_round_trip_over_pair() {
    init_tracing();
    let ctx = zmq::Context::new();
    let (a, b) = pair(&ctx, "round-trip");

    for len in [0, 5, 4096, 65_536] {
        let payload = random_payload(len);
        let mut out = MessageHandle::from_bytes(&payload).unwrap();
        assert_eq!(a.send_message(&mut out, SendFlags::NONE).unwrap(), Outcome::Ready(len));
        // libzmq takes the content on send
        assert_eq!(out.size().unwrap(), 0);

        let mut incoming = MessageHandle::new().unwrap();
        assert_eq!(b.recv_message(&mut incoming, RecvFlags::NONE).unwrap(), Outcome::Ready(len));
        assert_eq!(incoming.data().unwrap(), &payload[..]);
        assert!(!incoming.more().unwrap());
    }
}

#[test]
fn test_copying_send_and_recv_bytes() {
    let ctx = zmq::Context::new();
    let (a, b) = pair(&ctx, "copying");

    assert!(a.send_str("hello", SendFlags::NONE).unwrap().is_ready());
    assert_eq!(
        b.recv_bytes(RecvFlags::NONE).unwrap(),
        Outcome::Ready(Bytes::from_static(b"hello"))
    );

    assert!(a.send(b"world", SendFlags::NONE).unwrap().is_ready());
    assert_eq!(b.recv_string(RecvFlags::NONE).unwrap(), Outcome::Ready("world".to_owned()));

    assert_eq!(b.recv_bytes(RecvFlags::DONT_WAIT).unwrap(), Outcome::WouldBlock);
}

#[test]
fn test_recv_into_reports_native_length() {
    let ctx = zmq::Context::new();
    let (a, b) = pair(&ctx, "recv-into");

    assert!(a.send(&[9u8; 100], SendFlags::NONE).unwrap().is_ready());
    let mut out = [0u8; 10];
    assert_eq!(b.recv_into(&mut out, RecvFlags::NONE).unwrap(), Outcome::Ready(100));
    assert_eq!(out, [9u8; 10]);
}

#[test]
fn test_close_is_idempotent() {
    let mut msg = MessageHandle::from_bytes(b"bye").unwrap();
    for _ in 0..3 {
        msg.close().unwrap();
    }
    assert!(msg.is_closed());
    assert!(matches!(msg.data(), Err(SluiceError::InvalidState(_))));
    drop(msg);
}

#[test]
fn test_more_flag_and_property() {
    let ctx = zmq::Context::new();
    let (a, b) = pair(&ctx, "more");

    assert!(a.send(b"head", SendFlags::SEND_MORE).unwrap().is_ready());
    assert!(a.send(b"tail", SendFlags::NONE).unwrap().is_ready());

    let mut msg = MessageHandle::new().unwrap();
    assert!(b.recv_message(&mut msg, RecvFlags::NONE).unwrap().is_ready());
    assert!(msg.more().unwrap());
    assert_eq!(msg.property(MessageProperty::More).unwrap(), 1);
    assert!(b.has_more().unwrap());

    assert!(b.recv_message(&mut msg, RecvFlags::NONE).unwrap().is_ready());
    assert!(!msg.more().unwrap());
    assert!(!b.has_more().unwrap());
}

#[test]
fn test_object_pool_in_receive_loop() {
    let ctx = zmq::Context::new();
    let (a, b) = pair(&ctx, "object-pool");
    let pool = MessageObjectPool::default();

    for i in 0..10u8 {
        assert!(a.send(&[i], SendFlags::NONE).unwrap().is_ready());
        let mut msg = pool.rent().unwrap();
        assert!(b.recv_message(&mut msg, RecvFlags::NONE).unwrap().is_ready());
        assert_eq!(msg.data().unwrap(), &[i]);
        pool.release(msg);
    }

    let stats = pool.stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.reused, 9);
}

#[test]
fn test_interop_with_plain_zmq_socket() {
    let ctx = zmq::Context::new();
    let theirs = ctx.socket(zmq::PAIR).unwrap();
    theirs.bind("inproc://interop").unwrap();
    let ours = Socket::new(&ctx, zmq::PAIR, IoBufferConfig::small()).unwrap();
    ours.connect("inproc://interop").unwrap();

    theirs.send("Ping", 0).unwrap();
    assert_eq!(ours.recv_string(RecvFlags::NONE).unwrap(), Outcome::Ready("Ping".to_owned()));

    assert!(ours.send_str("Pong", SendFlags::NONE).unwrap().is_ready());
    assert_eq!(theirs.recv_string(0).unwrap().unwrap(), "Pong");
}

#[test]
fn test_metadata_over_tcp() {
    let ctx = zmq::Context::new();
    let pull = Socket::new(&ctx, zmq::PULL, IoBufferConfig::default()).unwrap();
    pull.bind("tcp://127.0.0.1:*").unwrap();
    let push = Socket::new(&ctx, zmq::PUSH, IoBufferConfig::default()).unwrap();
    push.connect(&pull.last_endpoint().unwrap()).unwrap();

    assert!(push.send_str("meta", SendFlags::NONE).unwrap().is_ready());
    let mut msg = MessageHandle::new().unwrap();
    assert_eq!(pull.recv_message(&mut msg, RecvFlags::NONE).unwrap(), Outcome::Ready(4));

    assert_eq!(msg.metadata("Socket-Type").unwrap().as_deref(), Some("PUSH"));
    assert_eq!(msg.metadata("Peer-Address").unwrap().as_deref(), Some("127.0.0.1"));
    assert_eq!(msg.metadata("No-Such-Key").unwrap(), None);
}
