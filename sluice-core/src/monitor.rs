//! Socket event monitoring.
//!
//! The native engine reports socket lifecycle events as two-frame messages
//! on a monitor endpoint:
//!
//! - frame 1: 6 bytes, event id (`u16` LE) followed by a value (`i32` LE)
//! - frame 2: the affected endpoint address
//!
//! The value is event specific (a file descriptor, an errno, a retry
//! interval in milliseconds).

use crate::error::{Result, SluiceError};
use std::fmt;

/// Length of the first monitor frame.
pub const EVENT_FRAME_LEN: usize = 6;

/// Socket lifecycle events (`ZMQ_EVENT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketEvent {
    /// Connection established to a peer.
    Connected,

    /// Synchronous connect failed, the engine will retry.
    ConnectDelayed,

    /// Asynchronous connect is being retried after the given interval.
    ConnectRetried,

    /// Socket is bound and listening.
    Listening,

    /// Bind failed. The value carries the errno.
    BindFailed,

    /// Incoming connection accepted.
    Accepted,

    /// Accepting an incoming connection failed. The value carries the errno.
    AcceptFailed,

    /// Connection closed.
    Closed,

    /// Closing a connection failed. The value carries the errno.
    CloseFailed,

    /// Peer disconnected unexpectedly.
    Disconnected,

    /// Monitoring was stopped on the socket.
    MonitorStopped,

    /// An event id this layer does not name (newer engine versions emit more).
    Unrecognized(u16),
}

impl SocketEvent {
    /// Subscription mask for every event (`ZMQ_EVENT_ALL`).
    pub const ALL: u16 = 0xFFFF;

    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            1 => Self::Connected,
            2 => Self::ConnectDelayed,
            4 => Self::ConnectRetried,
            8 => Self::Listening,
            16 => Self::BindFailed,
            32 => Self::Accepted,
            64 => Self::AcceptFailed,
            128 => Self::Closed,
            256 => Self::CloseFailed,
            512 => Self::Disconnected,
            1024 => Self::MonitorStopped,
            other => Self::Unrecognized(other),
        }
    }

    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            Self::Connected => 1,
            Self::ConnectDelayed => 2,
            Self::ConnectRetried => 4,
            Self::Listening => 8,
            Self::BindFailed => 16,
            Self::Accepted => 32,
            Self::AcceptFailed => 64,
            Self::Closed => 128,
            Self::CloseFailed => 256,
            Self::Disconnected => 512,
            Self::MonitorStopped => 1024,
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("Connected"),
            Self::ConnectDelayed => f.write_str("ConnectDelayed"),
            Self::ConnectRetried => f.write_str("ConnectRetried"),
            Self::Listening => f.write_str("Listening"),
            Self::BindFailed => f.write_str("BindFailed"),
            Self::Accepted => f.write_str("Accepted"),
            Self::AcceptFailed => f.write_str("AcceptFailed"),
            Self::Closed => f.write_str("Closed"),
            Self::CloseFailed => f.write_str("CloseFailed"),
            Self::Disconnected => f.write_str("Disconnected"),
            Self::MonitorStopped => f.write_str("MonitorStopped"),
            Self::Unrecognized(raw) => write!(f, "Unrecognized({raw:#06x})"),
        }
    }
}

/// One parsed monitor notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEvent {
    pub event: SocketEvent,
    /// Event-specific value
    pub value: i32,
    /// Endpoint the event refers to
    pub address: String,
}

impl MonitorEvent {
    /// Parse the 6-byte event frame plus the address frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `frame` is not exactly 6 bytes.
    pub fn parse(frame: &[u8], address: &str) -> Result<Self> {
        let Ok(raw) = <[u8; EVENT_FRAME_LEN]>::try_from(frame) else {
            return Err(SluiceError::invalid_argument(format!(
                "monitor event frame must be exactly {EVENT_FRAME_LEN} bytes, got {}",
                frame.len()
            )));
        };
        let event = u16::from_le_bytes([raw[0], raw[1]]);
        let value = i32::from_le_bytes([raw[2], raw[3], raw[4], raw[5]]);
        Ok(Self {
            event: SocketEvent::from_raw(event),
            value,
            address: address.to_owned(),
        })
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (value={})", self.event, self.address, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: u16, value: i32) -> Vec<u8> {
        let mut out = event.to_le_bytes().to_vec();
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    #[test]
    fn test_parse_known_event() {
        let event = MonitorEvent::parse(&frame(8, 17), "tcp://127.0.0.1:5555").unwrap();
        assert_eq!(event.event, SocketEvent::Listening);
        assert_eq!(event.value, 17);
        assert_eq!(event.address, "tcp://127.0.0.1:5555");
        assert_eq!(event.to_string(), "Listening tcp://127.0.0.1:5555 (value=17)");
    }

    #[test]
    fn test_parse_unknown_event() {
        let event = MonitorEvent::parse(&frame(0x0800, -1), "inproc://x").unwrap();
        assert_eq!(event.event, SocketEvent::Unrecognized(0x0800));
        assert_eq!(event.value, -1);
        assert_eq!(event.event.to_raw(), 0x0800);
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert!(MonitorEvent::parse(&[1, 0, 0], "x").is_err());
        assert!(MonitorEvent::parse(&[0; 7], "x").is_err());
    }

    #[test]
    fn test_raw_round_trip() {
        for raw in [1u16, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024] {
            assert_eq!(SocketEvent::from_raw(raw).to_raw(), raw);
            assert!(!matches!(SocketEvent::from_raw(raw), SocketEvent::Unrecognized(_)));
        }
    }
}
