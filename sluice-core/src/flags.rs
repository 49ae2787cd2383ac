//! Flag and property constants shared with the native engine.
//!
//! Values mirror libzmq's `zmq.h` (`ZMQ_DONTWAIT`, `ZMQ_SNDMORE`,
//! `ZMQ_POLLIN`, ...). They are part of the stable libzmq ABI.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Flags for send calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SendFlags(i32);

impl SendFlags {
    /// Blocking send, last (or only) frame.
    pub const NONE: Self = Self(0);

    /// Return would-block instead of waiting (`ZMQ_DONTWAIT`).
    pub const DONT_WAIT: Self = Self(1);

    /// More frames follow this one (`ZMQ_SNDMORE`).
    pub const SEND_MORE: Self = Self(2);

    #[inline]
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SendFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SendFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Flags for receive calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RecvFlags(i32);

impl RecvFlags {
    /// Blocking receive.
    pub const NONE: Self = Self(0);

    /// Return would-block instead of waiting (`ZMQ_DONTWAIT`).
    pub const DONT_WAIT: Self = Self(1);

    #[inline]
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Poll interest / returned-event mask (`short events` in `zmq_pollitem_t`).
///
/// Combined masks are first-class: `PollEvents::IN | PollEvents::OUT` is a
/// valid value, and unknown bits survive a round trip through `from_bits`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PollEvents(i16);

impl PollEvents {
    pub const NONE: Self = Self(0);
    /// At least one message may be received without blocking (`ZMQ_POLLIN`).
    pub const IN: Self = Self(1);
    /// At least one message may be sent without blocking (`ZMQ_POLLOUT`).
    pub const OUT: Self = Self(2);
    /// Error condition on a raw descriptor (`ZMQ_POLLERR`).
    pub const ERR: Self = Self(4);
    /// Urgent data on a raw descriptor (`ZMQ_POLLPRI`).
    pub const PRI: Self = Self(8);

    const NAMED: [(Self, &'static str); 4] = [
        (Self::IN, "IN"),
        (Self::OUT, "OUT"),
        (Self::ERR, "ERR"),
        (Self::PRI, "PRI"),
    ];

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: i16) -> Self {
        Self(bits)
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> i16 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for PollEvents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PollEvents {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PollEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PollEvents({self})")
    }
}

impl fmt::Display for PollEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut rest = self.0;
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                rest &= !flag.0;
                first = false;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{rest:#x}")?;
        }
        Ok(())
    }
}

/// Message properties readable through `zmq_msg_get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageProperty {
    /// More frames follow (`ZMQ_MORE`)
    More,

    /// Content is shared with another message (`ZMQ_SHARED`)
    Shared,

    /// A property code this layer does not name
    Unrecognized(i32),
}

impl MessageProperty {
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::More,
            3 => Self::Shared,
            other => Self::Unrecognized(other),
        }
    }

    #[must_use]
    pub const fn to_raw(self) -> i32 {
        match self {
            Self::More => 1,
            Self::Shared => 3,
            Self::Unrecognized(raw) => raw,
        }
    }
}
