//! Non-blocking call outcome.
//!
//! Every send/receive in Sluice follows a three-way discipline:
//!
//! - `Ok(Outcome::Ready(value))` - the operation completed
//! - `Ok(Outcome::WouldBlock)` - a non-blocking call found nothing to do
//! - `Err(SluiceError)` - a genuine failure carrying the native errno
//!
//! Would-block is a normal "try later" result and never travels as an error.

use std::fmt;

/// Result of a call that may report "would block" instead of completing.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome<T> {
    /// The operation completed with a value.
    Ready(T),

    /// The operation could not proceed without blocking.
    WouldBlock,
}

impl<T> Outcome<T> {
    /// Check if the operation completed.
    #[inline]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Check if the operation would have blocked.
    #[inline]
    pub const fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    /// Convert into an `Option`, mapping `WouldBlock` to `None`.
    #[inline]
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(v) => Some(v),
            Self::WouldBlock => None,
        }
    }

    /// Borrow the completed value, if any.
    #[inline]
    pub const fn as_ref(&self) -> Outcome<&T> {
        match self {
            Self::Ready(v) => Outcome::Ready(v),
            Self::WouldBlock => Outcome::WouldBlock,
        }
    }

    /// Map the completed value.
    #[inline]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Ready(v) => Outcome::Ready(f(v)),
            Self::WouldBlock => Outcome::WouldBlock,
        }
    }

    /// Return the completed value or `default`.
    #[inline]
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Ready(v) => v,
            Self::WouldBlock => default,
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Ready(v),
            None => Self::WouldBlock,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(v) => write!(f, "Ready({v})"),
            Self::WouldBlock => f.write_str("WouldBlock"),
        }
    }
}
