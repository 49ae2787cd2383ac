//! RAII guard for marking a socket unreliable after a partial multi-step
//! operation.
//!
//! # The Problem
//!
//! A multipart receive consumes frames one native call at a time. If a later
//! frame fails after earlier ones were taken off the wire, the socket may
//! still hold the tail of that message. The native engine has no way to
//! abort mid-sequence, so the next receive could start in the middle of a
//! message.
//!
//! # The Solution
//!
//! 1. `PoisonGuard::new()` sets the flag to `true` (assume failure)
//! 2. If the guard is dropped (error return, panic), the flag stays `true`
//! 3. `disarm()` after the whole sequence succeeded restores the flag to
//!    the value it had before the guard was armed
//!
//! The flag is sticky: once set by a failed sequence, a later successful
//! sequence does not clear it. Only the owner replacing the socket does.
//!
//! # Example
//!
//! ```rust
//! use sluice_core::poison::PoisonGuard;
//!
//! let mut poisoned = false;
//! {
//!     let guard = PoisonGuard::new(&mut poisoned);
//!     // ... every frame received ...
//!     guard.disarm();
//! }
//! assert!(!poisoned);
//! ```

/// A RAII guard that marks a socket as poisoned unless disarmed.
pub struct PoisonGuard<'a> {
    flag: &'a mut bool,
    prior: bool,
}

impl<'a> PoisonGuard<'a> {
    /// Arm the guard, immediately marking the socket as poisoned.
    #[inline]
    pub fn new(flag: &'a mut bool) -> Self {
        let prior = *flag;
        *flag = true;
        Self { flag, prior }
    }

    /// Disarm the guard after the whole operation completed.
    ///
    /// A socket that was already poisoned stays poisoned.
    #[inline]
    pub fn disarm(self) {
        *self.flag = self.prior;
    }
}
