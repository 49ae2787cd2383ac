/// Sluice Error Types
///
/// Genuine failures only. "Would block" is not an error and is carried by
/// [`Outcome::WouldBlock`](crate::outcome::Outcome) instead.

use thiserror::Error;

/// Main error type for Sluice operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SluiceError {
    /// A native engine call failed with the given errno
    #[error("native error {code}: {message}")]
    Native { code: i32, message: String },

    /// Native message initialization failed
    ///
    /// Any release registration made for the message has already been rolled
    /// back when this is returned.
    #[error("native message init failed ({code}): {message}")]
    NativeInit { code: i32, message: String },

    /// Operation on a closed or uninitialized handle
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Requested size does not fit in the supplied region
    #[error("requested size {requested} exceeds region of {available} bytes")]
    Size { requested: usize, available: usize },

    /// A multipart receive failed after at least one frame was consumed
    #[error(
        "multipart receive failed after {frames_received} frame(s) ({code}: {message}); \
         socket may hold a partial message and should be closed"
    )]
    MultipartIncomplete {
        frames_received: usize,
        code: i32,
        message: String,
    },

    /// Index is not a live slot
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Malformed input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for Sluice operations
pub type Result<T> = std::result::Result<T, SluiceError>;

impl SluiceError {
    /// Create a native error from an errno and its description
    pub fn native(code: i32, message: impl Into<String>) -> Self {
        Self::Native {
            code,
            message: message.into(),
        }
    }

    /// Create an invalid argument error with a message
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// The underlying native errno, if this error came from the engine.
    #[must_use]
    pub const fn native_code(&self) -> Option<i32> {
        match self {
            Self::Native { code, .. }
            | Self::NativeInit { code, .. }
            | Self::MultipartIncomplete { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if the socket that produced this error may hold a partial message
    #[must_use]
    pub const fn leaves_socket_unreliable(&self) -> bool {
        matches!(self, Self::MultipartIncomplete { .. })
    }
}
