//! Error handling for kind and heap operations.

use std::result;

use thiserror::Error;

/// A specialized `Result` type for kind and heap operations.
pub type Result<T> = result::Result<T, Error>;

/// Number of bytes [`error_message`] will write at most, terminator included.
pub const ERROR_MESSAGE_SIZE: usize = 128;

/// Errors that can occur during kind and heap operations.
///
/// This is a closed set: every failure the library reports is one of these
/// variants, and each maps to a stable negative integer via [`Error::code`]
/// so callers working in terms of raw status codes can round-trip them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The kind targets memory this system does not currently offer.
    #[error("kind is not available on this system")]
    Unavailable,

    /// The mbind syscall rejected the requested placement.
    #[error("mbind placement failed (errno {0})")]
    Mbind(i32),

    /// The requested alignment is not a power of two at least pointer-sized.
    #[error("invalid alignment for posix_memalign")]
    Alignment,

    /// The backend allocator could not satisfy the request.
    #[error("backend allocation failed")]
    Malloc,

    /// The placement environment is misconfigured.
    #[error("invalid MEMBIND_HBW_NODES environment setting")]
    Environ,

    /// An argument is out of range or otherwise malformed.
    #[error("invalid argument")]
    Invalid,

    /// A kind with the requested name already exists.
    #[error("kind name is already registered")]
    RepeatedName,

    /// The registry already holds the maximum number of kinds.
    #[error("maximum number of kinds exceeded")]
    TooMany,

    /// One-time kind initialization could not be performed.
    #[error("kind initialization failed")]
    Threading,

    /// Internal runtime failure, including any call made after finalize.
    #[error("internal runtime failure")]
    Runtime,
}

impl Error {
    /// Stable negative status code for this error.
    #[inline]
    pub fn code(&self) -> i32 {
        match self {
            Error::Unavailable => -1,
            Error::Mbind(_) => -2,
            Error::Alignment => -3,
            Error::Malloc => -5,
            Error::Environ => -11,
            Error::Invalid => -12,
            Error::RepeatedName => -13,
            Error::TooMany => -14,
            Error::Threading => -15,
            Error::Runtime => -255,
        }
    }

    /// Map a status code back to its error, if the code is one we issue.
    ///
    /// Payload-carrying variants come back with an empty payload; the code
    /// alone identifies the class.
    pub fn from_code(code: i32) -> Option<Error> {
        match code {
            -1 => Some(Error::Unavailable),
            -2 => Some(Error::Mbind(0)),
            -3 => Some(Error::Alignment),
            -5 => Some(Error::Malloc),
            -11 => Some(Error::Environ),
            -12 => Some(Error::Invalid),
            -13 => Some(Error::RepeatedName),
            -14 => Some(Error::TooMany),
            -15 => Some(Error::Threading),
            -255 => Some(Error::Runtime),
            _ => None,
        }
    }
}

impl From<Error> for i32 {
    #[inline]
    fn from(err: Error) -> i32 {
        err.code()
    }
}

/// Format a status code as a human-readable message into `msg`.
///
/// At most `msg.len()` bytes are written and the output is always
/// NUL-terminated when `msg` is non-empty; longer messages are truncated.
/// Buffers of [`ERROR_MESSAGE_SIZE`] bytes never truncate.
pub fn error_message(err: i32, msg: &mut [u8]) {
    if msg.is_empty() {
        return;
    }
    let text = match Error::from_code(err) {
        Some(e) => format!("membind: {}", e),
        None => format!("membind: undefined error code {}", err),
    };
    let n = text.len().min(msg.len() - 1);
    msg[..n].copy_from_slice(&text.as_bytes()[..n]);
    msg[n] = 0;
}
