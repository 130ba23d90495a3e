//! Error taxonomy for the offheap layer.
//!
//! All errors are synchronous and local to the failing call. The only
//! silently-absorbed condition is a second `dispose`, which is an
//! intentional no-op, not an error.

use std::error::Error;
use std::fmt;

/// Errors from handle and pool operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryError {
    /// Operation attempted on a handle after `dispose()`.
    ///
    /// Recoverable: stop using the handle.
    Disposed,
    /// Buffer access outside `[0, len)`.
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Logical length of the buffer at the time of the access.
        len: usize,
    },
    /// `grow` called with a length that does not exceed the current one.
    InvalidGrow {
        /// Current logical length.
        current: usize,
        /// Requested new length.
        requested: usize,
    },
    /// `shrink` called with a length larger than the current one.
    InvalidShrink {
        /// Current logical length.
        current: usize,
        /// Requested new length.
        requested: usize,
    },
    /// The underlying allocator could not satisfy a request.
    ///
    /// Fatal for the requested operation; never retried internally.
    AllocationFailed {
        /// Size of the failed request in bytes.
        bytes: usize,
    },
    /// A required pointer argument was null.
    NullPointer,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed => {
                write!(f, "handle is disposed and its memory is no longer available")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::InvalidGrow { current, requested } => {
                write!(
                    f,
                    "grow requires a strictly larger length: current {current}, requested {requested}"
                )
            }
            Self::InvalidShrink { current, requested } => {
                write!(
                    f,
                    "shrink requires a length of at most the current one: current {current}, requested {requested}"
                )
            }
            Self::AllocationFailed { bytes } => {
                write!(f, "allocation of {bytes} bytes failed")
            }
            Self::NullPointer => write!(f, "required pointer argument was null"),
        }
    }
}

impl Error for MemoryError {}
