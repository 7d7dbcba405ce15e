//! Error handling for passthrough operations.
//!
//! The adapter has a single error kind: a host filesystem error carrying the
//! host's error number. Nothing is validated or recovered locally, so every
//! failure a handler returns is exactly what the host reported. The bridge
//! sees the number negated (see [`BridgeStatus`]).

use nix::errno::Errno;
use std::io;
use thiserror::Error;

/// Errors returned by passthrough handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PassError {
    /// The host filesystem call failed with this error number.
    #[error("host filesystem error: {0}")]
    Host(Errno),
}

impl PassError {
    /// Creates an error from a raw host error number.
    pub fn from_raw(errno: i32) -> Self {
        PassError::Host(Errno::from_raw(errno))
    }

    /// Returns the host error number.
    pub fn errno(&self) -> Errno {
        match self {
            PassError::Host(e) => *e,
        }
    }

    /// Converts this error to a positive libc error code.
    pub fn to_errno(&self) -> i32 {
        self.errno() as i32
    }

    /// Returns the negated error number handed back to the bridge.
    pub fn code(&self) -> i32 {
        -self.to_errno()
    }
}

/// Result type for passthrough operations.
pub type PassResult<T> = Result<T, PassError>;

/// Converts an I/O error to a POSIX errno value.
///
/// This extracts the raw OS error if available, otherwise returns `EIO`.
#[inline]
pub fn io_error_to_errno(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for io::Error {
    fn to_errno(&self) -> i32 {
        io_error_to_errno(self)
    }
}

impl ToErrno for Errno {
    fn to_errno(&self) -> i32 {
        *self as i32
    }
}

impl ToErrno for PassError {
    fn to_errno(&self) -> i32 {
        PassError::to_errno(self)
    }
}

impl From<io::Error> for PassError {
    fn from(e: io::Error) -> Self {
        PassError::from_raw(io_error_to_errno(&e))
    }
}

impl From<Errno> for PassError {
    fn from(e: Errno) -> Self {
        PassError::Host(e)
    }
}

impl From<PassError> for io::Error {
    fn from(e: PassError) -> Self {
        io::Error::from_raw_os_error(e.to_errno())
    }
}

/// Signed-integer status convention expected by the bridge.
///
/// Zero or a positive value means success (a byte count where the operation
/// produces one); a negative value is a host error number, negated.
pub trait BridgeStatus {
    /// Collapses the result into the bridge's signed status.
    fn into_status(self) -> i64;
}

impl BridgeStatus for PassResult<()> {
    fn into_status(self) -> i64 {
        match self {
            Ok(()) => 0,
            Err(e) => i64::from(e.code()),
        }
    }
}

impl BridgeStatus for PassResult<usize> {
    fn into_status(self) -> i64 {
        match self {
            Ok(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Err(e) => i64::from(e.code()),
        }
    }
}
