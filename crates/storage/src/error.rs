//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No blob is stored under the key
    #[display("entry not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Access denied by the filesystem
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Key is empty, contains a separator or a null byte, or is a dot entry
    #[display("invalid key: {_0:?}")]
    InvalidKey(#[error(not(source))] String),
    /// Root is relative, or exists but is not a directory
    #[display("invalid storage root: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::BackendError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::NotFound("abc".to_string()).to_string(), "entry not found: abc");
        assert_eq!(ErrorKind::InvalidKey("a/b".to_string()).to_string(), r#"invalid key: "a/b""#);
        assert_eq!(ErrorKind::InvalidRoot(PathBuf::from("relative")).to_string(), "invalid storage root: relative");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::NotFound("abc".to_string()).is_retryable());
        assert!(!ErrorKind::InvalidKey(String::new()).is_retryable());
        assert!(ErrorKind::Io(IoError::other("disk full")).is_retryable());
    }
}
