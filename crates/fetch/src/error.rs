//! Fetch Error Types
//!
//! Two families live here. [`ErrorKind`] (wrapped in `exn` for location
//! tracking) covers construction and codec failures that are returned to a
//! direct caller. [`FetchError`] is the per-request failure delivered to
//! listeners inside a [`Response`](crate::Response); it is cloned to every
//! listener, so it carries plain data rather than an error tree.

use crate::transport::error::ErrorKind as TransportErrorKind;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A fetch-crate error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch-crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Configuration Errors
/// The service cannot run with these; they are returned at construction.
/// - [`ErrorKind::CacheDirectory`]
/// - [`ErrorKind::MissingDiskStore`]
///
/// ### Codec Errors
/// - [`ErrorKind::Decode`]
/// - [`ErrorKind::Encode`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The disk cache directory could not be created or is not a directory.
    #[display("unusable cache directory: {}", _0.display())]
    CacheDirectory(#[error(not(source))] PathBuf),
    /// Disk caching was requested without a storage backend to cache into.
    #[display("disk cache policy requires a storage backend")]
    MissingDiskStore,
    /// Bytes did not decode into an image.
    #[display("invalid image data")]
    Decode,
    /// An image could not be encoded for the disk tier.
    #[display("image encoding failed")]
    Encode,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Why a single `load` failed, as reported to listeners.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The transport returned bytes that are not a decodable image.
    #[display("invalid image data")]
    InvalidData,
    /// The transport itself failed.
    #[display("request failed: {_0}")]
    RequestFailed(#[error(not(source))] TransportErrorKind),
}

impl FetchError {
    /// Returns `true` if loading the same identifier again might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidData => false,
            Self::RequestFailed(cause) => cause.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display() {
        assert_eq!(FetchError::InvalidData.to_string(), "invalid image data");
        assert_eq!(
            FetchError::RequestFailed(TransportErrorKind::Network("network unreachable".to_string())).to_string(),
            "request failed: network error: network unreachable"
        );
        assert_eq!(FetchError::RequestFailed(TransportErrorKind::Status(404)).to_string(), "request failed: HTTP status 404");
    }

    #[test]
    fn fetch_error_retryable() {
        assert!(!FetchError::InvalidData.is_retryable());
        assert!(FetchError::RequestFailed(TransportErrorKind::Timeout).is_retryable());
        assert!(!FetchError::RequestFailed(TransportErrorKind::Status(404)).is_retryable());
        assert!(FetchError::RequestFailed(TransportErrorKind::Status(503)).is_retryable());
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::CacheDirectory(PathBuf::from("/nope")).to_string(),
            "unusable cache directory: /nope"
        );
        assert_eq!(ErrorKind::MissingDiskStore.to_string(), "disk cache policy requires a storage backend");
    }
}
