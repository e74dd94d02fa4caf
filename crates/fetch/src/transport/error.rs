//! Transport Error Types

use derive_more::{Display, Error};

/// A transport error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a transport could not produce bytes.
///
/// Cloneable so that the cause can be handed to every listener of a failed
/// request.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection-level failure (DNS, refused, reset, unreachable, ...).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The server answered, but not with a success status.
    #[display("HTTP status {_0}")]
    Status(#[error(not(source))] u16),
    /// The request did not complete in time.
    #[display("request timed out")]
    Timeout,
    /// The transport does not know how to fetch this kind of identifier.
    #[display("unsupported scheme: {_0}")]
    UnsupportedScheme(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Status(code) => *code == 408 || *code == 429 || *code >= 500,
            Self::UnsupportedScheme(_) => false,
        }
    }
}
