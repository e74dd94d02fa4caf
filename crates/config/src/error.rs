//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Explicitly requested configuration file does not exist
    #[display("configuration file not found: {}", _0.display())]
    FileNotFound(#[error(not(source))] PathBuf),
    /// Configuration file extension is not one of toml, yaml, yml or json
    #[display("unsupported configuration format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// Merged configuration could not be deserialized
    #[display("invalid configuration")]
    Invalid,
    /// No platform directory to default the cache location to
    #[display("could not determine a cache directory; set cache.directory explicitly")]
    NoCacheDirectory,
}
