//! Transport trait and implementations.
//!
//! A transport turns an identifier into raw bytes, or a failure. The service
//! makes no assumption about HTTP semantics: anything that can fetch bytes
//! for a URL satisfies the contract.

pub mod error;
#[cfg(feature = "http")]
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(feature = "http")]
pub use self::http::HttpTransport;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockReply, MockTransport, png_bytes};
use self::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

pub type TransportHandle = Arc<dyn Transport + Send + Sync>;

/// Fetches raw bytes for an identifier.
///
/// Implementations carry their own timeout policy; the service never
/// cancels a fetch it has started.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use imgload_fetch::transport::{Transport, error::{ErrorKind, Result}};
/// use url::Url;
///
/// /// Serves every identifier from one embedded blob.
/// struct Embedded(&'static [u8]);
///
/// #[async_trait]
/// impl Transport for Embedded {
///     fn name(&self) -> &str {
///         "embedded"
///     }
///
///     async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
///         if url.scheme() != "embedded" {
///             exn::bail!(ErrorKind::UnsupportedScheme(url.scheme().to_string()));
///         }
///         Ok(self.0.to_vec())
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name of the transport, used for logging only.
    fn name(&self) -> &str;

    /// Fetch the raw bytes behind `url`.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}
