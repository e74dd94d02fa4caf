//! HTTP(S) transport backed by `reqwest`.

use super::Transport;
use super::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::time::Duration;
use tracing::instrument;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Fetches `http` and `https` identifiers.
///
/// Every request is bounded by the configured timeout, so a stalled server
/// can never keep an identifier in flight forever. Non-2xx responses are
/// failures carrying the status code.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}
impl HttpTransport {
    /// Build a transport with the given request timeout and user agent.
    pub fn new(timeout: Duration, user_agent: impl AsRef<str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.as_ref())
            .build()
            .or_raise(|| ErrorKind::Network("could not build HTTP client".to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Classify a reqwest failure, keeping it as the source of the raised error.
    fn raise<T>(result: reqwest::Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let kind = Self::map_error(&e);
                Err(e).or_raise(|| kind)
            },
        }
    }

    fn map_error(err: &reqwest::Error) -> ErrorKind {
        if err.is_timeout() {
            ErrorKind::Timeout
        } else if let Some(status) = err.status() {
            ErrorKind::Status(status.as_u16())
        } else {
            ErrorKind::Network(err.to_string())
        }
    }
}
impl Default for HttpTransport {
    fn default() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            // Only fails when the TLS backend cannot initialise; fall back to
            // reqwest's own defaults rather than panicking.
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all, fields(url = %url, status, bytes))]
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        if !matches!(url.scheme(), "http" | "https") {
            exn::bail!(ErrorKind::UnsupportedScheme(url.scheme().to_string()));
        }
        let response = Self::raise(self.client.get(url.clone()).send().await)?;
        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        let body = Self::raise(response.bytes().await)?;
        tracing::Span::current().record("bytes", body.len());
        Ok(body.to_vec())
    }
}
