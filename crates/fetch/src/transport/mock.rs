//! Scripted transport for testing.

use super::Transport;
use super::error::{ErrorKind, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use url::Url;

/// What a [`MockTransport`] answers for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Bytes(Vec<u8>),
    Failure(ErrorKind),
}

/// Scripted transport for testing.
///
/// Replies are configured per URL; anything unscripted fails with a 404.
/// Every call is counted, and the transport can be paused so that fetches
/// stay in flight until the test [resumes](Self::resume) it.
///
/// # Examples
///
/// ```
/// use imgload_fetch::transport::{MockTransport, Transport, png_bytes};
/// use url::Url;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let url = Url::parse("https://example.com/a.png").unwrap();
/// let transport = MockTransport::default().with_bytes(url.clone(), png_bytes(2, 2, [255, 0, 0]));
/// assert!(transport.fetch(&url).await.is_ok());
/// assert_eq!(transport.calls(&url), 1);
/// # }
/// ```
pub struct MockTransport {
    replies: Mutex<HashMap<Url, MockReply>>,
    calls: watch::Sender<HashMap<Url, usize>>,
    paused: watch::Sender<bool>,
}

impl MockTransport {
    /// Script a successful reply.
    pub fn with_bytes(self, url: Url, bytes: impl Into<Vec<u8>>) -> Self {
        self.set_reply(url, MockReply::Bytes(bytes.into()));
        self
    }

    /// Script a failed reply.
    pub fn with_failure(self, url: Url, kind: ErrorKind) -> Self {
        self.set_reply(url, MockReply::Failure(kind));
        self
    }

    /// Replace the scripted reply for `url`.
    pub fn set_reply(&self, url: Url, reply: MockReply) {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner).insert(url, reply);
    }

    /// Hold every fetch (including ones already waiting) until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// How many times `url` has been fetched, including fetches still paused.
    pub fn calls(&self, url: &Url) -> usize {
        self.calls.borrow().get(url).copied().unwrap_or(0)
    }

    /// Total number of fetches across all URLs.
    pub fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }

    /// Wait until `url` has been fetched at least `count` times.
    pub async fn wait_for_calls(&self, url: &Url, count: usize) {
        let mut calls = self.calls.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        _ = calls.wait_for(|calls| calls.get(url).copied().unwrap_or(0) >= count).await;
    }
}
impl Default for MockTransport {
    fn default() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            calls: watch::Sender::new(HashMap::new()),
            paused: watch::Sender::new(false),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        self.calls.send_modify(|calls| *calls.entry(url.clone()).or_default() += 1);
        let mut paused = self.paused.subscribe();
        _ = paused.wait_for(|paused| !*paused).await;
        let reply = self.replies.lock().unwrap_or_else(PoisonError::into_inner).get(url).cloned();
        match reply {
            Some(MockReply::Bytes(bytes)) => Ok(bytes),
            Some(MockReply::Failure(kind)) => exn::bail!(kind),
            None => exn::bail!(ErrorKind::Status(404)),
        }
    }
}

/// Encode a solid-colour PNG, for use as a valid transport payload.
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)));
    let mut bytes = Cursor::new(Vec::new());
    // Writing into a Vec cannot fail for a well-formed in-memory image.
    if let Err(err) = image.write_to(&mut bytes, ImageFormat::Png) {
        panic!("png_bytes: encoding a test image failed: {err}");
    }
    bytes.into_inner()
}
