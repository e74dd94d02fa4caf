//! Deduplicated, cached image fetching with fan-out delivery.
//!
//! A [`Service`] turns identifiers ([`Url`](url::Url)s) into decoded images.
//! Any number of tasks may ask for the same identifier at once; only one
//! transport fetch is ever made for it, and its outcome is broadcast to every
//! registered [`Listener`] as a [`Response`].
//!
//! # Architecture
//! - **Transport**: fetches raw bytes for an identifier. [`HttpTransport`]
//!   (feature `http`) is the production implementation.
//! - **Cache**: memory and disk tiers, selected by [`CachePolicy`]. The disk
//!   tier is any [`imgload_storage`] backend, usually a local directory.
//! - **Listeners**: held weakly and called in registration order for every
//!   response, whichever identifier it is for. [`PhaseWatch`] narrows that
//!   down to the state of a single identifier.
//!
//! Failures are delivered like successes, as a [`FetchError`] in the
//! response, and are never cached.
//!
//! [`HttpTransport`]: crate::transport::HttpTransport

mod artifact;
mod cache;
pub mod error;
mod inflight;
mod listener;
mod phase;
mod policy;
mod response;
mod service;
pub mod transport;

pub use crate::artifact::Artifact;
pub use crate::cache::{Cache, Cleared};
pub use crate::error::FetchError;
pub use crate::listener::{Listener, ListenerId, Subscription};
pub use crate::phase::{Phase, PhaseWatch};
pub use crate::policy::{CachePolicy, UnknownPolicy};
pub use crate::response::Response;
pub use crate::service::Service;
