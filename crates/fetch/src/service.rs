//! The fetch service.

use crate::cache::{Cache, Cleared};
use crate::inflight::{InFlight, InFlightGuard};
use crate::listener::{Listener, ListenerId, Registry, Subscription};
use crate::transport::TransportHandle;
use crate::{Artifact, CachePolicy, FetchError, Response};
use std::sync::Arc;
use tracing::{Instrument, instrument};
use url::Url;

/// Loads images on behalf of any number of concurrent callers.
///
/// Each [`load`](Self::load) ends with one [`Response`] broadcast to every
/// registered [`Listener`], unless the identifier was already in flight, in
/// which case the call is absorbed by the fetch already running and the
/// response of that fetch is the only one delivered. The transport is never
/// asked for the same identifier twice at the same time.
///
/// Listeners must be registered *before* calling `load`: responses are not
/// replayed, so a listener added after a load started may miss its outcome.
///
/// Cloning is cheap and every clone drives the same caches, in-flight set
/// and listeners.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

struct Inner {
    cache: Cache,
    transport: TransportHandle,
    in_flight: InFlight,
    listeners: Arc<Registry>,
}

impl Service {
    pub fn new(transport: TransportHandle, cache: Cache) -> Self {
        tracing::debug!(transport = transport.name(), policy = %cache.policy(), "Starting fetch service");
        Self {
            inner: Arc::new(Inner {
                cache,
                transport,
                in_flight: InFlight::default(),
                listeners: Arc::new(Registry::default()),
            }),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.inner.cache.policy()
    }

    pub fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    /// Load `url` and broadcast the outcome.
    ///
    /// Resolution order is cache, then transport. A cache hit is broadcast
    /// straight away. Otherwise, if a fetch for `url` is already running this
    /// returns immediately without broadcasting anything; if not, it fetches,
    /// decodes, writes the image back to the cache, and broadcasts the result.
    /// Failures are never cached, so a later `load` tries again.
    ///
    /// The fetch runs on its own task. Dropping or aborting this future only
    /// stops waiting for it: the fetch still completes and is broadcast, so
    /// callers absorbed into it are never left without a response.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn load(&self, url: &Url) {
        if let Some(artifact) = self.inner.cache.lookup(url).await {
            tracing::debug!("Serving image from cache");
            self.broadcast(Response::success(url.clone(), artifact));
            return;
        }
        let Some(guard) = self.inner.in_flight.begin(url) else {
            tracing::trace!("Fetch already in flight; waiting on its response");
            return;
        };
        let service = self.clone();
        let url = url.clone();
        let resolving = tokio::spawn(async move { service.resolve(url, guard).await }.in_current_span());
        if let Err(err) = resolving.await {
            tracing::warn!(error = %err, "Fetch task did not complete");
        }
    }

    async fn resolve(&self, url: Url, guard: InFlightGuard) {
        let result = self.fetch(&url).await;
        if let Ok(artifact) = &result {
            self.inner.cache.store(&url, artifact).await;
        }
        // Out of the in-flight set before anyone hears about it, so a
        // listener reacting with another `load` is never absorbed.
        drop(guard);
        self.broadcast(Response { url, result });
    }

    async fn fetch(&self, url: &Url) -> Result<Artifact, FetchError> {
        let transport = &self.inner.transport;
        let bytes = match transport.fetch(url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(transport = transport.name(), error = ?err, "Fetch failed");
                return Err(FetchError::RequestFailed((*err).clone()));
            },
        };
        let size = bytes.len();
        match tokio::task::spawn_blocking(move || Artifact::decode(&bytes)).await {
            Ok(Ok(artifact)) => {
                tracing::info!(size, width = artifact.width(), height = artifact.height(), "Fetched image");
                Ok(artifact)
            },
            Ok(Err(err)) => {
                tracing::warn!(size, error = ?err, "Fetched data is not a valid image");
                Err(FetchError::InvalidData)
            },
            Err(err) => {
                tracing::warn!(size, error = %err, "Decoding fetched data panicked");
                Err(FetchError::InvalidData)
            },
        }
    }

    /// Run [`load`](Self::load) on a new task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_load(&self, url: Url) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move { service.load(&url).await })
    }

    /// Whether a transport fetch for `url` is currently running.
    pub fn is_loading(&self, url: &Url) -> bool {
        self.inner.in_flight.contains(url)
    }

    /// Register a listener for every future response.
    ///
    /// Only a weak reference is kept: the caller owns the listener, and once
    /// it is dropped it stops receiving responses. Adding the same listener
    /// again is a no-op that returns the original id.
    pub fn add_listener<L: Listener + 'static>(&self, listener: &Arc<L>) -> ListenerId {
        let id = self.inner.listeners.add(listener);
        tracing::debug!(listener = %id, "Listener added");
        id
    }

    /// Unregister a listener, returning whether it was registered.
    ///
    /// Takes effect for broadcasts already under way: a listener removed
    /// before its turn is not called.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.inner.listeners.remove(id);
        if removed {
            tracing::debug!(listener = %id, "Listener removed");
        }
        removed
    }

    /// Register a listener until the returned [`Subscription`] is dropped.
    pub fn subscribe<L: Listener + 'static>(&self, listener: &Arc<L>) -> Subscription {
        Subscription::new(self.add_listener(listener), &self.inner.listeners)
    }

    /// Number of registered listeners that are still alive.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Empty the cache tiers selected by the policy.
    ///
    /// Fetches already in flight are left alone and will repopulate the
    /// cache when they finish.
    pub async fn clear_cache(&self) -> Cleared {
        self.inner.cache.clear().await
    }

    fn broadcast(&self, response: Response) {
        let delivered = self.inner.listeners.broadcast(&response);
        tracing::trace!(success = response.is_success(), delivered, "Response broadcast");
    }
}
