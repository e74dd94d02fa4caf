//! Per-identifier load state for consumers that render one image.

use crate::listener::{Listener, Subscription};
use crate::{Artifact, FetchError, Response, Service};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

/// Where a single identifier's load has got to.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Phase {
    /// Nothing has arrived yet.
    #[default]
    Empty,
    Success(Artifact),
    Failure(FetchError),
}

impl Phase {
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Success(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Listener bound to one identifier, republishing its responses as a
/// [`Phase`].
struct PhaseListener {
    url: Url,
    phase: watch::Sender<Phase>,
}

impl Listener for PhaseListener {
    fn on_response(&self, response: &Response) {
        if response.url != self.url {
            return;
        }
        let phase = match &response.result {
            Ok(artifact) => Phase::Success(artifact.clone()),
            Err(error) => Phase::Failure(error.clone()),
        };
        self.phase.send_replace(phase);
    }
}

/// Watches the load state of one identifier.
///
/// Creating a `PhaseWatch` registers it with the service straight away, so
/// calling [`load`](Self::load) afterwards can never miss the response.
/// Dropping it unregisters.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use imgload_fetch::transport::{Transport, error::{ErrorKind, Result}};
/// use imgload_fetch::{Cache, FetchError, Phase, PhaseWatch, Service};
/// use std::sync::Arc;
/// use url::Url;
///
/// struct Offline;
///
/// #[async_trait]
/// impl Transport for Offline {
///     fn name(&self) -> &str {
///         "offline"
///     }
///
///     async fn fetch(&self, _url: &Url) -> Result<Vec<u8>> {
///         exn::bail!(ErrorKind::Network("network unreachable".to_string()))
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let service = Service::new(Arc::new(Offline), Cache::disabled());
/// let watch = PhaseWatch::new(&service, Url::parse("https://example.com/avatar.png").unwrap());
/// assert_eq!(watch.phase(), Phase::Empty);
/// watch.load().await;
/// assert!(matches!(watch.phase(), Phase::Failure(FetchError::RequestFailed(_))));
/// # }
/// ```
pub struct PhaseWatch {
    service: Service,
    url: Url,
    receiver: watch::Receiver<Phase>,
    _listener: Arc<PhaseListener>,
    _subscription: Subscription,
}

impl PhaseWatch {
    pub fn new(service: &Service, url: Url) -> Self {
        let (sender, receiver) = watch::channel(Phase::Empty);
        let listener = Arc::new(PhaseListener { url: url.clone(), phase: sender });
        let subscription = service.subscribe(&listener);
        Self { service: service.clone(), url, receiver, _listener: listener, _subscription: subscription }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Load the watched identifier; the outcome lands in [`phase`](Self::phase).
    pub async fn load(&self) {
        self.service.load(&self.url).await;
    }

    /// Start loading in the background.
    pub fn spawn_load(&self) -> tokio::task::JoinHandle<()> {
        self.service.spawn_load(self.url.clone())
    }

    /// The latest phase.
    pub fn phase(&self) -> Phase {
        self.receiver.borrow().clone()
    }

    /// A receiver notified on every phase change, for awaiting the outcome.
    pub fn receiver(&self) -> watch::Receiver<Phase> {
        self.receiver.clone()
    }
}
