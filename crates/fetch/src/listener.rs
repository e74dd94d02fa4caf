//! Fan-out of responses to registered listeners.
//!
//! The registry only holds weak references: registering a listener never
//! keeps it alive, and a listener that is dropped simply stops receiving
//! responses. Dead entries are pruned on the next broadcast.

use crate::Response;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Receives every [`Response`] the service broadcasts.
///
/// Responses for all identifiers are delivered to every listener; filter on
/// [`Response::url`] for the ones of interest. Callbacks run on whichever
/// task finished the load, so they should be quick and must not block.
/// They may call back into the service, including to start another load or
/// to unregister themselves.
///
/// Any `Fn(&Response) + Send + Sync` closure is a listener.
pub trait Listener: Send + Sync {
    fn on_response(&self, response: &Response);
}
impl<F> Listener for F
where
    F: Fn(&Response) + Send + Sync,
{
    fn on_response(&self, response: &Response) {
        self(response)
    }
}

/// Handle identifying one registration, used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Weakly-held set of listeners.
///
/// Ids increase monotonically, so broadcasting in id order delivers in
/// registration order.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: AtomicU64,
    entries: RwLock<BTreeMap<ListenerId, Weak<dyn Listener>>>,
}

impl Registry {
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ListenerId, Weak<dyn Listener>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ListenerId, Weak<dyn Listener>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener`.
    ///
    /// Registering a listener that is already present is a no-op returning
    /// its existing id.
    pub(crate) fn add<L: Listener + 'static>(&self, listener: &Arc<L>) -> ListenerId {
        let weak: Weak<dyn Listener> = Arc::downgrade(listener) as Weak<dyn Listener>;
        let mut entries = self.write();
        if let Some((id, _)) = entries.iter().find(|(_, existing)| Weak::ptr_eq(existing, &weak)) {
            return *id;
        }
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entries.insert(id, weak);
        id
    }

    /// Unregister by id, returning whether it was registered.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        self.write().remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.read().contains_key(&id)
    }

    /// Number of registrations whose listener is still alive.
    pub(crate) fn len(&self) -> usize {
        self.read().values().filter(|listener| listener.strong_count() > 0).count()
    }

    /// Deliver `response` to every live listener, returning how many got it.
    ///
    /// Listeners are called outside the lock, from a snapshot taken up front.
    /// One removed after the snapshot but before its turn is skipped; one
    /// added during the broadcast waits for the next response.
    pub(crate) fn broadcast(&self, response: &Response) -> usize {
        let snapshot: Vec<(ListenerId, Weak<dyn Listener>)> =
            self.read().iter().map(|(id, listener)| (*id, listener.clone())).collect();
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, listener) in snapshot {
            let Some(listener) = listener.upgrade() else {
                dead.push(id);
                continue;
            };
            if !self.contains(id) {
                continue;
            }
            listener.on_response(response);
            delivered += 1;
        }
        if !dead.is_empty() {
            let mut entries = self.write();
            for id in &dead {
                entries.remove(id);
            }
            tracing::trace!(pruned = dead.len(), "Pruned dropped listeners");
        }
        delivered
    }
}

/// Registration that is removed when dropped.
///
/// Returned by [`Service::subscribe`](crate::Service::subscribe). Outliving
/// the service is fine; dropping it then does nothing.
#[must_use = "dropping a subscription unregisters the listener immediately"]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<Registry>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, registry: &Arc<Registry>) -> Self {
        Self { id, registry: Arc::downgrade(registry) }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}
impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
