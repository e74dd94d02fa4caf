//! Tracking of identifiers with a fetch outstanding.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

/// Set of identifiers currently being fetched.
///
/// Membership is only ever taken through [`begin`](Self::begin), which hands
/// back a guard; the identifier leaves the set when that guard is dropped,
/// whichever way the fetch ends.
#[derive(Debug, Default, Clone)]
pub(crate) struct InFlight {
    urls: Arc<Mutex<HashSet<Url>>>,
}

impl InFlight {
    fn urls(&self) -> MutexGuard<'_, HashSet<Url>> {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically claim `url`.
    ///
    /// Returns `None` if another caller already holds it.
    pub(crate) fn begin(&self, url: &Url) -> Option<InFlightGuard> {
        if !self.urls().insert(url.clone()) {
            return None;
        }
        Some(InFlightGuard { set: self.clone(), url: url.clone() })
    }

    pub(crate) fn contains(&self, url: &Url) -> bool {
        self.urls().contains(url)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.urls().len()
    }
}

/// Claim on one in-flight identifier, released on drop.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    set: InFlight,
    url: Url,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.urls().remove(&self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("https://example.com/").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_begin_is_exclusive() {
        let in_flight = InFlight::default();
        let guard = in_flight.begin(&url("a.png"));
        assert!(guard.is_some());
        assert!(in_flight.begin(&url("a.png")).is_none());
        assert!(in_flight.contains(&url("a.png")));
        // Other identifiers are independent.
        assert!(in_flight.begin(&url("b.png")).is_some());
    }

    #[test]
    fn test_drop_releases() {
        let in_flight = InFlight::default();
        let guard = in_flight.begin(&url("a.png")).unwrap();
        assert_eq!(in_flight.len(), 1);
        drop(guard);
        assert!(!in_flight.contains(&url("a.png")));
        assert_eq!(in_flight.len(), 0);
        assert!(in_flight.begin(&url("a.png")).is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let in_flight = InFlight::default();
        let cloned = in_flight.clone();
        let outcome = std::thread::spawn(move || {
            let _guard = cloned.begin(&url("a.png")).unwrap();
            panic!("fetch blew up");
        })
        .join();
        assert!(outcome.is_err());
        assert!(!in_flight.contains(&url("a.png")));
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let in_flight = InFlight::default();
        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| in_flight.begin(&url("a.png")).map(std::mem::forget).is_some()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).filter(|won| *won).count()
        });
        assert_eq!(winners, 1);
        assert!(in_flight.contains(&url("a.png")));
    }
}
