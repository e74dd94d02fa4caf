//! Volatile, optionally bounded image tier.

use crate::Artifact;
use imgload_storage::StorageKey;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Least-recently-used map from storage key to decoded image.
///
/// With a capacity, inserting past it evicts the entry that was looked up
/// or inserted longest ago. Without one, nothing is ever evicted.
pub(crate) struct MemoryStore {
    entries: LruCache<StorageKey, Artifact>,
}

impl MemoryStore {
    pub(crate) fn new(capacity: Option<NonZeroUsize>) -> Self {
        let entries = match capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self { entries }
    }

    /// Look up an entry, marking it as most recently used.
    pub(crate) fn get(&mut self, key: &StorageKey) -> Option<Artifact> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn insert(&mut self, key: StorageKey, artifact: Artifact) {
        if let Some((evicted, _)) = self.entries.push(key, artifact)
            && !self.entries.contains(&evicted)
        {
            tracing::trace!(key = %evicted, "Evicted least recently used image from memory");
        }
    }

    /// Drop every entry, returning how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::png_bytes;

    fn artifact(shade: u8) -> Artifact {
        Artifact::decode(&png_bytes(1, 1, [shade, shade, shade])).unwrap()
    }

    #[test]
    fn test_unbounded_keeps_everything() {
        let mut store = MemoryStore::new(None);
        for i in 0..100u8 {
            store.insert(StorageKey::derive([i]), artifact(i));
        }
        assert_eq!(store.len(), 100);
        assert_eq!(store.get(&StorageKey::derive([0])).unwrap(), artifact(0));
    }

    #[test]
    fn test_bounded_evicts_least_recently_used() {
        let mut store = MemoryStore::new(NonZeroUsize::new(2));
        let (a, b, c) = (StorageKey::derive("a"), StorageKey::derive("b"), StorageKey::derive("c"));
        store.insert(a.clone(), artifact(1));
        store.insert(b.clone(), artifact(2));
        // Touch `a` so that `b` becomes the eviction candidate.
        assert!(store.get(&a).is_some());
        store.insert(c.clone(), artifact(3));
        assert_eq!(store.len(), 2);
        assert!(store.get(&a).is_some());
        assert!(store.get(&b).is_none());
        assert!(store.get(&c).is_some());
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut store = MemoryStore::new(NonZeroUsize::new(1));
        let key = StorageKey::derive("a");
        store.insert(key.clone(), artifact(1));
        store.insert(key.clone(), artifact(2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).unwrap(), artifact(2));
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryStore::new(None);
        store.insert(StorageKey::derive("a"), artifact(1));
        store.insert(StorageKey::derive("b"), artifact(2));
        assert_eq!(store.clear(), 2);
        assert_eq!(store.len(), 0);
        assert!(store.get(&StorageKey::derive("a")).is_none());
    }
}
