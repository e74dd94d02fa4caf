//! Two-tier image cache.
//!
//! The [`Cache`] decides, per [`CachePolicy`], which tiers a lookup consults
//! and which tiers a freshly fetched image is written back to:
//!
//! | policy   | lookup                              | store                   |
//! |----------|-------------------------------------|-------------------------|
//! | `None`   | always a miss                       | no-op                   |
//! | `Memory` | memory                              | memory                  |
//! | `Disk`   | memory, then disk (promoted on hit) | disk, then memory       |
//!
//! Everything here is best-effort. A tier that fails to read is a miss, a
//! tier that fails to write is simply not populated; neither ever turns a
//! successful fetch into a failed one.

mod memory;

use self::memory::MemoryStore;
use crate::error::{ErrorKind, Result};
use crate::{Artifact, CachePolicy};
use exn::ResultExt;
use imgload_storage::backend::LocalBackend;
use imgload_storage::error::ErrorKind as StorageErrorKind;
use imgload_storage::{BackendHandle, StorageKey};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;
use url::Url;

/// Counts from a [`Cache::clear`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cleared {
    /// Images dropped from memory.
    pub memory: usize,
    /// Disk entries deleted.
    pub disk_removed: usize,
    /// Disk entries that could not be listed or deleted.
    pub disk_failed: usize,
}

/// Coordinates the memory and disk tiers according to a [`CachePolicy`].
pub struct Cache {
    policy: CachePolicy,
    memory: Mutex<MemoryStore>,
    disk: Option<BackendHandle>,
}

impl Cache {
    /// Build a cache over an existing disk backend.
    ///
    /// The backend is only used under [`CachePolicy::Disk`], where it is
    /// required; under any other policy it is ignored.
    pub fn new(policy: CachePolicy, memory_capacity: Option<NonZeroUsize>, disk: Option<BackendHandle>) -> Result<Self> {
        let disk = match (policy, disk) {
            (CachePolicy::Disk, None) => exn::bail!(ErrorKind::MissingDiskStore),
            (CachePolicy::Disk, Some(disk)) => Some(disk),
            (_, Some(disk)) => {
                tracing::debug!(%policy, backend = disk.name(), "Ignoring disk backend for non-disk cache policy");
                None
            },
            (_, None) => None,
        };
        Ok(Self { policy, memory: Mutex::new(MemoryStore::new(memory_capacity)), disk })
    }

    /// Build a cache whose disk tier (if the policy has one) is a local
    /// directory, created if missing.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::CacheDirectory`] if the directory cannot be created or
    /// used. The service cannot run without its cache root, so this is meant
    /// to be treated as fatal by the caller.
    pub fn local(policy: CachePolicy, memory_capacity: Option<NonZeroUsize>, directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        let disk: Option<BackendHandle> = if policy.uses_disk() {
            let backend =
                LocalBackend::new("disk", directory).or_raise(|| ErrorKind::CacheDirectory(directory.to_path_buf()))?;
            Some(Arc::new(backend))
        } else {
            None
        };
        Self::new(policy, memory_capacity, disk)
    }

    /// A cache with every tier disabled.
    pub fn disabled() -> Self {
        Self { policy: CachePolicy::None, memory: Mutex::new(MemoryStore::new(None)), disk: None }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// The disk backend, when the policy caches to disk.
    pub fn disk(&self) -> Option<&BackendHandle> {
        self.disk.as_ref()
    }

    /// Number of images currently held in memory.
    pub fn memory_len(&self) -> usize {
        self.memory().len()
    }

    fn memory(&self) -> MutexGuard<'_, MemoryStore> {
        // Nothing in the store can be left half-updated by a panic.
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find a cached image for `url`.
    #[instrument(skip_all, fields(url = %url, policy = %self.policy, tier))]
    pub async fn lookup(&self, url: &Url) -> Option<Artifact> {
        if !self.policy.uses_memory() {
            return None;
        }
        let key = StorageKey::derive(url.as_str());
        if let Some(artifact) = self.memory().get(&key) {
            tracing::Span::current().record("tier", "memory");
            return Some(artifact);
        }
        let disk = self.disk.as_ref()?;
        let bytes = match disk.read(&key).await {
            Ok(bytes) => bytes,
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => return None,
            Err(err) => {
                tracing::warn!(%key, error = ?err, "Could not read disk cache entry; treating as a miss");
                return None;
            },
        };
        let artifact = match tokio::task::spawn_blocking(move || Artifact::decode(&bytes)).await {
            Ok(Ok(artifact)) => artifact,
            Ok(Err(err)) => {
                tracing::warn!(%key, error = ?err, "Disk cache entry is not a valid image; discarding");
                if let Err(err) = disk.delete(&key).await {
                    tracing::debug!(%key, error = ?err, "Could not discard invalid disk cache entry");
                }
                return None;
            },
            Err(err) => {
                tracing::warn!(%key, error = %err, "Decoding disk cache entry panicked; treating as a miss");
                return None;
            },
        };
        tracing::Span::current().record("tier", "disk");
        self.memory().insert(key, artifact.clone());
        Some(artifact)
    }

    /// Write a freshly fetched image back to the policy's tiers.
    ///
    /// Under [`CachePolicy::Disk`] the memory tier is only populated once the
    /// disk write has succeeded, so memory never holds an image that disk
    /// does not.
    #[instrument(skip_all, fields(url = %url, policy = %self.policy))]
    pub async fn store(&self, url: &Url, artifact: &Artifact) {
        if !self.policy.uses_memory() {
            return;
        }
        let key = StorageKey::derive(url.as_str());
        if let Some(disk) = &self.disk {
            let encoding = artifact.clone();
            let bytes = match tokio::task::spawn_blocking(move || encoding.encode()).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(err)) => {
                    tracing::warn!(%key, error = ?err, "Could not encode image for disk cache; not caching");
                    return;
                },
                Err(err) => {
                    tracing::warn!(%key, error = %err, "Encoding image for disk cache panicked; not caching");
                    return;
                },
            };
            if let Err(err) = disk.write(&key, &bytes).await {
                tracing::warn!(%key, error = ?err, "Could not write disk cache entry; not caching");
                return;
            }
        }
        self.memory().insert(key, artifact.clone());
    }

    /// Empty memory and, when the policy caches to disk, every disk entry.
    ///
    /// Per-entry disk failures are logged and counted, never fatal.
    #[instrument(skip_all, fields(policy = %self.policy))]
    pub async fn clear(&self) -> Cleared {
        let mut cleared = Cleared { memory: self.memory().clear(), ..Cleared::default() };
        if let Some(disk) = &self.disk {
            match disk.clear().await {
                Ok(summary) => {
                    cleared.disk_removed = summary.removed;
                    cleared.disk_failed = summary.failed;
                },
                Err(err) => tracing::warn!(backend = disk.name(), error = ?err, "Could not clear disk cache"),
            }
        }
        tracing::info!(
            memory = cleared.memory,
            disk_removed = cleared.disk_removed,
            disk_failed = cleared.disk_failed,
            "Cache cleared"
        );
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::png_bytes;
    use imgload_storage::backend::MockBackend;
    use imgload_storage::{StorageBackend, StorageKey};

    fn url(path: &str) -> Url {
        Url::parse("https://images.example.com/").unwrap().join(path).unwrap()
    }

    fn artifact(rgb: [u8; 3]) -> Artifact {
        Artifact::decode(&png_bytes(2, 2, rgb)).unwrap()
    }

    fn mock_cache(policy: CachePolicy) -> (Cache, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::default());
        let cache = Cache::new(policy, None, Some(backend.clone())).unwrap();
        (cache, backend)
    }

    #[tokio::test]
    async fn test_none_never_caches() {
        let cache = Cache::disabled();
        cache.store(&url("a.png"), &artifact([1, 2, 3])).await;
        assert!(cache.lookup(&url("a.png")).await.is_none());
        assert_eq!(cache.memory_len(), 0);
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let (cache, backend) = mock_cache(CachePolicy::Memory);
        let stored = artifact([1, 2, 3]);
        cache.store(&url("a.png"), &stored).await;
        let found = cache.lookup(&url("a.png")).await.unwrap();
        assert!(found.ptr_eq(&stored));
        // Backend is ignored outside of the disk policy.
        assert!(cache.disk().is_none());
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_disk_store_writes_both_tiers() {
        let (cache, backend) = mock_cache(CachePolicy::Disk);
        cache.store(&url("a.png"), &artifact([9, 9, 9])).await;
        assert_eq!(cache.memory_len(), 1);
        let bytes = backend.read(&StorageKey::derive(url("a.png").as_str())).await.unwrap();
        assert_eq!(Artifact::decode(&bytes).unwrap(), artifact([9, 9, 9]));
    }

    #[tokio::test]
    async fn test_disk_lookup_promotes_into_memory() {
        let key = StorageKey::derive(url("a.png").as_str());
        let backend = Arc::new(MockBackend::with_entries([(key, png_bytes(2, 2, [4, 5, 6]))]));
        let cache = Cache::new(CachePolicy::Disk, None, Some(backend.clone())).unwrap();
        assert_eq!(cache.memory_len(), 0);
        let found = cache.lookup(&url("a.png")).await.unwrap();
        assert_eq!(found, artifact([4, 5, 6]));
        assert_eq!(cache.memory_len(), 1);
        // Second lookup is served from memory: same decoded buffer.
        assert!(cache.lookup(&url("a.png")).await.unwrap().ptr_eq(&found));
    }

    #[tokio::test]
    async fn test_failed_disk_write_skips_memory() {
        let (cache, backend) = mock_cache(CachePolicy::Disk);
        backend.fail_writes(true);
        cache.store(&url("a.png"), &artifact([1, 1, 1])).await;
        assert_eq!(cache.memory_len(), 0);
        assert!(cache.lookup(&url("a.png")).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_disk_entry_is_a_miss_and_discarded() {
        let key = StorageKey::derive(url("a.png").as_str());
        let backend = Arc::new(MockBackend::with_entries([(key.clone(), b"not an image".to_vec())]));
        let cache = Cache::new(CachePolicy::Disk, None, Some(backend.clone())).unwrap();
        assert!(cache.lookup(&url("a.png")).await.is_none());
        assert!(!backend.exists(&key).await.unwrap());
        assert_eq!(cache.memory_len(), 0);
    }

    #[tokio::test]
    async fn test_clear_disk() {
        let (cache, backend) = mock_cache(CachePolicy::Disk);
        for (i, path) in ["a.png", "b.png", "c.png"].into_iter().enumerate() {
            cache.store(&url(path), &artifact([i as u8; 3])).await;
        }
        assert_eq!(backend.len().await, 3);
        let cleared = cache.clear().await;
        assert_eq!(cleared, Cleared { memory: 3, disk_removed: 3, disk_failed: 0 });
        assert!(backend.is_empty().await);
        assert!(cache.lookup(&url("a.png")).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_survives_delete_failures() {
        let (cache, backend) = mock_cache(CachePolicy::Disk);
        cache.store(&url("a.png"), &artifact([1, 1, 1])).await;
        cache.store(&url("b.png"), &artifact([2, 2, 2])).await;
        backend.fail_deletes(true);
        let cleared = cache.clear().await;
        assert_eq!(cleared, Cleared { memory: 2, disk_removed: 0, disk_failed: 2 });
        // Memory is emptied regardless.
        assert_eq!(cache.memory_len(), 0);
    }

    #[test]
    fn test_disk_policy_requires_backend() {
        let err = Cache::new(CachePolicy::Disk, None, None).err().unwrap();
        assert!(matches!(&*err, ErrorKind::MissingDiskStore));
    }

    #[test]
    fn test_local_creates_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = temp_dir.path().join("bsg/images");
        let cache = Cache::local(CachePolicy::Disk, None, &directory).unwrap();
        assert!(directory.is_dir());
        assert!(cache.disk().is_some());
    }

    #[test]
    fn test_local_skips_directory_without_disk_policy() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = temp_dir.path().join("images");
        Cache::local(CachePolicy::Memory, None, &directory).unwrap();
        assert!(!directory.exists());
    }

    #[test]
    fn test_local_unusable_directory_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("occupied");
        std::fs::write(&file, b"not a directory").unwrap();
        let err = Cache::local(CachePolicy::Disk, None, &file).err().unwrap();
        assert!(matches!(&*err, ErrorKind::CacheDirectory(path) if path == &file));
    }
}
