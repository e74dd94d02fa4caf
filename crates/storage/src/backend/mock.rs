//! In-memory storage backend for testing.

use super::EntryInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{EntryInfo, StorageBackend, StorageKey};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Blobs are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Writes and
/// deletes can be switched to fail, to exercise best-effort code paths.
///
/// # Examples
///
/// ```
/// use imgload_storage::backend::MockBackend;
/// use imgload_storage::{StorageBackend, StorageKey};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let key = StorageKey::derive("https://example.com/a.png");
/// let backend = MockBackend::with_entries([(key.clone(), b"png bytes")]);
/// assert!(backend.exists(&key).await?);
///
/// backend.fail_writes(true);
/// assert!(backend.write(&key, b"other").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    storage: RwLock<HashMap<StorageKey, (OffsetDateTime, Vec<u8>)>>,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with entries.
    pub fn with_entries(entries: impl IntoIterator<Item = (StorageKey, impl Into<Vec<u8>>)>) -> Self {
        let now = OffsetDateTime::now_utc();
        let map = entries.into_iter().map(|(key, data)| (key, (now, data.into()))).collect();
        Self {
            storage: RwLock::new(map),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent delete fail (or succeed again).
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let entries: [(StorageKey, Vec<u8>); 0] = [];
        Self::with_entries(entries)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn list_stream(&self) -> EntryInfoStream<'_> {
        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding to
            // avoid holding the lock across yield points.
            let entries: Vec<EntryInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .map(|(key, (inserted, data))| EntryInfo::new(key.clone(), data.len() as u64, *inserted))
                    .collect()
            };
            for entry in entries {
                yield Ok(entry);
            }
        })
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool> {
        Ok(self.storage.read().await.contains_key(key))
    }

    async fn read(&self, key: &StorageKey) -> Result<Vec<u8>> {
        let (_inserted, data) = self
            .storage
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.to_string())))?;
        Ok(data)
    }

    async fn write(&self, key: &StorageKey, data: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError("mock write failure".to_string()));
        }
        self.storage.write().await.insert(key.clone(), (OffsetDateTime::now_utc(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, key: &StorageKey) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError("mock delete failure".to_string()));
        }
        self.storage
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.to_string())))
    }
}
