//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, a flat key/blob interface
//! used as the persistent tier of the image cache. Implementations exist for
//! the local filesystem and, for tests, an in-memory map.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::{ClearSummary, EntryInfo, StorageKey};
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use std::pin::Pin;

pub(crate) type EntryInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<EntryInfo>> + Send + 'a>>;

/// Unified interface for flat blob stores.
///
/// All operations are asynchronous; a store may sit on a slow disk or a
/// network mount. Keys are always a single path component (see
/// [`StorageKey`]), so a store never has to deal with nested paths.
///
/// # Examples
///
/// ```
/// use imgload_storage::{StorageBackend, StorageKey, error::Result};
///
/// async fn cached_size(backend: &dyn StorageBackend, url: &str) -> Result<u64> {
///     let key = StorageKey::derive(url);
///     if backend.exists(&key).await? {
///         let data = backend.read(&key).await?;
///         Ok(data.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// List every entry in the store.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self) -> Result<Vec<EntryInfo>> {
        self.list_stream().try_collect().await
    }

    /// Stream entry metadata, yielding results as they are discovered.
    ///
    /// A failure to inspect one entry is yielded as an `Err` item without
    /// ending the stream.
    fn list_stream(&self) -> EntryInfoStream<'_>;

    /// Check if an entry exists.
    async fn exists(&self, key: &StorageKey) -> Result<bool>;

    /// Read a blob.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if nothing is
    /// stored under `key`.
    async fn read(&self, key: &StorageKey) -> Result<Vec<u8>>;

    /// Write a blob, replacing any existing one.
    async fn write(&self, key: &StorageKey, data: &[u8]) -> Result<()>;

    /// Delete a blob.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if nothing is
    /// stored under `key`.
    async fn delete(&self, key: &StorageKey) -> Result<()>;

    /// Delete every entry, best-effort.
    ///
    /// Entries that cannot be listed or deleted are logged and counted in
    /// [`ClearSummary::failed`]; they never abort the rest of the clear.
    async fn clear(&self) -> Result<ClearSummary> {
        let mut summary = ClearSummary::default();
        // Collect first; deleting from a directory mid-walk leaves it up to
        // the platform whether later entries are still reported.
        let entries: Vec<Result<EntryInfo>> = self.list_stream().collect().await;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(backend = self.name(), error = ?err, "Could not list entry for removal");
                    summary.failed += 1;
                    continue;
                },
            };
            match self.delete(&entry.key).await {
                Ok(()) => summary.removed += 1,
                Err(err) => {
                    tracing::warn!(backend = self.name(), key = %entry.key, error = ?err, "Could not remove entry");
                    summary.failed += 1;
                },
            }
        }
        tracing::debug!(backend = self.name(), removed = summary.removed, failed = summary.failed, "Store cleared");
        Ok(summary)
    }
}
