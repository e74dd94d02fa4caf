//! Storage models.

use crate::StorageKey;
use time::OffsetDateTime;

/// Entry metadata returned by storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Key the blob is stored under
    pub key: StorageKey,
    /// Blob size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl EntryInfo {
    pub fn new(key: StorageKey, size: u64, modified: OffsetDateTime) -> Self {
        Self { key, size, modified }
    }
}

/// Outcome of a best-effort [`clear`](crate::StorageBackend::clear).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearSummary {
    /// Entries deleted.
    pub removed: usize,
    /// Entries that could not be listed or deleted; they may still exist.
    pub failed: usize,
}
