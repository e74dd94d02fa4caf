//! Flat key/blob storage for the imgload disk cache.
//!
//! Every blob lives directly under a single root, addressed by a
//! [`StorageKey`]. There is no eviction and no expiry: entries stay until
//! they are deleted or the whole store is [cleared](StorageBackend::clear).

pub mod backend;
pub mod error;
mod key;
mod models;

pub use crate::backend::StorageBackend;
pub use crate::key::StorageKey;
pub use crate::models::{ClearSummary, EntryInfo};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
