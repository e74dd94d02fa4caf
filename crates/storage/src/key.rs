//! Storage keys and their validation.
//!
//! Keys name a single blob directly under the storage root. They are derived
//! from an identifier with [`StorageKey::derive`], or read back from a
//! directory listing with [`StorageKey::parse`].

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use std::ffi::OsStr;
use std::path::{Component, Path};

/// Name of one blob in a flat store.
///
/// Always a single, non-empty path component: no separators, no null bytes,
/// never `.` or `..`. Joining a key onto a storage root can therefore never
/// escape that root.
///
/// # Examples
///
/// ```
/// use imgload_storage::StorageKey;
///
/// let key = StorageKey::derive("https://example.com/a/b.png");
/// assert_eq!(key.as_str().len(), 64);
/// // Same identifier, same key; across processes too.
/// assert_eq!(key, StorageKey::derive("https://example.com/a/b.png"));
/// // A naive separator swap would collide here, a digest does not.
/// assert_ne!(StorageKey::derive("https://x.com/a_b"), StorageKey::derive("https://x.com/a/b"));
///
/// assert!(StorageKey::parse("cover.png").is_ok());
/// assert!(StorageKey::parse("../escape").is_err());
/// assert!(StorageKey::parse("a/b").is_err());
/// ```
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Derive the key for an identifier: the hex BLAKE3 digest of its bytes.
    pub fn derive(identifier: impl AsRef<[u8]>) -> Self {
        Self(blake3::hash(identifier.as_ref()).to_hex().to_string())
    }

    /// Validate an existing name (e.g. a directory entry) as a key.
    pub fn parse(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref();
        // Null bytes pass through Path::components() on Unix but cause
        // truncation in C-based syscalls; reject them explicitly.
        if name.contains('\0') {
            exn::bail!(ErrorKind::InvalidKey(name.to_string()));
        }
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(single)), None) if single == OsStr::new(name) => Ok(Self(name.to_string())),
            _ => exn::bail!(ErrorKind::InvalidKey(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl AsRef<Path> for StorageKey {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}
