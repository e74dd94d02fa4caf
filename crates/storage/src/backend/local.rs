//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local
//! filesystem. Blobs are stored as files directly inside one configured
//! directory and accessed via `tokio::fs` for async I/O.

use crate::backend::EntryInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{EntryInfo, StorageBackend, StorageKey};
use async_stream::stream;
use async_trait::async_trait;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

/// Local filesystem storage backend.
///
/// Stores blobs as files in a single flat directory. Sub-directories and
/// anything that isn't a regular file are ignored when listing.
///
/// # Examples
///
/// ```no_run
/// use imgload_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("disk", "/var/cache/imgload/images")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Directory holding every blob
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating `root` (and any
    /// missing parents) if it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRoot`](ErrorKind::InvalidRoot) if the path is not
    /// absolute or exists as something other than a directory, and an I/O
    /// or permission error if the directory cannot be created.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidRoot(root));
            }
        } else {
            // Use non-async here; it'll only happen once on construction
            // and it's not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root, None))?;
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute_path(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key)
    }

    fn map_io_error(e: std::io::Error, path: &Path, key: Option<&StorageKey>) -> ErrorKind {
        match (e.kind(), key) {
            (std::io::ErrorKind::NotFound, Some(key)) => ErrorKind::NotFound(key.to_string()),
            (std::io::ErrorKind::PermissionDenied, _) => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    fn entry_info(key: StorageKey, metadata: &Metadata) -> Result<EntryInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(EntryInfo::new(key, metadata.len(), modified))
    }

    /// Pulled out of the stream loop so that `?` can be used; errors are
    /// yielded by the caller instead of ending the stream.
    async fn process_entry(entry: DirEntry) -> Result<Option<EntryInfo>> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path, None))?;
        if !metadata.is_file() {
            // Sub-directories, and what is most likely a broken symlink.
            return Ok(None);
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::trace!(path = %path.display(), "Skipping non-UTF8 file name");
            return Ok(None);
        };
        let key = StorageKey::parse(name)?;
        Ok(Some(Self::entry_info(key, &metadata)?))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> EntryInfoStream<'_> {
        Box::pin(stream! {
            let mut entries = match fs::read_dir(&self.root).await {
                Ok(entries) => entries,
                // A root removed from under us is simply an empty store.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
                Err(err) => {
                    yield Err(exn::Exn::from(Self::map_io_error(err, &self.root, None)));
                    return;
                },
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(exn::Exn::from(Self::map_io_error(e, &self.root, None)));
                        continue;
                    },
                };
                match Self::process_entry(entry).await {
                    Ok(Some(info)) => yield Ok(info),
                    Ok(None) => {},
                    Err(e) => yield Err(e),
                }
            }
        })
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool> {
        let abs_path = self.absolute_path(key);
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, key: &StorageKey) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(key);
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, &abs_path, Some(key)))?)
    }

    async fn write(&self, key: &StorageKey, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(key);
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, &abs_path, Some(key)))?)
    }

    async fn delete(&self, key: &StorageKey) -> Result<()> {
        let abs_path = self.absolute_path(key);
        Ok(fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, &abs_path, Some(key)))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> StorageKey {
        StorageKey::parse(name).unwrap()
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        let err = LocalBackend::new("name", "relative/path").err().unwrap();
        assert!(matches!(&*err, ErrorKind::InvalidRoot(_)));
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/cache/images");
        LocalBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"data").unwrap();
        let err = LocalBackend::new("name", &file).err().unwrap();
        assert!(matches!(&*err, ErrorKind::InvalidRoot(_)));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let data = b"Hello, world!";
        backend.write(&key("test.bin"), data).await.unwrap();
        assert_eq!(backend.read(&key("test.bin")).await.unwrap(), data);
        // Stored flat, directly under the root.
        assert!(temp_dir.path().join("test.bin").is_file());
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(&key("blob"), b"first").await.unwrap();
        backend.write(&key("blob"), b"second").await.unwrap();
        assert_eq!(backend.read(&key("blob")).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let err = backend.read(&key("missing")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(!backend.exists(&key("nonexistent")).await.unwrap());
        backend.write(&key("exists"), b"data").await.unwrap();
        assert!(backend.exists(&key("exists")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(&key("file"), b"data").await.unwrap();
        backend.delete(&key("file")).await.unwrap();
        assert!(!backend.exists(&key("file")).await.unwrap());
        // Deleting nonexistent entry returns error
        let err = backend.delete(&key("file")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_empty_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(&key("one"), b"1").await.unwrap();
        backend.write(&key("two"), b"22").await.unwrap();
        std::fs::create_dir(temp_dir.path().join("subdir")).unwrap();
        std::fs::write(temp_dir.path().join("subdir/nested"), b"ignored").unwrap();
        let mut entries = backend.list().await.unwrap();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, key("one"));
        assert_eq!(entries[0].size, 1);
        assert_eq!(entries[1].key, key("two"));
        assert_eq!(entries[1].size, 2);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("images");
        let backend = LocalBackend::new("name", &root).unwrap();
        std::fs::remove_dir(&root).unwrap();
        assert!(backend.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        for name in ["a", "b", "c"] {
            backend.write(&StorageKey::derive(name), name.as_bytes()).await.unwrap();
        }
        let summary = backend.clear().await.unwrap();
        assert_eq!(summary.removed, 3);
        assert_eq!(summary.failed, 0);
        assert!(backend.list().await.unwrap().is_empty());
        // Root itself survives a clear.
        assert!(temp_dir.path().is_dir());
    }

    #[tokio::test]
    async fn test_entries_survive_new_instance() {
        let temp_dir = tempfile::tempdir().unwrap();
        let key = StorageKey::derive("https://example.com/cat.png");
        LocalBackend::new("first", temp_dir.path()).unwrap().write(&key, b"meow").await.unwrap();
        let second = LocalBackend::new("second", temp_dir.path()).unwrap();
        assert_eq!(second.read(&key).await.unwrap(), b"meow");
    }
}
