//! Storage operations trait.

use async_trait::async_trait;
use std::path::Path;

use super::types::{AttributePolicy, DirEntry, FileAttr, SetAttr};
use super::StorageResult;

/// Uniform file-tree operations over one concrete storage medium.
///
/// Paths are always relative to the backend's root, slash-separated.
/// Implementations must be safe for concurrent use by many sessions; the
/// trait is deliberately stateless (no open-handle lifecycle) so a single
/// instance can be shared behind an `Arc`.
#[async_trait]
pub trait StorageOps: Send + Sync {
    /// Get file attributes.
    async fn getattr(&self, path: &Path) -> StorageResult<FileAttr>;

    /// Read directory entries.
    async fn readdir(&self, path: &Path) -> StorageResult<Vec<DirEntry>>;

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes if EOF is reached.
    async fn read(&self, path: &Path, offset: u64, size: u32) -> StorageResult<Vec<u8>>;

    /// Replace the file's entire contents, creating it if absent.
    async fn write_all(&self, path: &Path, data: &[u8]) -> StorageResult<()>;

    /// Create a directory. Parents are created as needed.
    async fn mkdir(&self, path: &Path) -> StorageResult<()>;

    /// Remove a file.
    async fn unlink(&self, path: &Path) -> StorageResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &Path) -> StorageResult<()>;

    /// Rename a file or directory.
    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()>;

    /// Set file attributes.
    ///
    /// Under [`AttributePolicy::Ignore`] a backend accepts attributes it
    /// cannot store and reports success.
    async fn setattr(&self, path: &Path, attr: SetAttr) -> StorageResult<FileAttr>;

    /// How this backend treats attributes it cannot represent.
    fn attribute_policy(&self) -> AttributePolicy {
        AttributePolicy::Enforce
    }

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }

    /// Read entire file contents.
    async fn read_all(&self, path: &Path) -> StorageResult<Vec<u8>> {
        let attr = self.getattr(path).await?;
        self.read(path, 0, attr.size as u32).await
    }
}
