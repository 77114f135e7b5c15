//! Per-user confined view of a shared backend.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::StorageResult;
use crate::ops::StorageOps;
use crate::types::{AttributePolicy, DirEntry, FileAttr, SetAttr};
use crate::virtual_path;

/// A view of a backend confined to one subtree.
///
/// Every operation resolves its virtual path lexically, rejects escapes,
/// prefixes the confined root, and delegates to the shared backend. The
/// view holds no state beyond the prefix and the backend handle, so one
/// is created per session and dropped with it.
#[derive(Clone)]
pub struct RootedView {
    backend: Arc<dyn StorageOps>,
    prefix: PathBuf,
}

impl RootedView {
    /// Confine `backend` to the subtree at `prefix`.
    ///
    /// The prefix itself is resolved through the same lexical rules as
    /// session paths, so a hostile prefix cannot address outside the
    /// backend root either.
    pub fn confine(backend: Arc<dyn StorageOps>, prefix: impl AsRef<Path>) -> StorageResult<Self> {
        let prefix = virtual_path::resolve(prefix.as_ref())?;
        Ok(Self { backend, prefix })
    }

    /// The confined root, relative to the backend root.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn translate(&self, path: &Path) -> StorageResult<PathBuf> {
        virtual_path::confine(&self.prefix, path).inspect_err(|e| {
            debug!(
                prefix = %self.prefix.display(),
                path = %path.display(),
                error = %e,
                "path rejected"
            );
        })
    }
}

#[async_trait]
impl StorageOps for RootedView {
    async fn getattr(&self, path: &Path) -> StorageResult<FileAttr> {
        let full = self.translate(path)?;
        self.backend.getattr(&full).await
    }

    async fn readdir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        let full = self.translate(path)?;
        self.backend.readdir(&full).await
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> StorageResult<Vec<u8>> {
        let full = self.translate(path)?;
        self.backend.read(&full, offset, size).await
    }

    async fn write_all(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let full = self.translate(path)?;
        self.backend.write_all(&full, data).await
    }

    async fn mkdir(&self, path: &Path) -> StorageResult<()> {
        let full = self.translate(path)?;
        self.backend.mkdir(&full).await
    }

    async fn unlink(&self, path: &Path) -> StorageResult<()> {
        let full = self.translate(path)?;
        self.backend.unlink(&full).await
    }

    async fn rmdir(&self, path: &Path) -> StorageResult<()> {
        let full = self.translate(path)?;
        self.backend.rmdir(&full).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let from_full = self.translate(from)?;
        let to_full = self.translate(to)?;
        self.backend.rename(&from_full, &to_full).await
    }

    async fn setattr(&self, path: &Path, attr: SetAttr) -> StorageResult<FileAttr> {
        let full = self.translate(path)?;
        self.backend.setattr(&full, attr).await
    }

    fn attribute_policy(&self) -> AttributePolicy {
        self.backend.attribute_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::error::StorageError;

    fn two_views() -> (RootedView, RootedView) {
        let backend: Arc<dyn StorageOps> = Arc::new(MemoryBackend::new());
        let alice = RootedView::confine(backend.clone(), "home/alice").unwrap();
        let bob = RootedView::confine(backend, "home/bob").unwrap();
        (alice, bob)
    }

    #[tokio::test]
    async fn test_ops_are_prefixed() {
        let (alice, _) = two_views();

        alice
            .write_all(Path::new("/notes.txt"), b"hello")
            .await
            .unwrap();

        let data = alice.read_all(Path::new("notes.txt")).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_escape_rejected() {
        let (alice, _) = two_views();

        let err = alice
            .read(Path::new("../../etc/passwd"), 0, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PathEscapesRoot(_)));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (alice, bob) = two_views();

        alice
            .write_all(Path::new("secret.txt"), b"alice only")
            .await
            .unwrap();

        // Bob cannot see the file by the same name, nor reach it by traversal.
        assert!(!bob.exists(Path::new("secret.txt")).await);
        let err = bob
            .read(Path::new("../alice/secret.txt"), 0, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PathEscapesRoot(_)));
    }

    #[tokio::test]
    async fn test_rename_stays_confined() {
        let (alice, _) = two_views();

        alice
            .write_all(Path::new("a.txt"), b"data")
            .await
            .unwrap();
        let err = alice
            .rename(Path::new("a.txt"), Path::new("../bob/a.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PathEscapesRoot(_)));
    }

    #[tokio::test]
    async fn test_policy_passes_through() {
        let (alice, _) = two_views();
        assert_eq!(alice.attribute_policy(), AttributePolicy::Enforce);
    }
}
