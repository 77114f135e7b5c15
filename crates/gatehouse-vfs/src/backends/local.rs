//! Local filesystem backend.
//!
//! Maps the operation set 1:1 onto the host filesystem under a base
//! folder, with path security to prevent escaping it.

use async_trait::async_trait;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{StorageError, StorageResult};
use crate::ops::StorageOps;
use crate::types::{DirEntry, FileAttr, FileType, SetAttr};
use crate::virtual_path;

/// Local filesystem backend.
///
/// All operations are relative to `root`. Lexical confinement happens in
/// [`virtual_path`]; on top of that, resolved paths are canonicalized so
/// a symlink planted inside the tree cannot alias a target outside it.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a local backend rooted at the given base folder.
    ///
    /// The folder is created if missing and canonicalized so later
    /// escape checks compare against a stable absolute root.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root: PathBuf = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// The canonical root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute path within the root.
    fn full_path(&self, path: &Path) -> StorageResult<PathBuf> {
        let relative = virtual_path::resolve(path)?;
        if relative.as_os_str().is_empty() {
            return Ok(self.root.clone());
        }
        let full = self.root.join(relative);

        // Canonicalize to catch symlink aliasing. New files don't exist
        // yet, so check the nearest existing ancestor instead.
        let canonical = if full.exists() {
            full.canonicalize()?
        } else {
            let parent = full
                .parent()
                .ok_or_else(|| StorageError::invalid_path("no parent"))?;
            let filename = full
                .file_name()
                .ok_or_else(|| StorageError::invalid_path("no filename"))?;
            if parent.exists() {
                parent.canonicalize()?.join(filename)
            } else {
                full
            }
        };

        if !canonical.starts_with(&self.root) {
            return Err(StorageError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok(canonical)
    }

    fn metadata_to_attr(meta: &std::fs::Metadata) -> FileAttr {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else if meta.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        };

        FileAttr {
            size: meta.len(),
            kind,
            perm: meta.permissions().mode() & 0o7777,
            mtime: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            uid: Some(meta.uid()),
            gid: Some(meta.gid()),
        }
    }
}

#[async_trait]
impl StorageOps for LocalBackend {
    async fn getattr(&self, path: &Path) -> StorageResult<FileAttr> {
        let full = self.full_path(path)?;
        let meta = fs::symlink_metadata(&full).await?;
        Ok(Self::metadata_to_attr(&meta))
    }

    async fn readdir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        let full = self.full_path(path)?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full).await?;

        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            entries.push(DirEntry::new(
                entry.file_name().to_string_lossy().into_owned(),
                Self::metadata_to_attr(&meta),
            ));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> StorageResult<Vec<u8>> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let full = self.full_path(path)?;
        let mut file = fs::File::open(&full).await?;

        file.seek(std::io::SeekFrom::Start(offset)).await?;

        let mut buffer = vec![0u8; size as usize];
        let mut filled = 0;
        while filled < buffer.len() {
            let n = file.read(&mut buffer[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer.truncate(filled);

        Ok(buffer)
    }

    async fn write_all(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, data).await?;
        Ok(())
    }

    async fn mkdir(&self, path: &Path) -> StorageResult<()> {
        let full = self.full_path(path)?;
        fs::create_dir_all(&full).await?;
        Ok(())
    }

    async fn unlink(&self, path: &Path) -> StorageResult<()> {
        let full = self.full_path(path)?;
        fs::remove_file(&full).await.map_err(StorageError::from)
    }

    async fn rmdir(&self, path: &Path) -> StorageResult<()> {
        let full = self.full_path(path)?;
        fs::remove_dir(&full).await.map_err(StorageError::from)
    }

    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let from_full = self.full_path(from)?;
        let to_full = self.full_path(to)?;

        if let Some(parent) = to_full.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&from_full, &to_full)
            .await
            .map_err(StorageError::from)
    }

    async fn setattr(&self, path: &Path, attr: SetAttr) -> StorageResult<FileAttr> {
        let full = self.full_path(path)?;

        if let Some(size) = attr.size {
            let file = fs::OpenOptions::new().write(true).open(&full).await?;
            file.set_len(size).await?;
        }

        if let Some(perm) = attr.perm {
            let permissions = std::fs::Permissions::from_mode(perm);
            fs::set_permissions(&full, permissions).await?;
        }

        self.getattr(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (LocalBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        (backend, dir)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (backend, _dir) = setup();

        backend
            .write_all(Path::new("test.txt"), b"hello world")
            .await
            .unwrap();

        let data = backend.read(Path::new("test.txt"), 0, 100).await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn test_partial_read() {
        let (backend, _dir) = setup();

        backend
            .write_all(Path::new("test.txt"), b"hello world")
            .await
            .unwrap();

        let data = backend.read(Path::new("test.txt"), 6, 5).await.unwrap();
        assert_eq!(data, b"world");
    }

    #[tokio::test]
    async fn test_mkdir_and_readdir() {
        let (backend, _dir) = setup();

        backend.mkdir(Path::new("subdir")).await.unwrap();
        backend
            .write_all(Path::new("subdir/file.txt"), b"x")
            .await
            .unwrap();
        backend.write_all(Path::new("root.txt"), b"y").await.unwrap();

        let entries = backend.readdir(Path::new("")).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"subdir"));
        assert!(names.contains(&"root.txt"));
    }

    #[tokio::test]
    async fn test_path_escape_blocked() {
        let (backend, _dir) = setup();

        let result = backend.read(Path::new("../../../etc/passwd"), 0, 100).await;
        assert!(matches!(result, Err(StorageError::PathEscapesRoot(_))));
    }

    #[tokio::test]
    async fn test_symlink_escape_blocked() {
        let (backend, dir) = setup();

        // A symlink inside the tree pointing outside must not be followable.
        std::os::unix::fs::symlink("/etc", dir.path().join("evil")).unwrap();
        let result = backend.read(Path::new("evil/passwd"), 0, 100).await;
        assert!(matches!(result, Err(StorageError::PathEscapesRoot(_))));
    }

    #[tokio::test]
    async fn test_rename() {
        let (backend, _dir) = setup();

        backend
            .write_all(Path::new("old.txt"), b"content")
            .await
            .unwrap();
        backend
            .rename(Path::new("old.txt"), Path::new("new.txt"))
            .await
            .unwrap();

        assert!(backend.getattr(Path::new("old.txt")).await.is_err());
        let data = backend.read(Path::new("new.txt"), 0, 100).await.unwrap();
        assert_eq!(data, b"content");
    }

    #[tokio::test]
    async fn test_setattr_truncates() {
        let (backend, _dir) = setup();

        backend
            .write_all(Path::new("test.txt"), b"hello world")
            .await
            .unwrap();
        backend
            .setattr(Path::new("test.txt"), SetAttr::new().with_size(5))
            .await
            .unwrap();

        let data = backend.read(Path::new("test.txt"), 0, 100).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_rmdir_requires_empty() {
        let (backend, _dir) = setup();

        backend.mkdir(Path::new("d")).await.unwrap();
        backend.write_all(Path::new("d/f.txt"), b"x").await.unwrap();

        assert!(backend.rmdir(Path::new("d")).await.is_err());
        backend.unlink(Path::new("d/f.txt")).await.unwrap();
        backend.rmdir(Path::new("d")).await.unwrap();
    }
}
