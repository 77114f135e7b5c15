//! In-memory storage backend.
//!
//! Used for tests and ephemeral setups. All data is lost when dropped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use crate::error::{StorageError, StorageResult};
use crate::ops::StorageOps;
use crate::types::{DirEntry, FileAttr, SetAttr};
use crate::virtual_path;

/// Entry in the memory tree.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, attr: FileAttr },
    Directory { attr: FileAttr },
}

impl Entry {
    fn attr(&self) -> &FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr } => attr,
        }
    }
}

/// In-memory storage backend.
///
/// Thread-safe via internal `RwLock`.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<PathBuf, Entry>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Root directory always exists
        entries.insert(
            PathBuf::from(""),
            Entry::Directory {
                attr: FileAttr::directory(0o755),
            },
        );
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn path_str(path: &Path) -> String {
        path.display().to_string()
    }

    /// Insert missing parent directories for `path`.
    fn ensure_parents(entries: &mut HashMap<PathBuf, Entry>, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            if let std::path::Component::Normal(s) = component {
                current.push(s);
                entries.entry(current.clone()).or_insert(Entry::Directory {
                    attr: FileAttr::directory(0o755),
                });
            }
        }
    }
}

#[async_trait]
impl StorageOps for MemoryBackend {
    async fn getattr(&self, path: &Path) -> StorageResult<FileAttr> {
        let normalized = virtual_path::resolve(path)?;
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::other("lock poisoned"))?;

        entries
            .get(&normalized)
            .map(|e| e.attr().clone())
            .ok_or_else(|| StorageError::not_found(Self::path_str(&normalized)))
    }

    async fn readdir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        let normalized = virtual_path::resolve(path)?;
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::other("lock poisoned"))?;

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(StorageError::not_a_directory(Self::path_str(&normalized))),
            None => return Err(StorageError::not_found(Self::path_str(&normalized))),
        }

        let mut result = Vec::new();
        for (entry_path, entry) in entries.iter() {
            if let Some(parent) = entry_path.parent() {
                if parent == normalized && entry_path != &normalized {
                    if let Some(name) = entry_path.file_name() {
                        result.push(DirEntry::new(
                            name.to_string_lossy().into_owned(),
                            entry.attr().clone(),
                        ));
                    }
                }
            }
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> StorageResult<Vec<u8>> {
        let normalized = virtual_path::resolve(path)?;
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::other("lock poisoned"))?;

        match entries.get(&normalized) {
            Some(Entry::File { data, .. }) => {
                let start = (offset as usize).min(data.len());
                let end = (start + size as usize).min(data.len());
                Ok(data[start..end].to_vec())
            }
            Some(Entry::Directory { .. }) => {
                Err(StorageError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(StorageError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn write_all(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let normalized = virtual_path::resolve(path)?;
        if normalized.as_os_str().is_empty() {
            return Err(StorageError::is_a_directory("/"));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::other("lock poisoned"))?;

        if let Some(Entry::Directory { .. }) = entries.get(&normalized) {
            return Err(StorageError::is_a_directory(Self::path_str(&normalized)));
        }

        Self::ensure_parents(&mut entries, &normalized);
        entries.insert(
            normalized,
            Entry::File {
                attr: FileAttr::file(data.len() as u64, 0o644),
                data: data.to_vec(),
            },
        );
        Ok(())
    }

    async fn mkdir(&self, path: &Path) -> StorageResult<()> {
        let normalized = virtual_path::resolve(path)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::other("lock poisoned"))?;

        if let Some(Entry::File { .. }) = entries.get(&normalized) {
            return Err(StorageError::already_exists(Self::path_str(&normalized)));
        }

        Self::ensure_parents(&mut entries, &normalized);
        entries.insert(
            normalized,
            Entry::Directory {
                attr: FileAttr::directory(0o755),
            },
        );
        Ok(())
    }

    async fn unlink(&self, path: &Path) -> StorageResult<()> {
        let normalized = virtual_path::resolve(path)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::other("lock poisoned"))?;

        match entries.get(&normalized) {
            Some(Entry::File { .. }) => {
                entries.remove(&normalized);
                Ok(())
            }
            Some(Entry::Directory { .. }) => {
                Err(StorageError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(StorageError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn rmdir(&self, path: &Path) -> StorageResult<()> {
        let normalized = virtual_path::resolve(path)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::other("lock poisoned"))?;

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(StorageError::not_a_directory(Self::path_str(&normalized))),
            None => return Err(StorageError::not_found(Self::path_str(&normalized))),
        }

        let has_children = entries
            .keys()
            .any(|p| p.parent() == Some(normalized.as_path()));
        if has_children {
            return Err(StorageError::directory_not_empty(Self::path_str(
                &normalized,
            )));
        }

        entries.remove(&normalized);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let from_n = virtual_path::resolve(from)?;
        let to_n = virtual_path::resolve(to)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::other("lock poisoned"))?;

        if !entries.contains_key(&from_n) {
            return Err(StorageError::not_found(Self::path_str(&from_n)));
        }

        // Move the entry and, for directories, every descendant.
        let moved: Vec<(PathBuf, PathBuf)> = entries
            .keys()
            .filter(|p| p.starts_with(&from_n))
            .map(|p| {
                let suffix = p.strip_prefix(&from_n).expect("prefix checked").to_path_buf();
                (p.clone(), to_n.join(suffix))
            })
            .collect();

        Self::ensure_parents(&mut entries, &to_n);
        for (old, new) in moved {
            if let Some(entry) = entries.remove(&old) {
                entries.insert(new, entry);
            }
        }
        Ok(())
    }

    async fn setattr(&self, path: &Path, attr: SetAttr) -> StorageResult<FileAttr> {
        let normalized = virtual_path::resolve(path)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::other("lock poisoned"))?;

        let entry = entries
            .get_mut(&normalized)
            .ok_or_else(|| StorageError::not_found(Self::path_str(&normalized)))?;

        match entry {
            Entry::File {
                data,
                attr: file_attr,
            } => {
                if let Some(size) = attr.size {
                    data.resize(size as usize, 0);
                    file_attr.size = size as u64;
                }
                if let Some(perm) = attr.perm {
                    file_attr.perm = perm;
                }
                if let Some(mtime) = attr.mtime {
                    file_attr.mtime = mtime;
                } else if !attr.is_empty() {
                    file_attr.mtime = SystemTime::now();
                }
                Ok(file_attr.clone())
            }
            Entry::Directory { attr: dir_attr } => {
                if let Some(perm) = attr.perm {
                    dir_attr.perm = perm;
                }
                Ok(dir_attr.clone())
            }
        }
    }
}
