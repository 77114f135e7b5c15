//! Lexical virtual-path resolution.
//!
//! Session-supplied paths are untrusted. Before a path reaches a backend
//! it is resolved here: `.` and `..` are folded out component-wise, and a
//! traversal that would climb above the confined root is rejected rather
//! than clamped.
//!
//! The resolution is purely lexical over slash-separated components, so
//! the same primitive serves native filesystem paths and bucket key
//! prefixes (which have no OS path-separator semantics).

use std::path::{Component, Path, PathBuf};

use crate::error::{StorageError, StorageResult};

/// Resolve a client-supplied virtual path to a root-relative path.
///
/// Leading slashes are stripped (clients address paths from their own
/// root), `.` components vanish, and each `..` must have a preceding
/// component to consume. An empty result addresses the root itself.
pub fn resolve(path: &Path) -> StorageResult<PathBuf> {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    return Err(StorageError::path_escapes_root(
                        path.display().to_string(),
                    ));
                }
            }
            Component::Normal(s) => {
                result.push(s);
            }
            Component::Prefix(_) => {
                return Err(StorageError::invalid_path(path.display().to_string()));
            }
        }
    }
    Ok(result)
}

/// Resolve a virtual path and join it under `prefix`.
///
/// The returned path is guaranteed to be `prefix` itself or a lexical
/// descendant of it.
pub fn confine(prefix: &Path, path: &Path) -> StorageResult<PathBuf> {
    let relative = resolve(path)?;
    if relative.as_os_str().is_empty() {
        Ok(prefix.to_path_buf())
    } else {
        Ok(prefix.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        assert_eq!(resolve(Path::new("a/b/c")).unwrap(), PathBuf::from("a/b/c"));
    }

    #[test]
    fn test_leading_slash_stripped() {
        assert_eq!(
            resolve(Path::new("/upload/data.csv")).unwrap(),
            PathBuf::from("upload/data.csv")
        );
    }

    #[test]
    fn test_dot_components_folded() {
        assert_eq!(
            resolve(Path::new("./a/./b")).unwrap(),
            PathBuf::from("a/b")
        );
    }

    #[test]
    fn test_parent_within_root() {
        assert_eq!(
            resolve(Path::new("a/b/../c")).unwrap(),
            PathBuf::from("a/c")
        );
    }

    #[test]
    fn test_escape_rejected() {
        let err = resolve(Path::new("../../etc/passwd")).unwrap_err();
        assert!(matches!(err, StorageError::PathEscapesRoot(_)));
    }

    #[test]
    fn test_escape_after_descent_rejected() {
        let err = resolve(Path::new("a/../../etc/passwd")).unwrap_err();
        assert!(matches!(err, StorageError::PathEscapesRoot(_)));
    }

    #[test]
    fn test_empty_addresses_root() {
        assert!(resolve(Path::new("")).unwrap().as_os_str().is_empty());
        assert!(resolve(Path::new("/")).unwrap().as_os_str().is_empty());
        assert!(resolve(Path::new("a/..")).unwrap().as_os_str().is_empty());
    }

    #[test]
    fn test_confine_prefixes() {
        let p = confine(Path::new("home/alice"), Path::new("/docs/x.txt")).unwrap();
        assert_eq!(p, PathBuf::from("home/alice/docs/x.txt"));

        let root = confine(Path::new("home/alice"), Path::new("/")).unwrap();
        assert_eq!(root, PathBuf::from("home/alice"));
    }

    #[test]
    fn test_confine_never_escapes() {
        let err = confine(Path::new("home/alice"), Path::new("../../etc/passwd")).unwrap_err();
        assert!(matches!(err, StorageError::PathEscapesRoot(_)));
    }
}
