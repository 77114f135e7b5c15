//! S3 storage backend.
//!
//! Exposes one bucket as a hierarchical tree. Directories exist as
//! zero-byte `<prefix>/` marker objects and are otherwise synthesized
//! from the keys beneath them.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, instrument};

use gatehouse_vfs::{
    virtual_path, AttributePolicy, DirEntry, FileAttr, FileType, SetAttr, StorageError,
    StorageOps, StorageResult,
};

use crate::credentials::{AssumeRoleProvider, CredentialExchangeError};

/// Connection settings for the object-store backend.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Bucket serving as the storage root.
    pub bucket: String,
    /// Region override; the ambient chain decides otherwise.
    pub region: Option<String>,
    /// Custom endpoint (S3-compatible stores); forces path-style addressing.
    pub endpoint: Option<String>,
}

/// Object-store backend over one bucket.
///
/// The SDK client is cheap to clone and safe for concurrent use, so a
/// single backend instance serves every session. Credential rotation
/// happens inside the installed provider; this type never sees it.
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Build the backend, installing the role-assumption provider when
    /// one is configured and falling back to ambient credentials
    /// otherwise.
    pub async fn connect(
        settings: S3Settings,
        provider: Option<AssumeRoleProvider>,
    ) -> StorageResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = settings.region.clone() {
            loader = loader.region(Region::new(region));
        }
        let base = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&base);
        if let Some(provider) = provider {
            debug!("object store using assumed-role credentials");
            builder = builder.credentials_provider(provider);
        }
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket,
        })
    }

    /// The bucket this backend serves.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Translate a tree path into an object key.
    ///
    /// Goes through the shared lexical resolver, so `..` games cannot
    /// reach other prefixes. An empty key addresses the bucket root.
    fn object_key(path: &Path) -> StorageResult<String> {
        let normalized = virtual_path::resolve(path)?;
        Ok(key_string(&normalized))
    }

    fn file_attr(size: u64, mtime: Option<SystemTime>) -> FileAttr {
        FileAttr {
            size,
            kind: FileType::File,
            perm: 0o644,
            mtime: mtime.unwrap_or(UNIX_EPOCH),
            uid: None,
            gid: None,
        }
    }

    fn dir_attr() -> FileAttr {
        FileAttr {
            size: 0,
            kind: FileType::Directory,
            perm: 0o755,
            mtime: UNIX_EPOCH,
            uid: None,
            gid: None,
        }
    }

    async fn head_file(&self, key: &str) -> StorageResult<Option<FileAttr>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => {
                let size = out.content_length().unwrap_or(0).max(0) as u64;
                let mtime = out.last_modified().map(datetime_to_system_time);
                Ok(Some(Self::file_attr(size, mtime)))
            }
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    Ok(None)
                } else {
                    Err(sdk_error("HeadObject", key, err))
                }
            }
        }
    }

    /// True if any object lives under `prefix` (which must end in `/`).
    async fn prefix_occupied(&self, prefix: &str) -> StorageResult<bool> {
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| sdk_error("ListObjectsV2", prefix, e))?;
        Ok(out.key_count().unwrap_or(0) > 0)
    }
}

#[async_trait]
impl StorageOps for S3Backend {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn getattr(&self, path: &Path) -> StorageResult<FileAttr> {
        let key = Self::object_key(path)?;
        if key.is_empty() {
            return Ok(Self::dir_attr());
        }

        if let Some(attr) = self.head_file(&key).await? {
            return Ok(attr);
        }

        // No object at the key itself: a marker or any descendant makes
        // it a directory.
        let marker = format!("{key}/");
        if self.head_file(&marker).await?.is_some() || self.prefix_occupied(&marker).await? {
            return Ok(Self::dir_attr());
        }

        Err(StorageError::not_found(key))
    }

    async fn readdir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        let key = Self::object_key(path)?;
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        };

        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .delimiter("/");
            if !prefix.is_empty() {
                req = req.prefix(&prefix);
            }
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }

            let out = req
                .send()
                .await
                .map_err(|e| sdk_error("ListObjectsV2", &prefix, e))?;

            for common in out.common_prefixes() {
                if let Some(p) = common.prefix() {
                    let name = p
                        .trim_end_matches('/')
                        .rsplit('/')
                        .next()
                        .unwrap_or("")
                        .to_string();
                    if !name.is_empty() {
                        entries.push(DirEntry::new(name, Self::dir_attr()));
                    }
                }
            }

            for object in out.contents() {
                let Some(obj_key) = object.key() else { continue };
                // The directory's own marker is not a child.
                if obj_key.ends_with('/') {
                    continue;
                }
                let name = obj_key.rsplit('/').next().unwrap_or("").to_string();
                if name.is_empty() {
                    continue;
                }
                let size = object.size().unwrap_or(0).max(0) as u64;
                let mtime = object.last_modified().map(datetime_to_system_time);
                entries.push(DirEntry::new(name, Self::file_attr(size, mtime)));
            }

            match out.next_continuation_token() {
                Some(token) if out.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        if entries.is_empty() && !prefix.is_empty() {
            // Distinguish an empty directory from a missing one.
            self.getattr(path).await?;
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> StorageResult<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let key = Self::object_key(path)?;
        let range = format!("bytes={}-{}", offset, offset + size as u64 - 1);

        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .range(range)
            .send()
            .await
        {
            Ok(out) => {
                let data = out
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::other(format!("GetObject body {key}: {e}")))?;
                Ok(data.into_bytes().to_vec())
            }
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    Err(StorageError::not_found(key))
                } else if err
                    .as_service_error()
                    .is_some_and(|e| e.meta().code() == Some("InvalidRange"))
                {
                    // Reading at or past EOF is how clients detect it.
                    Ok(Vec::new())
                } else {
                    Err(sdk_error("GetObject", &key, err))
                }
            }
        }
    }

    async fn write_all(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let key = Self::object_key(path)?;
        if key.is_empty() {
            return Err(StorageError::is_a_directory("/"));
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| sdk_error("PutObject", &key, e))?;
        Ok(())
    }

    async fn mkdir(&self, path: &Path) -> StorageResult<()> {
        let key = Self::object_key(path)?;
        if key.is_empty() {
            return Ok(());
        }
        let marker = format!("{key}/");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&marker)
            .body(ByteStream::from(Vec::new()))
            .send()
            .await
            .map_err(|e| sdk_error("PutObject", &marker, e))?;
        Ok(())
    }

    async fn unlink(&self, path: &Path) -> StorageResult<()> {
        let key = Self::object_key(path)?;
        if self.head_file(&key).await?.is_none() {
            return Err(StorageError::not_found(key));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteObject", &key, e))?;
        Ok(())
    }

    async fn rmdir(&self, path: &Path) -> StorageResult<()> {
        let key = Self::object_key(path)?;
        let attr = self.getattr(path).await?;
        if !attr.is_dir() {
            return Err(StorageError::not_a_directory(key));
        }

        let marker = format!("{key}/");
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&marker)
            .max_keys(2)
            .send()
            .await
            .map_err(|e| sdk_error("ListObjectsV2", &marker, e))?;

        let occupied = out
            .contents()
            .iter()
            .filter_map(|o| o.key())
            .any(|k| k != marker);
        if occupied {
            return Err(StorageError::directory_not_empty(key));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&marker)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteObject", &marker, e))?;
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let from_key = Self::object_key(from)?;
        let to_key = Self::object_key(to)?;

        let attr = self.getattr(from).await?;
        if attr.is_dir() {
            // A prefix rename would be a copy of every descendant; the
            // store has no atomic equivalent. Declared limit.
            return Err(StorageError::unsupported(
                "directory rename on object storage",
            ));
        }

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(&to_key)
            .copy_source(format!("{}/{}", self.bucket, from_key))
            .send()
            .await
            .map_err(|e| sdk_error("CopyObject", &from_key, e))?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&from_key)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteObject", &from_key, e))?;
        Ok(())
    }

    async fn setattr(&self, path: &Path, _attr: SetAttr) -> StorageResult<FileAttr> {
        // The store has no POSIX attribute bits. Under the Ignore policy
        // the call succeeds without touching anything.
        self.getattr(path).await
    }

    fn attribute_policy(&self) -> AttributePolicy {
        AttributePolicy::Ignore
    }
}

/// Map an SDK failure to a storage error.
///
/// A failed role assumption travels inside the SDK error as the
/// credential provider's source; it must surface as a credential
/// failure on the operation that needed it, not a generic one.
fn sdk_error(op: &str, target: &str, err: impl std::error::Error + 'static) -> StorageError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(e) = source {
        if let Some(exchange) = e.downcast_ref::<CredentialExchangeError>() {
            return StorageError::credentials(exchange.to_string());
        }
        source = e.source();
    }
    StorageError::other(format!("{op} {target}: {err}"))
}

/// Join normalized components into a key. Deliberately not OS-path
/// formatting: keys are always `/`-separated.
fn key_string(normalized: &Path) -> String {
    let mut key = String::new();
    for component in normalized.components() {
        if let std::path::Component::Normal(s) = component {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(&s.to_string_lossy());
        }
    }
    key
}

fn datetime_to_system_time(dt: &aws_sdk_s3::primitives::DateTime) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(dt.secs().max(0) as u64)
}
