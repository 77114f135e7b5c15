//! SFTP session handler.
//!
//! Implements the SFTP subsystem over a [`RootedView`]: every path a
//! client sends is confined to the session's root before it reaches the
//! backend, and every operation is reported to the session tracker.
//!
//! Uploads are staged to a local temp spool and committed to the backend
//! in one piece when the handle closes, so backends without random-access
//! writes (the object store) see only whole-file puts.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use russh_sftp::protocol::{
    Attrs, Data, File, FileAttributes, Handle, Name, OpenFlags, Status, StatusCode, Version,
};
use russh_sftp::server::Handler;
use tokio::fs::{File as TokioFile, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, error, trace};
use uuid::Uuid;

use gatehouse_vfs::{AttributePolicy, FileAttr, RootedView, SetAttr, StorageError, StorageOps};

use crate::events::{OpOutcome, SessionTracker};

/// State associated with an open handle.
#[derive(Debug)]
enum HandleState {
    Read {
        path: PathBuf,
    },
    Write {
        path: PathBuf,
        temp_path: PathBuf,
        spool: Option<TokioFile>,
    },
    Dir {
        files: Vec<File>,
        offset: usize,
    },
}

/// One authenticated SFTP session over a confined root.
#[derive(Clone)]
pub struct SftpSession {
    username: String,
    root: RootedView,
    tracker: Arc<dyn SessionTracker>,
    handles: Arc<RwLock<HashMap<String, HandleState>>>,
    next_handle_id: Arc<AtomicU32>,
    temp_dir: PathBuf,
}

impl SftpSession {
    /// Create a session for `username` over its confined view.
    pub fn new(username: String, root: RootedView, tracker: Arc<dyn SessionTracker>) -> Self {
        Self {
            username,
            root,
            tracker,
            handles: Arc::new(RwLock::new(HashMap::new())),
            next_handle_id: Arc::new(AtomicU32::new(1)),
            temp_dir: std::env::temp_dir(),
        }
    }

    /// The authenticated username.
    pub fn username(&self) -> &str {
        &self.username
    }

    fn generate_handle_id(&self) -> String {
        let id = self.next_handle_id.fetch_add(1, Ordering::Relaxed);
        format!("handle_{id}")
    }

    fn track(&self, op: &str, path: &str, outcome: OpOutcome) {
        self.tracker.operation(&self.username, op, path, outcome);
    }

    fn reject(&self, op: &str, path: &str, err: &StorageError) -> StatusCode {
        debug!(username = %self.username, op, path, error = %err, "operation rejected");
        self.track(op, path, OpOutcome::Failure);
        status_of(err)
    }

    async fn cleanup_state(&self, state: HandleState) {
        if let HandleState::Write { temp_path, .. } = state {
            let _ = tokio::fs::remove_file(temp_path).await;
        }
    }

    async fn stat_path(&self, op: &str, path: &str) -> Result<FileAttributes, StatusCode> {
        match self.root.getattr(Path::new(path)).await {
            Ok(attr) => {
                self.track(op, path, OpOutcome::Success);
                Ok(to_wire_attrs(&attr))
            }
            Err(e) => Err(self.reject(op, path, &e)),
        }
    }
}

/// Map a storage error to the closest SFTP status.
fn status_of(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound(_) => StatusCode::NoSuchFile,
        StorageError::PermissionDenied(_) | StorageError::PathEscapesRoot(_) => {
            StatusCode::PermissionDenied
        }
        StorageError::Unsupported(_) => StatusCode::OpUnsupported,
        _ => StatusCode::Failure,
    }
}

fn unix_secs(time: SystemTime) -> u32 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn to_wire_attrs(attr: &FileAttr) -> FileAttributes {
    let mut attrs = FileAttributes {
        size: Some(attr.size),
        permissions: Some(attr.perm),
        mtime: Some(unix_secs(attr.mtime)),
        uid: attr.uid,
        gid: attr.gid,
        ..Default::default()
    };
    if attr.is_dir() {
        attrs.set_dir(true);
    }
    attrs
}

/// `ls -l` style line some clients show verbatim.
fn longname(name: &str, attr: &FileAttr) -> String {
    let type_char = if attr.is_dir() { 'd' } else { '-' };
    let mut mode = String::new();
    for shift in [6u32, 3, 0] {
        let bits = (attr.perm >> shift) & 0o7;
        mode.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        mode.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        mode.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    format!(
        "{}{} 1 gatehouse gatehouse {:>12} Jan  1  1970 {}",
        type_char, mode, attr.size, name
    )
}

fn ok_status(id: u32) -> Status {
    Status {
        id,
        status_code: StatusCode::Ok,
        error_message: "Ok".into(),
        language_tag: "en-US".into(),
    }
}

fn wire_setattr(attrs: &FileAttributes) -> SetAttr {
    SetAttr {
        size: attrs.size,
        perm: attrs.permissions,
        mtime: attrs
            .mtime
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs as u64)),
    }
}

impl Handler for SftpSession {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    fn init(
        &mut self,
        version: u32,
        _extensions: HashMap<String, String>,
    ) -> impl Future<Output = Result<Version, Self::Error>> + Send {
        async move {
            trace!("SFTP init, client version {version}");
            Ok(Version::new())
        }
    }

    fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> impl Future<Output = Result<Handle, Self::Error>> + Send {
        let this = self.clone();
        async move {
            debug!("SFTP open: {filename} (flags: {pflags:?})");
            let path = PathBuf::from(&filename);
            let handle_id = this.generate_handle_id();

            let state = if pflags.contains(OpenFlags::WRITE)
                || pflags.contains(OpenFlags::CREATE)
                || pflags.contains(OpenFlags::TRUNCATE)
            {
                if pflags.contains(OpenFlags::APPEND) {
                    return Err(StatusCode::OpUnsupported);
                }

                // Refuse the open before spooling anything if the path
                // is invalid for this session.
                if let Err(e) = gatehouse_vfs::virtual_path::resolve(&path) {
                    return Err(this.reject("open", &filename, &e));
                }

                let temp_path = this
                    .temp_dir
                    .join(format!("gatehouse-upload-{}.tmp", Uuid::new_v4()));
                let spool = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&temp_path)
                    .await
                    .map_err(|e| {
                        error!("failed to create upload spool: {e}");
                        StatusCode::Failure
                    })?;

                HandleState::Write {
                    path,
                    temp_path,
                    spool: Some(spool),
                }
            } else {
                match this.root.getattr(&path).await {
                    Ok(attr) if attr.is_dir() => {
                        return Err(this.reject(
                            "open",
                            &filename,
                            &StorageError::is_a_directory(filename.clone()),
                        ));
                    }
                    Ok(_) => HandleState::Read { path },
                    Err(e) => return Err(this.reject("open", &filename, &e)),
                }
            };

            this.handles.write().await.insert(handle_id.clone(), state);
            Ok(Handle {
                id,
                handle: handle_id,
            })
        }
    }

    fn close(
        &mut self,
        id: u32,
        handle: String,
    ) -> impl Future<Output = Result<Status, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let state = this.handles.write().await.remove(&handle);

            match state {
                Some(HandleState::Write {
                    path,
                    temp_path,
                    mut spool,
                }) => {
                    let display = path.display().to_string();
                    let mut file = spool.take().ok_or(StatusCode::Failure)?;

                    let commit = async {
                        file.flush().await?;
                        file.seek(std::io::SeekFrom::Start(0)).await?;
                        let mut data = Vec::new();
                        file.read_to_end(&mut data).await?;
                        Ok::<Vec<u8>, std::io::Error>(data)
                    };

                    let data = match commit.await {
                        Ok(data) => data,
                        Err(e) => {
                            error!("upload spool for {display} failed: {e}");
                            let _ = tokio::fs::remove_file(&temp_path).await;
                            this.track("write", &display, OpOutcome::Failure);
                            return Err(StatusCode::Failure);
                        }
                    };

                    let result = this.root.write_all(&path, &data).await;
                    let _ = tokio::fs::remove_file(&temp_path).await;

                    match result {
                        Ok(()) => {
                            this.track("write", &display, OpOutcome::Success);
                            Ok(ok_status(id))
                        }
                        Err(e) => Err(this.reject("write", &display, &e)),
                    }
                }
                Some(state) => {
                    this.cleanup_state(state).await;
                    Ok(ok_status(id))
                }
                None => Err(StatusCode::NoSuchFile),
            }
        }
    }

    fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> impl Future<Output = Result<Data, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let path = {
                let guard = this.handles.read().await;
                match guard.get(&handle) {
                    Some(HandleState::Read { path }) => path.clone(),
                    Some(_) => return Err(StatusCode::OpUnsupported),
                    None => return Err(StatusCode::NoSuchFile),
                }
            };

            match this.root.read(&path, offset, len).await {
                Ok(data) if data.is_empty() => Err(StatusCode::Eof),
                Ok(data) => {
                    this.track("read", &path.display().to_string(), OpOutcome::Success);
                    Ok(Data { id, data })
                }
                Err(e) => Err(this.reject("read", &path.display().to_string(), &e)),
            }
        }
    }

    fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<Status, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let mut guard = this.handles.write().await;

            let Some(HandleState::Write { spool, .. }) = guard.get_mut(&handle) else {
                return Err(StatusCode::NoSuchFile);
            };
            let Some(file) = spool else {
                return Err(StatusCode::Failure);
            };

            if let Err(e) = file.seek(std::io::SeekFrom::Start(offset)).await {
                error!("spool seek failed: {e}");
                return Err(StatusCode::Failure);
            }
            if let Err(e) = file.write_all(&data).await {
                error!("spool write failed: {e}");
                return Err(StatusCode::Failure);
            }

            Ok(ok_status(id))
        }
    }

    fn lstat(
        &mut self,
        id: u32,
        path: String,
    ) -> impl Future<Output = Result<Attrs, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let attrs = this.stat_path("stat", &path).await?;
            Ok(Attrs { id, attrs })
        }
    }

    fn fstat(
        &mut self,
        id: u32,
        handle: String,
    ) -> impl Future<Output = Result<Attrs, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let path = {
                let guard = this.handles.read().await;
                match guard.get(&handle) {
                    Some(HandleState::Read { path }) => path.clone(),
                    Some(HandleState::Write { path, .. }) => path.clone(),
                    Some(HandleState::Dir { .. }) => PathBuf::from("."),
                    None => return Err(StatusCode::NoSuchFile),
                }
            };
            let attrs = this.stat_path("stat", &path.display().to_string()).await?;
            Ok(Attrs { id, attrs })
        }
    }

    fn setstat(
        &mut self,
        id: u32,
        path: String,
        attrs: FileAttributes,
    ) -> impl Future<Output = Result<Status, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let set = wire_setattr(&attrs);
            match this.root.setattr(Path::new(&path), set).await {
                Ok(_) => {
                    this.track("setstat", &path, OpOutcome::Success);
                    Ok(ok_status(id))
                }
                // Under the ignore policy an unsupported attribute is a
                // silent no-op, not a client-visible failure.
                Err(StorageError::Unsupported(_))
                    if this.root.attribute_policy() == AttributePolicy::Ignore =>
                {
                    this.track("setstat", &path, OpOutcome::Success);
                    Ok(ok_status(id))
                }
                Err(e) => Err(this.reject("setstat", &path, &e)),
            }
        }
    }

    fn fsetstat(
        &mut self,
        id: u32,
        handle: String,
        attrs: FileAttributes,
    ) -> impl Future<Output = Result<Status, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let path = {
                let guard = this.handles.read().await;
                match guard.get(&handle) {
                    Some(HandleState::Read { path }) => path.clone(),
                    Some(HandleState::Write { path, .. }) => path.clone(),
                    _ => return Err(StatusCode::NoSuchFile),
                }
            };
            let mut session = this.clone();
            session.setstat(id, path.display().to_string(), attrs).await
        }
    }

    fn opendir(
        &mut self,
        id: u32,
        path: String,
    ) -> impl Future<Output = Result<Handle, Self::Error>> + Send {
        let this = self.clone();
        async move {
            debug!("SFTP opendir: {path}");

            let entries = match this.root.readdir(Path::new(&path)).await {
                Ok(entries) => entries,
                Err(e) => return Err(this.reject("list", &path, &e)),
            };

            let files = entries
                .iter()
                .map(|entry| File {
                    filename: entry.name.clone(),
                    longname: longname(&entry.name, &entry.attr),
                    attrs: to_wire_attrs(&entry.attr),
                })
                .collect();

            this.track("list", &path, OpOutcome::Success);

            let handle_id = this.generate_handle_id();
            this.handles
                .write()
                .await
                .insert(handle_id.clone(), HandleState::Dir { files, offset: 0 });
            Ok(Handle {
                id,
                handle: handle_id,
            })
        }
    }

    fn readdir(
        &mut self,
        id: u32,
        handle: String,
    ) -> impl Future<Output = Result<Name, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let mut guard = this.handles.write().await;

            if let Some(HandleState::Dir { files, offset }) = guard.get_mut(&handle) {
                if *offset >= files.len() {
                    return Err(StatusCode::Eof);
                }
                let chunk = files[*offset..].to_vec();
                *offset = files.len();
                Ok(Name { id, files: chunk })
            } else {
                Err(StatusCode::NoSuchFile)
            }
        }
    }

    fn remove(
        &mut self,
        id: u32,
        filename: String,
    ) -> impl Future<Output = Result<Status, Self::Error>> + Send {
        let this = self.clone();
        async move {
            match this.root.unlink(Path::new(&filename)).await {
                Ok(()) => {
                    this.track("remove", &filename, OpOutcome::Success);
                    Ok(ok_status(id))
                }
                Err(e) => Err(this.reject("remove", &filename, &e)),
            }
        }
    }

    fn mkdir(
        &mut self,
        id: u32,
        path: String,
        _attrs: FileAttributes,
    ) -> impl Future<Output = Result<Status, Self::Error>> + Send {
        let this = self.clone();
        async move {
            match this.root.mkdir(Path::new(&path)).await {
                Ok(()) => {
                    this.track("mkdir", &path, OpOutcome::Success);
                    Ok(ok_status(id))
                }
                Err(e) => Err(this.reject("mkdir", &path, &e)),
            }
        }
    }

    fn rmdir(
        &mut self,
        id: u32,
        path: String,
    ) -> impl Future<Output = Result<Status, Self::Error>> + Send {
        let this = self.clone();
        async move {
            match this.root.rmdir(Path::new(&path)).await {
                Ok(()) => {
                    this.track("rmdir", &path, OpOutcome::Success);
                    Ok(ok_status(id))
                }
                Err(e) => Err(this.reject("rmdir", &path, &e)),
            }
        }
    }

    fn realpath(
        &mut self,
        id: u32,
        path: String,
    ) -> impl Future<Output = Result<Name, Self::Error>> + Send {
        async move {
            // Resolution is lexical and stays inside the confined root;
            // an escape collapses to the root itself, which is what SFTP
            // clients expect from `cd ..` at the top.
            let mut current = PathBuf::new();
            for component in Path::new(&path).components() {
                match component {
                    std::path::Component::Normal(s) => current.push(s),
                    std::path::Component::ParentDir => {
                        current.pop();
                    }
                    _ => {}
                }
            }
            let normalized = format!("/{}", current.display());
            Ok(Name {
                id,
                files: vec![File {
                    filename: normalized.clone(),
                    longname: normalized,
                    attrs: FileAttributes::default(),
                }],
            })
        }
    }

    fn stat(
        &mut self,
        id: u32,
        path: String,
    ) -> impl Future<Output = Result<Attrs, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let attrs = this.stat_path("stat", &path).await?;
            Ok(Attrs { id, attrs })
        }
    }

    fn rename(
        &mut self,
        id: u32,
        oldpath: String,
        newpath: String,
    ) -> impl Future<Output = Result<Status, Self::Error>> + Send {
        let this = self.clone();
        async move {
            debug!("SFTP rename: {oldpath} -> {newpath}");
            match this
                .root
                .rename(Path::new(&oldpath), Path::new(&newpath))
                .await
            {
                Ok(()) => {
                    this.track("rename", &oldpath, OpOutcome::Success);
                    Ok(ok_status(id))
                }
                Err(e) => Err(this.reject("rename", &oldpath, &e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopTracker;
    use async_trait::async_trait;
    use gatehouse_vfs::{DirEntry, MemoryBackend, StorageResult};

    fn session_over_memory() -> SftpSession {
        let backend: Arc<dyn StorageOps> = Arc::new(MemoryBackend::new());
        let root = RootedView::confine(backend, "home/alice").unwrap();
        SftpSession::new("alice".into(), root, Arc::new(NoopTracker))
    }

    async fn upload(session: &mut SftpSession, name: &str, data: &[u8]) {
        let handle = session
            .open(
                1,
                name.to_string(),
                OpenFlags::WRITE | OpenFlags::CREATE,
                FileAttributes::default(),
            )
            .await
            .unwrap();
        session
            .write(2, handle.handle.clone(), 0, data.to_vec())
            .await
            .unwrap();
        session.close(3, handle.handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let mut session = session_over_memory();
        upload(&mut session, "report.csv", b"a,b,c\n1,2,3\n").await;

        let handle = session
            .open(
                4,
                "report.csv".into(),
                OpenFlags::READ,
                FileAttributes::default(),
            )
            .await
            .unwrap();
        let data = session.read(5, handle.handle.clone(), 0, 1024).await.unwrap();
        assert_eq!(data.data, b"a,b,c\n1,2,3\n");

        // Reading past EOF signals Eof, not an error status.
        let eof = session.read(6, handle.handle.clone(), 1024, 1024).await;
        assert_eq!(eof.unwrap_err(), StatusCode::Eof);

        session.close(7, handle.handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_write_chunks() {
        let mut session = session_over_memory();

        let handle = session
            .open(
                1,
                "blob.bin".into(),
                OpenFlags::WRITE | OpenFlags::CREATE,
                FileAttributes::default(),
            )
            .await
            .unwrap();
        session
            .write(2, handle.handle.clone(), 6, b"world".to_vec())
            .await
            .unwrap();
        session
            .write(3, handle.handle.clone(), 0, b"hello ".to_vec())
            .await
            .unwrap();
        session.close(4, handle.handle).await.unwrap();

        let mut check = session.clone();
        let handle = check
            .open(5, "blob.bin".into(), OpenFlags::READ, FileAttributes::default())
            .await
            .unwrap();
        let data = check.read(6, handle.handle, 0, 100).await.unwrap();
        assert_eq!(data.data, b"hello world");
    }

    #[tokio::test]
    async fn test_escape_is_permission_denied() {
        let mut session = session_over_memory();

        let err = session
            .open(
                1,
                "../../etc/passwd".into(),
                OpenFlags::READ,
                FileAttributes::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::PermissionDenied);

        let err = session
            .open(
                2,
                "../../etc/shadow".into(),
                OpenFlags::WRITE | OpenFlags::CREATE,
                FileAttributes::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::PermissionDenied);
    }

    #[tokio::test]
    async fn test_listing_and_dirs() {
        let mut session = session_over_memory();
        upload(&mut session, "inbox/a.txt", b"a").await;
        upload(&mut session, "inbox/b.txt", b"b").await;

        let handle = session.opendir(1, "inbox".into()).await.unwrap();
        let name = session.readdir(2, handle.handle.clone()).await.unwrap();
        let names: Vec<_> = name.files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        // Cursor is exhausted after one pass.
        let eof = session.readdir(3, handle.handle.clone()).await;
        assert_eq!(eof.unwrap_err(), StatusCode::Eof);
        session.close(4, handle.handle).await.unwrap();

        session
            .mkdir(5, "outbox".into(), FileAttributes::default())
            .await
            .unwrap();
        session.rmdir(6, "outbox".into()).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_and_rename() {
        let mut session = session_over_memory();
        upload(&mut session, "old.txt", b"data").await;

        session
            .rename(1, "old.txt".into(), "new.txt".into())
            .await
            .unwrap();
        let attrs = session.stat(2, "new.txt".into()).await.unwrap();
        assert_eq!(attrs.attrs.size, Some(4));

        session.remove(3, "new.txt".into()).await.unwrap();
        let err = session.stat(4, "new.txt".into()).await.unwrap_err();
        assert_eq!(err, StatusCode::NoSuchFile);
    }

    #[tokio::test]
    async fn test_setstat_applies_on_enforcing_backend() {
        let mut session = session_over_memory();
        upload(&mut session, "f.txt", b"hello world").await;

        let attrs = FileAttributes {
            size: Some(5),
            ..Default::default()
        };
        session.setstat(1, "f.txt".into(), attrs).await.unwrap();

        let stat = session.stat(2, "f.txt".into()).await.unwrap();
        assert_eq!(stat.attrs.size, Some(5));
    }

    /// Backend that cannot store attributes at all, declaring the
    /// ignore policy like the object store does.
    struct NoAttrBackend(MemoryBackend);

    #[async_trait]
    impl StorageOps for NoAttrBackend {
        async fn getattr(&self, path: &Path) -> StorageResult<FileAttr> {
            self.0.getattr(path).await
        }
        async fn readdir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
            self.0.readdir(path).await
        }
        async fn read(&self, path: &Path, offset: u64, size: u32) -> StorageResult<Vec<u8>> {
            self.0.read(path, offset, size).await
        }
        async fn write_all(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
            self.0.write_all(path, data).await
        }
        async fn mkdir(&self, path: &Path) -> StorageResult<()> {
            self.0.mkdir(path).await
        }
        async fn unlink(&self, path: &Path) -> StorageResult<()> {
            self.0.unlink(path).await
        }
        async fn rmdir(&self, path: &Path) -> StorageResult<()> {
            self.0.rmdir(path).await
        }
        async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
            self.0.rename(from, to).await
        }
        async fn setattr(&self, path: &Path, _attr: SetAttr) -> StorageResult<FileAttr> {
            self.0.getattr(path).await
        }
        fn attribute_policy(&self) -> AttributePolicy {
            AttributePolicy::Ignore
        }
    }

    #[tokio::test]
    async fn test_setstat_ignored_on_cloud_policy() {
        let backend: Arc<dyn StorageOps> = Arc::new(NoAttrBackend(MemoryBackend::new()));
        let root = RootedView::confine(backend, "home/alice").unwrap();
        let mut session = SftpSession::new("alice".into(), root, Arc::new(NoopTracker));
        upload(&mut session, "f.txt", b"hello").await;

        // A POSIX attribute change succeeds as a no-op.
        let attrs = FileAttributes {
            permissions: Some(0o600),
            ..Default::default()
        };
        let status = session.setstat(1, "f.txt".into(), attrs).await.unwrap();
        assert_eq!(status.status_code, StatusCode::Ok);
    }

    #[tokio::test]
    async fn test_realpath_stays_at_root() {
        let mut session = session_over_memory();
        let name = session.realpath(1, "/../..".into()).await.unwrap();
        assert_eq!(name.files[0].filename, "/");
    }
}
