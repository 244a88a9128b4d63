//! Filesystem and log-backed platform services for the desktop CLI and tests.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{info, warn};

use super::{
    file_uri, path_from_uri, Collection, ContentMetadata, ContentResolver, CookieJar,
    Destination, DownloadId, DownloadRecord, DownloadService, DownloadStatus, EnqueueRequest,
    Launcher, MediaEntry, MediaStore, Notifier, PermissionGate, Platform,
};
use crate::dispatcher::http::{fetch_to, HttpOptions};
use crate::error::DownloadError;
use crate::mime::mime_from_file_name;
use crate::storage::{unique_destination, PartFile};

/// Failure reason codes reported by the download service, beside HTTP statuses.
pub const ERROR_UNKNOWN: i32 = 1000;
pub const ERROR_FILE_ERROR: i32 = 1001;

/// Media index backed by a directory tree: `<root>/<relative_path>/<name>`.
#[derive(Debug)]
pub struct DirMediaStore {
    root: PathBuf,
    scanned: Mutex<Vec<(PathBuf, String)>>,
}

impl DirMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirMediaStore {
            root: root.into(),
            scanned: Mutex::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files handed to [`MediaStore::scan`], oldest first.
    pub fn scanned(&self) -> Vec<(PathBuf, String)> {
        self.scanned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl MediaStore for DirMediaStore {
    fn insert(
        &self,
        collection: Collection,
        relative_path: &str,
        file_name: &str,
        mime_type: &str,
    ) -> Result<Box<dyn MediaEntry>, DownloadError> {
        let dir = self.root.join(relative_path);
        std::fs::create_dir_all(&dir)
            .map_err(|e| DownloadError::MediaStore(format!("{}: {}", dir.display(), e)))?;
        let dest = unique_destination(&dir, file_name);
        let part = PartFile::create(&dest)
            .map_err(|e| DownloadError::MediaStore(format!("{}: {}", dest.display(), e)))?;
        tracing::debug!(?collection, mime_type, path = %dest.display(), "media entry pending");
        Ok(Box::new(DirMediaEntry {
            uri: file_uri(&dest),
            part,
        }))
    }

    fn scan(&self, path: &Path, mime_type: &str) {
        info!(path = %path.display(), mime_type, "media scan completed");
        self.scanned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((path.to_path_buf(), mime_type.to_string()));
    }
}

struct DirMediaEntry {
    uri: String,
    part: PartFile,
}

impl Write for DirMediaEntry {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.part.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.part.flush()
    }
}

impl MediaEntry for DirMediaEntry {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn publish(self: Box<Self>) -> Result<String, DownloadError> {
        let entry = *self;
        let path = entry.part.finalize()?;
        Ok(file_uri(&path))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GrantedPermission;

impl PermissionGate for GrantedPermission {
    fn storage_permission_granted(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedPermission;

impl PermissionGate for DeniedPermission {
    fn storage_permission_granted(&self) -> bool {
        false
    }
}

/// A notice as the user would have seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Toast(String),
    Succeeded {
        file_name: String,
        uri: String,
        mime_type: String,
    },
    Failed {
        file_name: String,
        reason: String,
    },
    OfferOpen {
        uri: String,
        mime_type: String,
    },
}

/// Logs every notice and keeps it for later inspection.
#[derive(Debug, Default)]
pub struct LogNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn toasts(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Toast(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    fn record(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice);
    }
}

impl Notifier for LogNotifier {
    fn toast(&self, message: &str) {
        info!(target: "tkfdl::notice", "{}", message);
        self.record(Notice::Toast(message.to_string()));
    }

    fn download_succeeded(&self, file_name: &str, uri: &str, mime_type: &str) {
        info!(target: "tkfdl::notice", file_name, uri, mime_type, "download complete");
        self.record(Notice::Succeeded {
            file_name: file_name.to_string(),
            uri: uri.to_string(),
            mime_type: mime_type.to_string(),
        });
    }

    fn download_failed(&self, file_name: &str, reason: &str) {
        warn!(target: "tkfdl::notice", file_name, reason, "download failed");
        self.record(Notice::Failed {
            file_name: file_name.to_string(),
            reason: reason.to_string(),
        });
    }

    fn offer_open(&self, uri: &str, mime_type: &str) {
        info!(target: "tkfdl::notice", uri, mime_type, "open downloaded file?");
        self.record(Notice::OfferOpen {
            uri: uri.to_string(),
            mime_type: mime_type.to_string(),
        });
    }
}

/// Launcher that opens nothing; it logs and remembers the requests.
#[derive(Debug, Default)]
pub struct NullLauncher {
    opened: Mutex<Vec<(String, String)>>,
}

impl NullLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(uri, mime_type)` pairs passed to `open_file`.
    pub fn opened(&self) -> Vec<(String, String)> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Launcher for NullLauncher {
    fn open_file(&self, uri: &str, mime_type: &str) -> Result<(), DownloadError> {
        info!(uri, mime_type, "open file");
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((uri.to_string(), mime_type.to_string()));
        Ok(())
    }

    fn open_downloads(&self) -> Result<(), DownloadError> {
        info!("open downloads list");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCookies;

impl CookieJar for NoCookies {
    fn cookies_for(&self, _url: &str) -> Option<String> {
        None
    }
}

/// The same `Cookie` header for every URL (a session copied from a browser).
#[derive(Debug, Clone)]
pub struct FixedCookies(pub String);

impl CookieJar for FixedCookies {
    fn cookies_for(&self, _url: &str) -> Option<String> {
        Some(self.0.clone()).filter(|c| !c.is_empty())
    }
}

/// Resolves `file://` URIs and plain paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContentResolver;

impl ContentResolver for FileContentResolver {
    fn metadata(&self, uri: &str) -> Option<ContentMetadata> {
        let path = path_from_uri(uri)?;
        let meta = std::fs::metadata(&path).ok()?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let mime_type = display_name
            .as_deref()
            .and_then(mime_from_file_name)
            .map(str::to_string);
        Some(ContentMetadata {
            display_name,
            mime_type,
            size: Some(meta.len()),
        })
    }

    fn open(&self, uri: &str) -> Result<Box<dyn Read + Send>, DownloadError> {
        let path = path_from_uri(uri)
            .ok_or_else(|| DownloadError::Platform(format!("unsupported content uri: {uri}")))?;
        Ok(Box::new(File::open(path)?))
    }
}

/// Download queue that runs each transfer on its own thread with curl and
/// writes under `root`.
pub struct CurlDownloadService {
    root: PathBuf,
    opts: HttpOptions,
    next_id: AtomicI64,
    records: Arc<Mutex<HashMap<DownloadId, DownloadRecord>>>,
    completed: Mutex<Option<mpsc::Sender<DownloadId>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CurlDownloadService {
    pub fn new(root: impl Into<PathBuf>, opts: HttpOptions) -> Self {
        CurlDownloadService {
            root: root.into(),
            opts,
            next_id: AtomicI64::new(1),
            records: Arc::new(Mutex::new(HashMap::new())),
            completed: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Service plus the channel on which finished ids arrive (the
    /// download-complete broadcast).
    pub fn with_completion_channel(
        root: impl Into<PathBuf>,
        opts: HttpOptions,
    ) -> (Self, mpsc::Receiver<DownloadId>) {
        let (tx, rx) = mpsc::channel();
        let svc = Self::new(root, opts);
        *svc.completed.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        (svc, rx)
    }

    /// Block until every transfer started so far has finished.
    pub fn wait_idle(&self) {
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for h in handles {
            let _ = h.join();
        }
    }

    fn target_path(&self, request: &EnqueueRequest) -> PathBuf {
        match &request.destination {
            Destination::PublicDir { relative_path } => self.root.join(relative_path),
            Destination::Collection { relative_path, .. } => {
                self.root.join(relative_path).join(&request.file_name)
            }
        }
    }
}

fn set_record(records: &Mutex<HashMap<DownloadId, DownloadRecord>>, record: DownloadRecord) {
    records
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(record.id, record);
}

fn run_transfer(
    request: &EnqueueRequest,
    target: &Path,
    opts: &HttpOptions,
) -> Result<PathBuf, DownloadError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.file_name.clone());
    std::fs::create_dir_all(dir)?;
    let mut part = PartFile::create(&unique_destination(dir, &name))?;
    fetch_to(&request.url, &request.headers, opts, &mut part)?;
    Ok(part.finalize()?)
}

impl DownloadService for CurlDownloadService {
    fn enqueue(&self, request: EnqueueRequest) -> Result<DownloadId, DownloadError> {
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let target = self.target_path(&request);
        set_record(
            &self.records,
            DownloadRecord {
                id,
                status: DownloadStatus::Pending,
                local_uri: None,
                mime_type: Some(request.mime_type.clone()),
            },
        );

        let records = Arc::clone(&self.records);
        let opts = self.opts;
        let done = self
            .completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let handle = std::thread::Builder::new()
            .name(format!("tkfdl-download-{id}"))
            .spawn(move || {
                set_record(
                    &records,
                    DownloadRecord {
                        id,
                        status: DownloadStatus::Running,
                        local_uri: None,
                        mime_type: Some(request.mime_type.clone()),
                    },
                );
                let (status, local_uri) = match run_transfer(&request, &target, &opts) {
                    Ok(path) => (DownloadStatus::Successful, Some(file_uri(&path))),
                    Err(e) => {
                        warn!(%id, url = %request.url, error = %e, "transfer failed");
                        let reason = match e {
                            DownloadError::Http(code) => i32::try_from(code).unwrap_or(ERROR_UNKNOWN),
                            DownloadError::Storage(_) => ERROR_FILE_ERROR,
                            _ => ERROR_UNKNOWN,
                        };
                        (DownloadStatus::Failed { reason }, None)
                    }
                };
                set_record(
                    &records,
                    DownloadRecord {
                        id,
                        status,
                        local_uri,
                        mime_type: Some(request.mime_type.clone()),
                    },
                );
                if let Some(tx) = done {
                    let _ = tx.send(id);
                }
            })
            .map_err(DownloadError::Storage)?;

        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
        info!(%id, "enqueued");
        Ok(id)
    }

    fn query(&self, id: DownloadId) -> Result<Option<DownloadRecord>, DownloadError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned())
    }
}

/// Download service that only remembers what it was asked; tests script the
/// outcome with [`ScriptedDownloadService::finish`].
#[derive(Debug, Default)]
pub struct ScriptedDownloadService {
    next_id: AtomicI64,
    requests: Mutex<Vec<(DownloadId, EnqueueRequest)>>,
    records: Mutex<HashMap<DownloadId, DownloadRecord>>,
    fail_enqueue: Mutex<Option<String>>,
    fail_query: Mutex<Option<String>>,
}

impl ScriptedDownloadService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<(DownloadId, EnqueueRequest)> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Make every following `enqueue` fail with this message.
    pub fn fail_enqueue(&self, message: &str) {
        *self.fail_enqueue.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }

    /// Make every following `query` fail with this message.
    pub fn fail_query(&self, message: &str) {
        *self.fail_query.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }

    pub fn finish(&self, id: DownloadId, status: DownloadStatus, local_uri: Option<&str>, mime: Option<&str>) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).insert(
            id,
            DownloadRecord {
                id,
                status,
                local_uri: local_uri.map(str::to_string),
                mime_type: mime.map(str::to_string),
            },
        );
    }

    pub fn forget(&self, id: DownloadId) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }
}

impl DownloadService for ScriptedDownloadService {
    fn enqueue(&self, request: EnqueueRequest) -> Result<DownloadId, DownloadError> {
        if let Some(msg) = self.fail_enqueue.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(DownloadError::Platform(msg));
        }
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.records.lock().unwrap_or_else(|e| e.into_inner()).insert(
            id,
            DownloadRecord {
                id,
                status: DownloadStatus::Pending,
                local_uri: None,
                mime_type: Some(request.mime_type.clone()),
            },
        );
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, request));
        Ok(id)
    }

    fn query(&self, id: DownloadId) -> Result<Option<DownloadRecord>, DownloadError> {
        if let Some(msg) = self.fail_query.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(DownloadError::Platform(msg));
        }
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned())
    }
}

/// Media store that refuses every insertion.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectingMediaStore;

impl MediaStore for RejectingMediaStore {
    fn insert(
        &self,
        _collection: Collection,
        _relative_path: &str,
        _file_name: &str,
        _mime_type: &str,
    ) -> Result<Box<dyn MediaEntry>, DownloadError> {
        Err(DownloadError::MediaStore("insert returned no uri".into()))
    }

    fn scan(&self, path: &Path, mime_type: &str) {
        tracing::debug!(path = %path.display(), mime_type, "media scan skipped");
    }
}

/// A [`Platform`] wired from the local implementations, keeping typed
/// handles to the notifier, launcher and media store so callers can
/// inspect them.
pub struct LocalPlatform {
    pub platform: Platform,
    pub notifier: Arc<LogNotifier>,
    pub launcher: Arc<NullLauncher>,
    pub media: Arc<DirMediaStore>,
}

impl LocalPlatform {
    /// Media entries go under `media_root`; permission granted, no cookies.
    pub fn new(media_root: impl Into<PathBuf>, downloads: Arc<dyn DownloadService>) -> Self {
        let notifier = Arc::new(LogNotifier::new());
        let launcher = Arc::new(NullLauncher::new());
        let media = Arc::new(DirMediaStore::new(media_root));
        let platform = Platform {
            downloads,
            media: media.clone(),
            permission: Arc::new(GrantedPermission),
            notifier: notifier.clone(),
            launcher: launcher.clone(),
            content: Arc::new(FileContentResolver),
            cookies: Arc::new(NoCookies),
        };
        LocalPlatform {
            platform,
            notifier,
            launcher,
            media,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_media_store_publishes_into_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirMediaStore::new(dir.path());
        let mut entry = store
            .insert(Collection::Images, "Pictures/Downloads", "a.jpg", "image/jpeg")
            .unwrap();
        entry.write_all(b"jpeg").unwrap();
        let uri = entry.publish().unwrap();
        let path = path_from_uri(&uri).unwrap();
        assert_eq!(path, dir.path().join("Pictures/Downloads/a.jpg"));
        assert_eq!(std::fs::read(path).unwrap(), b"jpeg");
    }

    #[test]
    fn dropped_media_entry_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirMediaStore::new(dir.path());
        {
            let mut entry = store
                .insert(Collection::Downloads, "Download", "a.pdf", "application/pdf")
                .unwrap();
            entry.write_all(b"half").unwrap();
        }
        let left: Vec<_> = std::fs::read_dir(dir.path().join("Download"))
            .unwrap()
            .collect();
        assert!(left.is_empty());
    }

    #[test]
    fn media_store_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirMediaStore::new(dir.path());
        for body in [b"one", b"two"] {
            let mut entry = store
                .insert(Collection::Downloads, "Download", "a.txt", "text/plain")
                .unwrap();
            entry.write_all(body).unwrap();
            entry.publish().unwrap();
        }
        assert_eq!(std::fs::read(dir.path().join("Download/a.txt")).unwrap(), b"one");
        assert_eq!(std::fs::read(dir.path().join("Download/a (1).txt")).unwrap(), b"two");
    }

    #[test]
    fn log_notifier_records() {
        let n = LogNotifier::new();
        n.toast("hello");
        n.offer_open("file:///a.pdf", "application/pdf");
        assert_eq!(n.toasts(), vec!["hello".to_string()]);
        assert_eq!(n.notices().len(), 2);
    }

    #[test]
    fn file_content_resolver_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("scan.png");
        std::fs::write(&p, b"12345").unwrap();
        let meta = FileContentResolver.metadata(&file_uri(&p)).unwrap();
        assert_eq!(meta.display_name.as_deref(), Some("scan.png"));
        assert_eq!(meta.mime_type.as_deref(), Some("image/png"));
        assert_eq!(meta.size, Some(5));
        assert!(FileContentResolver.metadata("content://x/1").is_none());
        let mut body = String::new();
        FileContentResolver
            .open(p.to_str().unwrap())
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "12345");
    }

    #[test]
    fn scripted_service_ids_and_failures() {
        let svc = ScriptedDownloadService::new();
        let req = EnqueueRequest {
            url: "https://x.test/a.pdf".into(),
            file_name: "a.pdf".into(),
            mime_type: "application/pdf".into(),
            destination: Destination::PublicDir {
                relative_path: PathBuf::from("Download/a.pdf"),
            },
            headers: Vec::new(),
            title: "a.pdf".into(),
            description: String::new(),
        };
        let a = svc.enqueue(req.clone()).unwrap();
        let b = svc.enqueue(req.clone()).unwrap();
        assert_ne!(a, b);
        assert_eq!(svc.query(a).unwrap().unwrap().status, DownloadStatus::Pending);
        svc.fail_enqueue("queue full");
        assert!(matches!(svc.enqueue(req), Err(DownloadError::Platform(_))));
    }

    #[test]
    fn dir_media_store_records_scans() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirMediaStore::new(dir.path());
        store.scan(&dir.path().join("Download/a.pdf"), "application/pdf");
        assert_eq!(
            store.scanned(),
            vec![(dir.path().join("Download/a.pdf"), "application/pdf".to_string())]
        );
    }
}
