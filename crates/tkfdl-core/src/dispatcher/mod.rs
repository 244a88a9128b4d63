//! Download dispatcher: hands resolved downloads to the platform.
//!
//! Two paths exist. The service path enqueues on the platform download
//! service and tracks the id in [`ActiveDownloads`]. The direct (legacy)
//! path fetches the body itself on a single background worker and saves it
//! through the media store, falling back to a plain file write. Neither
//! path lets an error escape: failures are logged and shown as a notice.

pub mod http;
mod image;
mod legacy;

pub use image::ImageDownload;
pub use legacy::{DirectHandle, LegacyWorker, SavedDownload, SavedTo};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::active::{ActiveDownloads, CompletionHandle};
use crate::classify::{Classifier, ResolvedDownload};
use crate::config::{StorageModel, TkfConfig};
use crate::error::DownloadError;
use crate::platform::{Collection, Destination, DownloadId, EnqueueRequest, Platform};

use self::http::HttpOptions;

/// Public directory downloads go to on legacy storage.
pub const PUBLIC_DOWNLOADS_DIR: &str = "Download";

/// Transport details the page supplies alongside a download.
#[derive(Debug, Clone, Default)]
pub struct TransportMeta {
    pub user_agent: Option<String>,
    /// `Cookie` header value; the platform cookie jar is asked when unset.
    pub cookies: Option<String>,
    pub extra_headers: Vec<(String, String)>,
}

impl TransportMeta {
    pub fn with_user_agent(ua: Option<&str>) -> Self {
        TransportMeta {
            user_agent: ua.map(str::to_string).filter(|ua| !ua.trim().is_empty()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub storage_model: StorageModel,
    pub download_subdir: String,
    pub user_agent: String,
    /// Root for direct file writes.
    pub download_dir: PathBuf,
    pub http: HttpOptions,
}

impl DispatchSettings {
    pub fn from_config(cfg: &TkfConfig) -> Self {
        let download_dir = cfg.download_dir.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        });
        DispatchSettings {
            storage_model: cfg.storage_model,
            download_subdir: cfg.download_subdir.clone(),
            user_agent: cfg.user_agent.clone(),
            download_dir,
            http: HttpOptions::from_config(cfg),
        }
    }

    /// Directory direct writes land in: `<download_dir>/<subdir>`.
    pub fn legacy_dir(&self) -> PathBuf {
        self.download_dir.join(self.download_subdir.trim_matches('/'))
    }

    fn destination(&self, resolved: &ResolvedDownload) -> Destination {
        match self.storage_model {
            StorageModel::Legacy => Destination::PublicDir {
                relative_path: PathBuf::from(PUBLIC_DOWNLOADS_DIR)
                    .join(self.download_subdir.trim_matches('/'))
                    .join(&resolved.file_name),
            },
            StorageModel::Scoped => {
                let collection = Collection::for_mime(&resolved.mime_type);
                Destination::Collection {
                    collection,
                    relative_path: collection.relative_path(&self.download_subdir),
                }
            }
        }
    }
}

/// A download accepted by the platform service.
#[derive(Debug)]
pub struct Dispatched {
    pub id: DownloadId,
    pub completion: CompletionHandle,
}

/// Everything a job on the legacy worker needs; cheap to clone.
#[derive(Clone)]
pub(crate) struct DirectContext {
    pub(crate) platform: Platform,
    pub(crate) classifier: Classifier,
    pub(crate) settings: Arc<DispatchSettings>,
}

impl DirectContext {
    pub(crate) fn needs_permission(&self) -> bool {
        self.settings.storage_model == StorageModel::Legacy
            && !self.platform.permission.storage_permission_granted()
    }

    pub(crate) fn request_headers(
        &self,
        url: &str,
        accept: &str,
        transport: &TransportMeta,
    ) -> Vec<(String, String)> {
        let user_agent = transport
            .user_agent
            .clone()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| self.settings.user_agent.clone());
        let cookies = transport
            .cookies
            .clone()
            .or_else(|| self.platform.cookies.cookies_for(url))
            .filter(|c| !c.trim().is_empty());

        let mut headers = vec![("User-Agent".to_string(), user_agent)];
        if let Some(c) = cookies {
            headers.push(("Cookie".to_string(), c));
        }
        headers.push(("Accept".to_string(), accept.to_string()));
        for (k, v) in &transport.extra_headers {
            if headers.iter().any(|(h, _)| h.eq_ignore_ascii_case(k)) {
                continue;
            }
            headers.push((k.clone(), v.clone()));
        }
        headers
    }
}

/// `Accept` value for a download of `mime`.
pub fn accept_for(mime: &str) -> &str {
    let mime = mime.trim();
    if mime.is_empty() {
        "*/*"
    } else if mime.to_ascii_lowercase().starts_with("image/") {
        "image/*"
    } else {
        mime
    }
}

pub struct Dispatcher {
    ctx: DirectContext,
    active: Arc<ActiveDownloads>,
    worker: LegacyWorker,
}

impl Dispatcher {
    /// Starts the legacy worker thread.
    pub fn new(
        platform: Platform,
        active: Arc<ActiveDownloads>,
        classifier: Classifier,
        settings: DispatchSettings,
    ) -> Result<Self> {
        Ok(Dispatcher {
            ctx: DirectContext {
                platform,
                classifier,
                settings: Arc::new(settings),
            },
            active,
            worker: LegacyWorker::spawn()?,
        })
    }

    pub fn platform(&self) -> &Platform {
        &self.ctx.platform
    }

    pub fn classifier(&self) -> &Classifier {
        &self.ctx.classifier
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.ctx.settings
    }

    pub fn active(&self) -> &Arc<ActiveDownloads> {
        &self.active
    }

    /// Enqueue `resolved` on the platform download service.
    ///
    /// Returns `None` after telling the user when the storage permission is
    /// missing (legacy storage) or the service refuses the request.
    pub fn dispatch(
        &self,
        resolved: &ResolvedDownload,
        url: &str,
        transport: &TransportMeta,
    ) -> Option<Dispatched> {
        let notifier = &self.ctx.platform.notifier;
        if self.ctx.needs_permission() {
            warn!(url, "storage permission not granted, download aborted");
            notifier.toast("Storage permission is required to download files");
            return None;
        }

        let request = EnqueueRequest {
            url: url.to_string(),
            file_name: resolved.file_name.clone(),
            mime_type: resolved.mime_type.clone(),
            destination: self.ctx.settings.destination(resolved),
            headers: self
                .ctx
                .request_headers(url, accept_for(&resolved.mime_type), transport),
            title: resolved.file_name.clone(),
            description: "Downloading file...".to_string(),
        };

        match self.enqueue(request) {
            Ok(id) => {
                let completion =
                    self.active
                        .register(id, &resolved.file_name, &resolved.mime_type);
                info!(%id, file_name = %resolved.file_name, mime_type = %resolved.mime_type, "download enqueued");
                notifier.toast(&format!("Download started: {}", resolved.file_name));
                Some(Dispatched { id, completion })
            }
            Err(e) => {
                error!(url, error = %e, "enqueue failed");
                notifier.toast(&format!("Download failed: {e}"));
                None
            }
        }
    }

    /// Headers sent for a request to `url`: User-Agent, cookies, Accept, extras.
    pub fn request_headers(
        &self,
        url: &str,
        accept: &str,
        transport: &TransportMeta,
    ) -> Vec<(String, String)> {
        self.ctx.request_headers(url, accept, transport)
    }

    fn enqueue(&self, request: EnqueueRequest) -> Result<DownloadId, DownloadError> {
        self.ctx.platform.downloads.enqueue(request)
    }

    /// Fetch `url` directly on the legacy worker and save it.
    ///
    /// The file name is fixed up again from the response headers. The
    /// returned handle resolves once the job has run; the user has been
    /// notified either way by then.
    pub fn dispatch_direct(
        &self,
        url: &str,
        file_name: Option<&str>,
        transport: &TransportMeta,
    ) -> DirectHandle {
        let ctx = self.ctx.clone();
        let url = url.to_string();
        let file_name = file_name.map(str::to_string);
        let transport = transport.clone();
        self.submit(move || legacy::run_direct(&ctx, &url, file_name.as_deref(), &transport))
    }

    fn submit<F>(&self, job: F) -> DirectHandle
    where
        F: FnOnce() -> Result<SavedDownload, DownloadError> + Send + 'static,
    {
        let notifier = Arc::clone(&self.ctx.platform.notifier);
        let (handle, submitted) = self.worker.submit_reporting(&self.ctx, job);
        if !submitted {
            error!("legacy worker stopped, direct download dropped");
            notifier.toast("Download failed: worker stopped");
        }
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{FixedClock, SiteRules};
    use crate::platform::local::{
        DeniedPermission, FixedCookies, LocalPlatform, Notice, RejectingMediaStore,
        ScriptedDownloadService,
    };
    use crate::platform::path_from_uri;

    struct Fixture {
        dispatcher: Dispatcher,
        service: Arc<ScriptedDownloadService>,
        local: LocalPlatform,
        dir: tempfile::TempDir,
    }

    fn fixture(storage_model: StorageModel, tweak: impl FnOnce(&mut Platform)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(ScriptedDownloadService::new());
        let mut local = LocalPlatform::new(dir.path().join("media"), service.clone());
        tweak(&mut local.platform);
        let settings = DispatchSettings {
            storage_model,
            download_subdir: "Downloads".into(),
            user_agent: "default-ua".into(),
            download_dir: dir.path().join("files"),
            http: HttpOptions::default(),
        };
        let classifier =
            Classifier::with_clock(FixedClock::at(2024, 2, 1, 9, 30, 0), SiteRules::default());
        let dispatcher = Dispatcher::new(
            local.platform.clone(),
            Arc::new(ActiveDownloads::new()),
            classifier,
            settings,
        )
        .unwrap();
        Fixture {
            dispatcher,
            service,
            local,
            dir,
        }
    }

    fn resolved(name: &str, mime: &str) -> ResolvedDownload {
        ResolvedDownload {
            file_name: name.into(),
            mime_type: mime.into(),
        }
    }

    #[test]
    fn scoped_image_goes_to_images_collection() {
        let f = fixture(StorageModel::Scoped, |_| {});
        let d = f
            .dispatcher
            .dispatch(
                &resolved("42SoilContinuity.jpg", "image/jpeg"),
                "https://tkf.example/DownloadFile?type=FSoilContinuity&id=42",
                &TransportMeta::default(),
            )
            .unwrap();
        let requests = f.service.requests();
        assert_eq!(requests.len(), 1);
        let (id, req) = &requests[0];
        assert_eq!(*id, d.id);
        assert_eq!(
            req.destination,
            Destination::Collection {
                collection: Collection::Images,
                relative_path: "Pictures/Downloads".into(),
            }
        );
        assert_eq!(req.header("Accept"), Some("image/*"));
        assert_eq!(req.header("User-Agent"), Some("default-ua"));
        assert_eq!(req.header("Cookie"), None);
        assert!(f.dispatcher.active().contains(d.id));
        assert_eq!(
            f.local.notifier.toasts(),
            vec!["Download started: 42SoilContinuity.jpg".to_string()]
        );
    }

    #[test]
    fn legacy_document_goes_to_public_downloads() {
        let f = fixture(StorageModel::Legacy, |_| {});
        let transport = TransportMeta {
            user_agent: Some("page-ua".into()),
            cookies: Some("ASP.NET_SessionId=abc".into()),
            extra_headers: vec![
                ("Referer".into(), "https://tkf.example/form".into()),
                ("accept".into(), "text/html".into()),
            ],
        };
        f.dispatcher
            .dispatch(&resolved("Rapor.pdf", "application/pdf"), "https://x.test/r", &transport)
            .unwrap();
        let (_, req) = &f.service.requests()[0];
        assert_eq!(
            req.destination,
            Destination::PublicDir {
                relative_path: PathBuf::from("Download/Downloads/Rapor.pdf"),
            }
        );
        assert_eq!(req.header("Accept"), Some("application/pdf"));
        assert_eq!(req.header("User-Agent"), Some("page-ua"));
        assert_eq!(req.header("Cookie"), Some("ASP.NET_SessionId=abc"));
        assert_eq!(req.header("Referer"), Some("https://tkf.example/form"));
        assert_eq!(req.headers.len(), 4);
    }

    #[test]
    fn cookies_come_from_jar_when_page_gives_none() {
        let f = fixture(StorageModel::Scoped, |p| {
            p.cookies = Arc::new(FixedCookies("sid=1".into()));
        });
        f.dispatcher
            .dispatch(&resolved("a.bin", ""), "https://x.test/a", &TransportMeta::default())
            .unwrap();
        let (_, req) = &f.service.requests()[0];
        assert_eq!(req.header("Cookie"), Some("sid=1"));
        assert_eq!(req.header("Accept"), Some("*/*"));
    }

    #[test]
    fn legacy_without_permission_aborts() {
        let f = fixture(StorageModel::Legacy, |p| {
            p.permission = Arc::new(DeniedPermission);
        });
        let r = f.dispatcher.dispatch(
            &resolved("a.pdf", "application/pdf"),
            "https://x.test/a.pdf",
            &TransportMeta::default(),
        );
        assert!(r.is_none());
        assert!(f.service.requests().is_empty());
        assert_eq!(
            f.local.notifier.toasts(),
            vec!["Storage permission is required to download files".to_string()]
        );
    }

    #[test]
    fn scoped_ignores_permission_state() {
        let f = fixture(StorageModel::Scoped, |p| {
            p.permission = Arc::new(DeniedPermission);
        });
        assert!(f
            .dispatcher
            .dispatch(&resolved("a.pdf", "application/pdf"), "https://x.test/a.pdf", &TransportMeta::default())
            .is_some());
    }

    #[test]
    fn enqueue_failure_is_reported_not_raised() {
        let f = fixture(StorageModel::Scoped, |_| {});
        f.service.fail_enqueue("queue full");
        let r = f.dispatcher.dispatch(
            &resolved("a.pdf", "application/pdf"),
            "https://x.test/a.pdf",
            &TransportMeta::default(),
        );
        assert!(r.is_none());
        assert!(f.dispatcher.active().is_empty());
        assert_eq!(
            f.local.notifier.toasts(),
            vec!["Download failed: platform: queue full".to_string()]
        );
    }

    #[test]
    fn network_image_names() {
        let f = fixture(StorageModel::Scoped, |_| {});
        let r = f.dispatcher.resolve_network_image("https://x.test/img/photo.png?w=300");
        assert_eq!(r, resolved("photo.png", "image/png"));
        let r = f.dispatcher.resolve_network_image("https://x.test/img/thumb");
        assert_eq!(r, resolved("thumb.jpg", "image/jpeg"));
        let r = f.dispatcher.resolve_network_image("https://x.test/");
        assert_eq!(r, resolved("IMG_20240201_093000.jpg", "image/jpeg"));
    }

    #[test]
    fn network_image_is_queued() {
        let f = fixture(StorageModel::Scoped, |_| {});
        match f
            .dispatcher
            .download_image("https://x.test/img/photo.gif", &TransportMeta::default())
        {
            ImageDownload::Queued(Some(d)) => assert!(f.dispatcher.active().contains(d.id)),
            other => panic!("unexpected {other:?}"),
        }
        let (_, req) = &f.service.requests()[0];
        assert_eq!(req.file_name, "photo.gif");
        assert_eq!(req.header("Accept"), Some("image/*"));
    }

    #[test]
    fn content_image_copied_into_media_store() {
        let f = fixture(StorageModel::Scoped, |_| {});
        let src = f.dir.path().join("scan.PNG");
        std::fs::write(&src, b"png-bytes").unwrap();
        let handle = match f
            .dispatcher
            .download_image(&crate::platform::file_uri(&src), &TransportMeta::default())
        {
            ImageDownload::Copying(h) => h,
            other => panic!("unexpected {other:?}"),
        };
        let saved = handle.blocking_recv().unwrap().unwrap();
        assert_eq!(saved.saved_to, SavedTo::MediaStore);
        assert_eq!(saved.mime_type, "image/png");
        let path = path_from_uri(&saved.uri).unwrap();
        assert_eq!(path, f.dir.path().join("media/Pictures/Downloads/scan.PNG"));
        assert_eq!(std::fs::read(path).unwrap(), b"png-bytes");
        assert!(f
            .local
            .notifier
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::OfferOpen { mime_type, .. } if mime_type == "image/png")));
    }

    #[test]
    fn media_store_failure_falls_back_to_file() {
        let f = fixture(StorageModel::Scoped, |p| {
            p.media = Arc::new(RejectingMediaStore);
        });
        let src = f.dir.path().join("a.jpg");
        std::fs::write(&src, b"jpg").unwrap();
        let ImageDownload::Copying(handle) = f
            .dispatcher
            .download_image(&crate::platform::file_uri(&src), &TransportMeta::default())
        else {
            panic!("expected a copy job");
        };
        let saved = handle.blocking_recv().unwrap().unwrap();
        assert_eq!(saved.saved_to, SavedTo::File);
        let path = path_from_uri(&saved.uri).unwrap();
        assert_eq!(path, f.dir.path().join("files/Downloads/a.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"jpg");
        assert!(!f.dir.path().join("files/Downloads/a.jpg.part").exists());
        assert_eq!(f.local.notifier.toasts(), vec!["Downloaded: a.jpg".to_string()]);
    }

    #[test]
    fn direct_file_write_is_scanned_into_media_index() {
        let f = fixture(StorageModel::Legacy, |_| {});
        let src = f.dir.path().join("olcum.jpg");
        std::fs::write(&src, b"jpg").unwrap();
        let ImageDownload::Copying(handle) = f
            .dispatcher
            .download_image(&crate::platform::file_uri(&src), &TransportMeta::default())
        else {
            panic!("expected a copy job");
        };
        let saved = handle.blocking_recv().unwrap().unwrap();
        assert_eq!(saved.saved_to, SavedTo::File);
        let path = path_from_uri(&saved.uri).unwrap();
        assert_eq!(
            f.local.media.scanned(),
            vec![(path, "image/jpeg".to_string())]
        );
    }

    #[test]
    fn missing_content_fails_with_toast() {
        let f = fixture(StorageModel::Scoped, |_| {});
        let missing = f.dir.path().join("gone.jpg");
        let ImageDownload::Copying(handle) = f
            .dispatcher
            .download_image(&crate::platform::file_uri(&missing), &TransportMeta::default())
        else {
            panic!("expected a copy job");
        };
        let result = handle.blocking_recv().unwrap();
        assert!(matches!(result, Err(DownloadError::Storage(_))));
        let toasts = f.local.notifier.toasts();
        assert_eq!(toasts.len(), 1);
        assert!(toasts[0].starts_with("Download failed: storage:"));
    }

    #[test]
    fn direct_download_without_permission() {
        let f = fixture(StorageModel::Legacy, |p| {
            p.permission = Arc::new(DeniedPermission);
        });
        let handle =
            f.dispatcher
                .dispatch_direct("https://x.test/a.pdf", None, &TransportMeta::default());
        let result = handle.blocking_recv().unwrap();
        assert!(matches!(result, Err(DownloadError::PermissionDenied)));
        assert_eq!(
            f.local.notifier.toasts(),
            vec!["Storage permission is required to download files".to_string()]
        );
    }

    #[test]
    fn accept_values() {
        assert_eq!(accept_for("image/png"), "image/*");
        assert_eq!(accept_for(""), "*/*");
        assert_eq!(accept_for("application/pdf"), "application/pdf");
    }
}
