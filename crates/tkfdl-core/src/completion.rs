//! Completion notifier: reacts to the platform's download-complete signal.
//!
//! The signal carries only the download id. The entry is taken out of the
//! active table before anything else happens, so an id is handled at most
//! once and never lingers after an error.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::active::{ActiveDownload, ActiveDownloads, CompletionOutcome};
use crate::mime::{canonical_mime, is_generic_mime, mime_from_file_name_or_default, OCTET_STREAM};
use crate::platform::{DownloadId, DownloadStatus, Platform};
use crate::url_model::file_name_from_url_path;

pub struct CompletionNotifier {
    platform: Platform,
    active: Arc<ActiveDownloads>,
}

impl CompletionNotifier {
    pub fn new(platform: Platform, active: Arc<ActiveDownloads>) -> Self {
        CompletionNotifier { platform, active }
    }

    /// Handle the download-complete signal for `id`.
    ///
    /// Returns the outcome delivered to the download's completion handle, or
    /// `None` for ids this screen is not tracking (already handled, or
    /// started elsewhere).
    pub fn on_download_complete(&self, id: DownloadId) -> Option<CompletionOutcome> {
        let Some((download, completer)) = self.active.take(id) else {
            debug!(%id, "completion for untracked download ignored");
            return None;
        };

        let outcome = self.resolve(&download);
        completer.complete(outcome.clone());
        Some(outcome)
    }

    fn resolve(&self, download: &ActiveDownload) -> CompletionOutcome {
        let notifier = &self.platform.notifier;
        let id = download.id;

        let record = match self.platform.downloads.query(id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(%id, "download service has no record");
                return self.failed(download, None, "download not found".to_string());
            }
            Err(e) => {
                error!(%id, error = %e, "download status query failed");
                return self.failed(download, None, e.to_string());
            }
        };

        match record.status {
            DownloadStatus::Successful => {
                let mime_type = final_mime(record.mime_type.as_deref(), &download.file_name);
                match record.local_uri {
                    Some(uri) => {
                        info!(%id, file_name = %download.file_name, uri = %uri, mime_type = %mime_type, "download complete");
                        notifier.offer_open(&uri, &mime_type);
                        notifier.download_succeeded(&download.file_name, &uri, &mime_type);
                        CompletionOutcome::Succeeded {
                            uri: Some(uri),
                            mime_type,
                        }
                    }
                    None => {
                        info!(%id, file_name = %download.file_name, "download complete without local uri");
                        notifier.toast(&format!("Download completed: {}", download.file_name));
                        CompletionOutcome::Succeeded {
                            uri: None,
                            mime_type,
                        }
                    }
                }
            }
            DownloadStatus::Failed { reason } => {
                error!(%id, file_name = %download.file_name, reason, "download failed");
                self.failed(download, Some(reason), format!("download failed (reason {reason})"))
            }
            other => {
                warn!(%id, status = ?other, "completion signalled for unfinished download");
                self.failed(download, None, format!("download not finished ({other:?})"))
            }
        }
    }

    fn failed(
        &self,
        download: &ActiveDownload,
        reason: Option<i32>,
        message: String,
    ) -> CompletionOutcome {
        self.platform
            .notifier
            .download_failed(&download.file_name, &message);
        CompletionOutcome::Failed { reason, message }
    }

    /// Open a finished download, re-sniffing a generic MIME type from the URI.
    pub fn open_downloaded(&self, uri: &str, mime_type: &str) {
        let mime = if is_generic_mime(mime_type) {
            file_name_from_url_path(uri)
                .as_deref()
                .map_or(OCTET_STREAM, mime_from_file_name_or_default)
                .to_string()
        } else {
            canonical_mime(mime_type)
        };
        if let Err(e) = self.platform.launcher.open_file(uri, &mime) {
            warn!(uri, mime_type = %mime, error = %e, "could not open file");
            self.platform
                .notifier
                .toast("No application found to open this file");
        }
    }

    /// Show the platform's list of downloads.
    pub fn show_downloads(&self) {
        if let Err(e) = self.platform.launcher.open_downloads() {
            warn!(error = %e, "could not open downloads list");
            self.platform.notifier.toast("Could not open downloads");
        }
    }
}

/// Platform MIME type unless generic, else sniffed from the file name.
fn final_mime(platform_mime: Option<&str>, file_name: &str) -> String {
    match platform_mime.filter(|m| !is_generic_mime(m)) {
        Some(m) => canonical_mime(m),
        None => mime_from_file_name_or_default(file_name).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DownloadError;
    use crate::platform::local::{LocalPlatform, Notice, ScriptedDownloadService};
    use crate::platform::{DownloadService, Launcher};

    struct Fixture {
        notifier: CompletionNotifier,
        service: Arc<ScriptedDownloadService>,
        active: Arc<ActiveDownloads>,
        local: LocalPlatform,
    }

    fn fixture() -> Fixture {
        let service = Arc::new(ScriptedDownloadService::new());
        let local = LocalPlatform::new(std::env::temp_dir(), service.clone());
        let active = Arc::new(ActiveDownloads::new());
        Fixture {
            notifier: CompletionNotifier::new(local.platform.clone(), active.clone()),
            service,
            active,
            local,
        }
    }

    fn enqueue(f: &Fixture, name: &str, mime: &str) -> (DownloadId, crate::active::CompletionHandle) {
        let id = f
            .service
            .enqueue(crate::platform::EnqueueRequest {
                url: format!("https://x.test/{name}"),
                file_name: name.into(),
                mime_type: mime.into(),
                destination: crate::platform::Destination::PublicDir {
                    relative_path: name.into(),
                },
                headers: Vec::new(),
                title: name.into(),
                description: String::new(),
            })
            .unwrap();
        let handle = f.active.register(id, name, mime);
        (id, handle)
    }

    #[tokio::test]
    async fn success_offers_open_and_notifies() {
        let f = fixture();
        let (id, handle) = enqueue(&f, "photo.jpg", "image/jpeg");
        f.service.finish(
            id,
            DownloadStatus::Successful,
            Some("file:///dl/photo.jpg"),
            Some("application/octet-stream"),
        );

        let outcome = f.notifier.on_download_complete(id).unwrap();
        let expected = CompletionOutcome::Succeeded {
            uri: Some("file:///dl/photo.jpg".into()),
            mime_type: "image/jpeg".into(),
        };
        assert_eq!(outcome, expected);
        assert_eq!(handle.outcome().await, Some(expected));
        assert!(f.active.is_empty());
        assert_eq!(
            f.local.notifier.notices(),
            vec![
                Notice::OfferOpen {
                    uri: "file:///dl/photo.jpg".into(),
                    mime_type: "image/jpeg".into()
                },
                Notice::Succeeded {
                    file_name: "photo.jpg".into(),
                    uri: "file:///dl/photo.jpg".into(),
                    mime_type: "image/jpeg".into()
                },
            ]
        );
    }

    #[test]
    fn platform_mime_wins_when_specific() {
        assert_eq!(final_mime(Some("application/pdf"), "x.bin"), "application/pdf");
        assert_eq!(final_mime(Some(""), "x.pdf"), "application/pdf");
        assert_eq!(final_mime(None, "x.JPEG"), "image/jpeg");
        assert_eq!(final_mime(None, "x"), OCTET_STREAM);
    }

    #[test]
    fn success_without_uri_toasts() {
        let f = fixture();
        let (id, _h) = enqueue(&f, "a.pdf", "application/pdf");
        f.service
            .finish(id, DownloadStatus::Successful, None, Some("application/pdf"));
        assert!(matches!(
            f.notifier.on_download_complete(id),
            Some(CompletionOutcome::Succeeded { uri: None, .. })
        ));
        assert_eq!(
            f.local.notifier.toasts(),
            vec!["Download completed: a.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn failure_reports_reason() {
        let f = fixture();
        let (id, handle) = enqueue(&f, "a.pdf", "application/pdf");
        f.service
            .finish(id, DownloadStatus::Failed { reason: 404 }, None, None);
        f.notifier.on_download_complete(id);
        assert!(matches!(
            handle.outcome().await,
            Some(CompletionOutcome::Failed { reason: Some(404), .. })
        ));
        assert!(matches!(
            &f.local.notifier.notices()[..],
            [Notice::Failed { file_name, .. }] if file_name == "a.pdf"
        ));
    }

    #[test]
    fn query_error_still_removes_entry() {
        let f = fixture();
        let (id, _h) = enqueue(&f, "a.pdf", "application/pdf");
        f.service.fail_query("cursor closed");
        let outcome = f.notifier.on_download_complete(id).unwrap();
        assert_eq!(
            outcome,
            CompletionOutcome::Failed {
                reason: None,
                message: DownloadError::Platform("cursor closed".into()).to_string(),
            }
        );
        assert!(!f.active.contains(id));
    }

    #[test]
    fn forgotten_record_is_a_failure() {
        let f = fixture();
        let (id, _h) = enqueue(&f, "a.pdf", "application/pdf");
        f.service.forget(id);
        assert!(matches!(
            f.notifier.on_download_complete(id),
            Some(CompletionOutcome::Failed { reason: None, .. })
        ));
    }

    #[test]
    fn completion_is_at_most_once() {
        let f = fixture();
        let (id, _h) = enqueue(&f, "a.pdf", "application/pdf");
        f.service
            .finish(id, DownloadStatus::Successful, Some("file:///a.pdf"), None);
        assert!(f.notifier.on_download_complete(id).is_some());
        assert!(f.notifier.on_download_complete(id).is_none());
        assert!(f.notifier.on_download_complete(DownloadId(999)).is_none());
        assert_eq!(f.local.notifier.notices().len(), 2);
    }

    #[test]
    fn open_downloaded_resniffs_generic_mime() {
        let f = fixture();
        f.notifier
            .open_downloaded("file:///dl/Rapor.pdf", "application/octet-stream");
        f.notifier.open_downloaded("file:///dl/x", "image/jpg");
        assert_eq!(
            f.local.launcher.opened(),
            vec![
                ("file:///dl/Rapor.pdf".to_string(), "application/pdf".to_string()),
                ("file:///dl/x".to_string(), "image/jpeg".to_string()),
            ]
        );
        f.notifier.show_downloads();
        assert!(f.local.launcher.open_downloads().is_ok());
    }
}
