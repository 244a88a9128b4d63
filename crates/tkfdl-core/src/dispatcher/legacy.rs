//! Direct downloads on a single background thread.
//!
//! All direct downloads run one after another on one worker; there are no
//! parallel legacy transfers. Bytes are staged in a `.part` file next to the
//! final location and only then handed to the media store or renamed.

use std::fs::File;
use std::io::{self, Read};
use std::sync::mpsc;
use std::thread::JoinHandle;

use anyhow::Context;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::http::fetch_to;
use super::{DirectContext, TransportMeta};
use crate::classify::{DownloadRequest, ResolvedDownload};
use crate::config::StorageModel;
use crate::error::DownloadError;
use crate::platform::{file_uri, Collection};
use crate::storage::{unique_destination, PartFile};

/// `Accept` sent by direct downloads.
const DIRECT_ACCEPT: &str = "image/*, */*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedTo {
    MediaStore,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDownload {
    pub file_name: String,
    pub mime_type: String,
    pub uri: String,
    pub bytes: u64,
    pub saved_to: SavedTo,
}

/// Resolves when a direct job has finished. A dropped sender means the job
/// never ran.
pub type DirectHandle = oneshot::Receiver<Result<SavedDownload, DownloadError>>;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// One background thread running jobs in submission order.
pub struct LegacyWorker {
    tx: Option<mpsc::Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl LegacyWorker {
    pub fn spawn() -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = std::thread::Builder::new()
            .name("tkfdl-legacy".into())
            .spawn(move || {
                for job in rx {
                    job();
                }
                debug!("legacy worker exiting");
            })
            .context("failed to spawn legacy download worker")?;
        Ok(LegacyWorker {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue `job`. Returns false if the worker has stopped.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.tx {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Queue a download job whose result is reported to the user and sent
    /// to the returned handle.
    pub(crate) fn submit_reporting<F>(&self, ctx: &DirectContext, job: F) -> (DirectHandle, bool)
    where
        F: FnOnce() -> Result<SavedDownload, DownloadError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let ctx = ctx.clone();
        let submitted = self.submit(move || {
            let result = job();
            report(&ctx, &result);
            let _ = tx.send(result);
        });
        (rx, submitted)
    }
}

impl Drop for LegacyWorker {
    fn drop(&mut self) {
        // Closing the channel lets the thread finish queued jobs and exit.
        drop(self.tx.take());
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                error!("legacy worker panicked");
            }
        }
    }
}

fn report(ctx: &DirectContext, result: &Result<SavedDownload, DownloadError>) {
    let notifier = &ctx.platform.notifier;
    match result {
        Ok(saved) => {
            info!(file_name = %saved.file_name, uri = %saved.uri, bytes = saved.bytes, saved_to = ?saved.saved_to, "direct download saved");
            notifier.toast(&format!("Downloaded: {}", saved.file_name));
            notifier.download_succeeded(&saved.file_name, &saved.uri, &saved.mime_type);
            notifier.offer_open(&saved.uri, &saved.mime_type);
        }
        Err(e) => {
            error!(error = %e, "direct download failed");
            notifier.toast(&failure_message(e));
        }
    }
}

/// Toast text for a failed direct download.
pub(crate) fn failure_message(e: &DownloadError) -> String {
    match e {
        DownloadError::Http(code) => format!("Download error: {code}"),
        DownloadError::PermissionDenied => {
            "Storage permission is required to download files".to_string()
        }
        other => format!("Download failed: {other}"),
    }
}

pub(super) fn run_direct(
    ctx: &DirectContext,
    url: &str,
    file_name: Option<&str>,
    transport: &TransportMeta,
) -> Result<SavedDownload, DownloadError> {
    if ctx.needs_permission() {
        return Err(DownloadError::PermissionDenied);
    }

    let mut request = DownloadRequest::new(url);
    request.declared_file_name = file_name.map(str::to_string);
    request.user_agent = transport.user_agent.clone();
    let provisional = ctx.classifier.resolve(&request);

    let dir = ctx.settings.legacy_dir();
    std::fs::create_dir_all(&dir)?;
    let mut staged = PartFile::create(&dir.join(&provisional.file_name))?;

    let headers = ctx.request_headers(url, DIRECT_ACCEPT, transport);
    let fetched = fetch_to(url, &headers, &ctx.settings.http, &mut staged)?;
    debug!(url, bytes = fetched.bytes, head = ?fetched.head, "direct download fetched");

    let resolved = ctx.classifier.refine(
        &request,
        fetched.head.content_type.as_deref(),
        fetched.head.content_disposition.as_deref(),
    );
    store_staged(ctx, &resolved, staged, fetched.bytes)
}

/// Copy `source` into a staging file, then store it like a fetched body.
pub(super) fn run_copy(
    ctx: &DirectContext,
    resolved: &ResolvedDownload,
    source: &mut dyn Read,
) -> Result<SavedDownload, DownloadError> {
    if ctx.needs_permission() {
        return Err(DownloadError::PermissionDenied);
    }
    let dir = ctx.settings.legacy_dir();
    std::fs::create_dir_all(&dir)?;
    let mut staged = PartFile::create(&dir.join(&resolved.file_name))?;
    let bytes = io::copy(source, &mut staged)?;
    store_staged(ctx, resolved, staged, bytes)
}

/// Publish a staged body: media store on scoped storage, else (or when the
/// media store fails) a rename into the legacy directory.
fn store_staged(
    ctx: &DirectContext,
    resolved: &ResolvedDownload,
    staged: PartFile,
    bytes: u64,
) -> Result<SavedDownload, DownloadError> {
    if ctx.settings.storage_model == StorageModel::Scoped {
        match save_to_media(ctx, resolved, &staged) {
            Ok(uri) => {
                return Ok(SavedDownload {
                    file_name: resolved.file_name.clone(),
                    mime_type: resolved.mime_type.clone(),
                    uri,
                    bytes,
                    saved_to: SavedTo::MediaStore,
                });
            }
            Err(e) => {
                warn!(file_name = %resolved.file_name, error = %e, "media store insert failed, writing file directly");
            }
        }
    }

    let dest = unique_destination(&ctx.settings.legacy_dir(), &resolved.file_name);
    let path = staged.finalize_to(&dest)?;
    ctx.platform.media.scan(&path, &resolved.mime_type);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| resolved.file_name.clone());
    Ok(SavedDownload {
        file_name,
        mime_type: resolved.mime_type.clone(),
        uri: file_uri(&path),
        bytes,
        saved_to: SavedTo::File,
    })
}

fn save_to_media(
    ctx: &DirectContext,
    resolved: &ResolvedDownload,
    staged: &PartFile,
) -> Result<String, DownloadError> {
    let collection = Collection::for_mime(&resolved.mime_type);
    let mut entry = ctx.platform.media.insert(
        collection,
        &collection.relative_path(&ctx.settings.download_subdir),
        &resolved.file_name,
        &resolved.mime_type,
    )?;
    let mut body = File::open(staged.temp_path())?;
    io::copy(&mut body, &mut entry)?;
    entry.publish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn worker_runs_jobs_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let worker = LegacyWorker::spawn().unwrap();
            for i in 0..5 {
                let seen = Arc::clone(&seen);
                assert!(worker.submit(move || seen.lock().unwrap().push(i)));
            }
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn failure_messages() {
        assert_eq!(failure_message(&DownloadError::Http(404)), "Download error: 404");
        assert_eq!(
            failure_message(&DownloadError::PermissionDenied),
            "Storage permission is required to download files"
        );
        assert_eq!(
            failure_message(&DownloadError::Platform("boom".into())),
            "Download failed: platform: boom"
        );
    }
}
