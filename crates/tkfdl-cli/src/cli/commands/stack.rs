//! Local wiring of the download pipeline for commands that save files.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use tkfdl_core::active::{ActiveDownloads, CompletionOutcome};
use tkfdl_core::classify::{Classifier, SiteRules};
use tkfdl_core::completion::CompletionNotifier;
use tkfdl_core::config::TkfConfig;
use tkfdl_core::dispatcher::http::HttpOptions;
use tkfdl_core::dispatcher::{DispatchSettings, Dispatcher};
use tkfdl_core::platform::local::{CurlDownloadService, LocalPlatform, Notice};
use tkfdl_core::platform::DownloadId;

pub(super) struct Stack {
    pub dispatcher: Arc<Dispatcher>,
    pub completion: CompletionNotifier,
    pub local: LocalPlatform,
    service: Arc<CurlDownloadService>,
    completed: Receiver<DownloadId>,
    transfer_timeout: Duration,
}

impl Stack {
    /// Everything saved lands under `dir` (config, then current directory).
    pub fn new(cfg: &TkfConfig, dir: Option<PathBuf>) -> Result<Self> {
        let root = match dir.or_else(|| cfg.download_dir.clone()) {
            Some(d) => d,
            None => std::env::current_dir().context("no current directory")?,
        };
        let mut cfg = cfg.clone();
        cfg.download_dir = Some(root.clone());

        let http = HttpOptions::from_config(&cfg);
        let (service, completed) = CurlDownloadService::with_completion_channel(&root, http);
        let service = Arc::new(service);
        let local = LocalPlatform::new(&root, service.clone());
        let active = Arc::new(ActiveDownloads::new());
        let dispatcher = Dispatcher::new(
            local.platform.clone(),
            Arc::clone(&active),
            Classifier::new(SiteRules::from_config(&cfg)),
            DispatchSettings::from_config(&cfg),
        )?;
        Ok(Stack {
            dispatcher: Arc::new(dispatcher),
            completion: CompletionNotifier::new(local.platform.clone(), active),
            local,
            service,
            completed,
            transfer_timeout: http.transfer_timeout,
        })
    }

    /// Wait for the next download-complete signal and handle it.
    pub fn finish_next(&self) -> Result<Option<CompletionOutcome>> {
        let id = self
            .completed
            .recv_timeout(self.transfer_timeout)
            .context("no download-complete signal")?;
        self.service.wait_idle();
        Ok(self.completion.on_download_complete(id))
    }

    /// Print what the user would have been shown.
    pub fn print_notices(&self) {
        for notice in self.local.notifier.notices() {
            match notice {
                Notice::Toast(text) => println!("* {text}"),
                Notice::Succeeded {
                    file_name,
                    uri,
                    mime_type,
                } => println!("saved {file_name} ({mime_type}) -> {uri}"),
                Notice::Failed { file_name, reason } => println!("failed {file_name}: {reason}"),
                Notice::OfferOpen { .. } => {}
            }
        }
    }
}
