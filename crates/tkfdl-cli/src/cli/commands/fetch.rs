//! `tkfdl fetch <url>` – download and save a file.

use anyhow::{bail, Result};
use std::path::PathBuf;
use tkfdl_core::active::CompletionOutcome;
use tkfdl_core::classify::DownloadRequest;
use tkfdl_core::config::TkfConfig;
use tkfdl_core::dispatcher::TransportMeta;

use super::stack::Stack;

/// Direct path by default; `queue` goes through the download service and
/// the completion notifier instead.
pub async fn run_fetch(
    cfg: &TkfConfig,
    url: &str,
    name: Option<&str>,
    dir: Option<PathBuf>,
    queue: bool,
) -> Result<()> {
    let stack = Stack::new(cfg, dir)?;
    let transport = TransportMeta::with_user_agent(Some(cfg.user_agent.as_str()));

    let ok = if queue {
        let mut request = DownloadRequest::new(url);
        request.declared_file_name = name.map(str::to_string);
        let resolved = stack.dispatcher.classifier().resolve(&request);
        match stack.dispatcher.dispatch(&resolved, url, &transport) {
            Some(mut dispatched) => {
                for d in stack.dispatcher.active().snapshot() {
                    println!("queued {} {} ({})", d.id, d.file_name, d.mime_type);
                }
                stack.finish_next()?;
                matches!(
                    dispatched.completion.try_outcome(),
                    Some(CompletionOutcome::Succeeded { .. })
                )
            }
            None => false,
        }
    } else {
        let handle = stack.dispatcher.dispatch_direct(url, name, &transport);
        matches!(handle.await, Ok(Ok(_)))
    };

    stack.print_notices();
    if !ok {
        bail!("download failed: {url}");
    }
    Ok(())
}
