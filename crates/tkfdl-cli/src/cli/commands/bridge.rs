//! `tkfdl bridge <json>` – handle one page-bridge message end to end.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tkfdl_core::bridge::{BridgeMessage, BridgeReply, NativeDownloader};
use tkfdl_core::config::TkfConfig;
use tkfdl_core::dispatcher::ImageDownload;
use tkfdl_core::prefs::{prefs_path, Preferences, DEFAULT_SCREEN};
use tkfdl_core::session::SessionContext;

use super::stack::Stack;

pub async fn run_bridge(
    cfg: &TkfConfig,
    message: &str,
    dir: Option<PathBuf>,
    form_url: Option<String>,
) -> Result<()> {
    let form_url = match form_url {
        Some(url) => Some(url),
        None => Preferences::load(&prefs_path(DEFAULT_SCREEN)?)?
            .last_url()
            .map(str::to_string),
    };
    let session = form_url.map(SessionContext::for_form).unwrap_or_default();

    let stack = Stack::new(cfg, dir)?;
    let bridge = NativeDownloader::new(Arc::clone(&stack.dispatcher), cfg).with_session(session);

    // Image copies run on the worker; wait for them here so their notices
    // are printed below.
    let reply = match serde_json::from_str::<BridgeMessage>(message) {
        Ok(BridgeMessage::DownloadImage { url }) => match bridge.download_image(&url) {
            ImageDownload::Copying(handle) => {
                let _ = handle.await;
                BridgeReply::Started
            }
            ImageDownload::Queued(dispatched) => BridgeReply::from(dispatched.as_ref()),
        },
        _ => bridge.handle_message(message),
    };

    println!("{}", serde_json::to_string(&reply)?);
    if let BridgeReply::Queued { .. } = reply {
        stack.finish_next()?;
    }
    stack.print_notices();
    Ok(())
}
