//! Native side of the page-script bridge.
//!
//! Injected page scripts post JSON messages tagged by `op`. Two operations
//! are public to the page: download an image URL, and handle a generic
//! download URL. The browser's own download listener comes through
//! `on_webview_download`. Nothing here reports an error back to the page as
//! a failure of the call itself; problems end up as user notices.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::DownloadRequest;
use crate::config::TkfConfig;
use crate::dispatcher::{Dispatched, Dispatcher, ImageDownload, TransportMeta};
use crate::fetch_head::probe_best_effort;
use crate::session::SessionContext;
use crate::url_model::is_download_url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeMessage {
    DownloadImage {
        url: String,
    },
    HandleDownloadUrl {
        url: String,
    },
    WebviewDownload {
        url: String,
        #[serde(default)]
        user_agent: Option<String>,
        #[serde(default)]
        content_disposition: Option<String>,
        #[serde(default)]
        mime_type: Option<String>,
        #[serde(default)]
        content_length: Option<u64>,
    },
}

/// Answer returned to the page script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BridgeReply {
    /// Accepted by the download service under `id`.
    Queued { id: i64 },
    /// Being saved in the background.
    Started,
    /// Refused; the user has already been told why.
    Rejected,
    /// The message itself could not be understood.
    Invalid { message: String },
}

impl From<Option<&Dispatched>> for BridgeReply {
    fn from(d: Option<&Dispatched>) -> Self {
        match d {
            Some(d) => BridgeReply::Queued { id: d.id.0 },
            None => BridgeReply::Rejected,
        }
    }
}

/// Human-readable size for log lines and confirmation text.
pub fn size_label(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub struct NativeDownloader {
    dispatcher: Arc<Dispatcher>,
    large_download_bytes: u64,
    /// HEAD probe timeout for special download URLs; `None` disables the probe.
    probe_timeout: Option<Duration>,
    /// The form page downloads are started from; sent as `Referer`.
    session: SessionContext,
}

impl NativeDownloader {
    pub fn new(dispatcher: Arc<Dispatcher>, cfg: &TkfConfig) -> Self {
        NativeDownloader {
            dispatcher,
            large_download_bytes: cfg.direct_download_threshold_bytes,
            probe_timeout: Some(Duration::from_secs(cfg.connect_timeout_secs)),
            session: SessionContext::new(),
        }
    }

    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn transport(&self, user_agent: Option<&str>) -> TransportMeta {
        let mut transport = TransportMeta::with_user_agent(user_agent);
        if let Some(form) = self.session.form_url() {
            transport
                .extra_headers
                .push(("Referer".to_string(), form.to_string()));
        }
        transport
    }

    /// Skip the HEAD probe for special download URLs.
    pub fn without_head_probe(mut self) -> Self {
        self.probe_timeout = None;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Decode and run one page message.
    pub fn handle_message(&self, json: &str) -> BridgeReply {
        let message: BridgeMessage = match serde_json::from_str(json) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "unreadable bridge message");
                return BridgeReply::Invalid {
                    message: e.to_string(),
                };
            }
        };
        debug!(?message, "bridge message");
        match message {
            BridgeMessage::DownloadImage { url } => match self.download_image(&url) {
                ImageDownload::Queued(d) => BridgeReply::from(d.as_ref()),
                ImageDownload::Copying(_) => BridgeReply::Started,
            },
            BridgeMessage::HandleDownloadUrl { url } => {
                BridgeReply::from(self.handle_download_url(&url).as_ref())
            }
            BridgeMessage::WebviewDownload {
                url,
                user_agent,
                content_disposition,
                mime_type,
                content_length,
            } => BridgeReply::from(
                self.on_webview_download(
                    &url,
                    user_agent.as_deref(),
                    content_disposition.as_deref(),
                    mime_type.as_deref(),
                    content_length,
                )
                .as_ref(),
            ),
        }
    }

    /// [`handle_message`](Self::handle_message) with the reply as JSON.
    pub fn handle_message_json(&self, json: &str) -> String {
        let reply = self.handle_message(json);
        serde_json::to_string(&reply).unwrap_or_else(|_| r#"{"status":"rejected"}"#.to_string())
    }

    pub fn download_image(&self, url: &str) -> ImageDownload {
        info!(url, "image download requested by page");
        self.dispatcher.download_image(url, &self.transport(None))
    }

    /// Classify a URL the page considers downloadable and enqueue it.
    ///
    /// Recognized download endpoints get a best-effort HEAD probe first, so
    /// the server's Content-Disposition can name the file.
    pub fn handle_download_url(&self, url: &str) -> Option<Dispatched> {
        let mut request = DownloadRequest::new(url);
        let transport = self.transport(None);
        if is_download_url(url) {
            if let Some(timeout) = self.probe_timeout {
                let headers: HashMap<String, String> = self
                    .dispatcher
                    .request_headers(url, "*/*", &transport)
                    .into_iter()
                    .collect();
                if let Some(head) = probe_best_effort(url, &headers, timeout) {
                    request.content_disposition = head.content_disposition;
                    request.declared_mime_type = head.content_type;
                }
            }
        }
        let resolved = self.dispatcher.classifier().resolve(&request);
        self.dispatcher.dispatch(&resolved, url, &transport)
    }

    /// The browser's download listener.
    pub fn on_webview_download(
        &self,
        url: &str,
        user_agent: Option<&str>,
        content_disposition: Option<&str>,
        mime_type: Option<&str>,
        content_length: Option<u64>,
    ) -> Option<Dispatched> {
        let request = DownloadRequest {
            url: url.to_string(),
            declared_file_name: None,
            declared_mime_type: mime_type.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
            content_disposition: content_disposition.map(str::to_string),
        };
        let resolved = self.dispatcher.classifier().resolve(&request);
        match content_length {
            Some(len) if len >= self.large_download_bytes => {
                info!(file_name = %resolved.file_name, size = %size_label(len), "large download");
            }
            Some(len) => {
                debug!(file_name = %resolved.file_name, size = %size_label(len), "download");
            }
            None => {}
        }
        self.dispatcher
            .dispatch(&resolved, url, &self.transport(user_agent))
    }
}
