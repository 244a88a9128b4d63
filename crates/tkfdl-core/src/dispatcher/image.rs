//! Image downloads requested by the page (long-press or bridge call).
//!
//! Content references are copied through the content resolver on the legacy
//! worker; network URLs go through the platform download service.

use tracing::debug;

use super::legacy::{run_copy, DirectHandle};
use super::{Dispatched, Dispatcher, TransportMeta};
use crate::classify::{timestamp_image_name, ResolvedDownload};
use crate::mime::{
    canonical_mime, is_generic_mime, mime_from_file_name, normalize_extension, JPEG,
};
use crate::url_model::{file_name_from_url_path, fit_file_name, tidy_file_name};

/// How an image download was started.
#[derive(Debug)]
pub enum ImageDownload {
    /// Network URL handed to the download service (`None` if it refused).
    Queued(Option<Dispatched>),
    /// Content reference being copied on the legacy worker.
    Copying(DirectHandle),
}

/// True for opaque content references rather than network URLs.
pub fn is_content_reference(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("content://") || lower.starts_with("file:")
}

fn usable_name(raw: Option<String>) -> Option<String> {
    raw.map(|n| tidy_file_name(&n)).filter(|n| !n.is_empty())
}

impl Dispatcher {
    pub fn download_image(&self, url: &str, transport: &TransportMeta) -> ImageDownload {
        if is_content_reference(url) {
            ImageDownload::Copying(self.copy_content_image(url))
        } else {
            let resolved = self.resolve_network_image(url);
            ImageDownload::Queued(self.dispatch(&resolved, url, transport))
        }
    }

    /// Last path segment (or `IMG_<timestamp>`), typed by its extension and
    /// JPEG when that says nothing.
    pub(crate) fn resolve_network_image(&self, url: &str) -> ResolvedDownload {
        let name = usable_name(file_name_from_url_path(url))
            .unwrap_or_else(|| timestamp_image_name(self.classifier().clock()));
        let mime = mime_from_file_name(&name).unwrap_or(JPEG).to_string();
        ResolvedDownload {
            file_name: fit_file_name(&normalize_extension(&name, &mime)),
            mime_type: mime,
        }
    }

    fn copy_content_image(&self, uri: &str) -> DirectHandle {
        let ctx = self.ctx.clone();
        let uri = uri.to_string();
        self.submit(move || {
            let meta = ctx.platform.content.metadata(&uri).unwrap_or_default();
            let name = usable_name(meta.display_name)
                .unwrap_or_else(|| timestamp_image_name(ctx.classifier.clock()));
            let mime = meta
                .mime_type
                .filter(|m| !is_generic_mime(m))
                .map(|m| canonical_mime(&m))
                .or_else(|| mime_from_file_name(&name).map(str::to_string))
                .unwrap_or_else(|| JPEG.to_string());
            let resolved = ResolvedDownload {
                file_name: fit_file_name(&normalize_extension(&name, &mime)),
                mime_type: mime,
            };
            debug!(uri = %uri, file_name = %resolved.file_name, "copying content image");
            let mut source = ctx.platform.content.open(&uri)?;
            run_copy(&ctx, &resolved, &mut source)
        })
    }
}
