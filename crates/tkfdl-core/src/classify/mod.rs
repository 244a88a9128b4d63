//! URL/Header classifier: decides the (filename, MIME type) pair to save under.
//!
//! Filename precedence: Content-Disposition, declared name, `file`/`name`/`fn`
//! query parameters, last path segment (or the site's form-endpoint rule),
//! then a timestamped fallback. MIME precedence: declared unless generic, the
//! filename's extension, the URL's extension, URL keywords, octet-stream.
//! Site markers override the MIME type last, and the extension is normalized
//! to match it.

mod clock;
mod site;

pub use clock::{timestamp_file_name, timestamp_image_name, Clock, FixedClock, SystemClock};
pub use site::SiteRules;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::mime::{
    canonical_mime, is_generic_mime, mime_from_extension, mime_from_file_name,
    mime_from_url_keywords, normalize_extension, JPEG, OCTET_STREAM,
};
use crate::url_model::{
    file_name_from_query, file_name_from_url_path, parse_content_disposition_filename,
    fit_file_name, sanitize_file_name, tidy_file_name, url_extension,
};

/// What the page or the server told us about a download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default)]
    pub declared_file_name: Option<String>,
    #[serde(default)]
    pub declared_mime_type: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub content_disposition: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        DownloadRequest {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.declared_file_name = Some(name.into());
        self
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.declared_mime_type = Some(mime.into());
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn with_content_disposition(mut self, header: impl Into<String>) -> Self {
        self.content_disposition = Some(header.into());
        self
    }
}

/// Final name and type. `file_name` is non-empty, filesystem-safe and carries
/// the extension its `mime_type` calls for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDownload {
    pub file_name: String,
    pub mime_type: String,
}

impl ResolvedDownload {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameSource {
    Header,
    Declared,
    Url,
}

#[derive(Clone)]
pub struct Classifier {
    clock: Arc<dyn Clock>,
    site: SiteRules,
}

impl Classifier {
    pub fn new(site: SiteRules) -> Self {
        Self::with_clock(SystemClock, site)
    }

    pub fn with_clock(clock: impl Clock + 'static, site: SiteRules) -> Self {
        Classifier {
            clock: Arc::new(clock),
            site,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn site(&self) -> &SiteRules {
        &self.site
    }

    /// Resolve the filename and MIME type for `req`.
    ///
    /// Pure apart from the timestamped fallback name, which reads the clock.
    pub fn resolve(&self, req: &DownloadRequest) -> ResolvedDownload {
        let url = req.url.as_str();

        let base = self.base_name(req);
        let mut mime = self.mime_type(req, &base);
        if self.site.forces_jpeg(url) {
            debug!(url, "site marker forces image/jpeg");
            mime = JPEG.to_string();
        }

        let mut file_name = normalize_extension(&base, &mime);
        if tidy_file_name(&file_name).is_empty() {
            file_name = normalize_extension(&timestamp_file_name(self.clock.as_ref()), &mime);
        }
        let file_name = fit_file_name(&file_name);

        debug!(url, file_name = %file_name, mime_type = %mime, "classified download");
        ResolvedDownload {
            file_name,
            mime_type: mime,
        }
    }

    /// Re-run classification with headers from the actual response, keeping
    /// the page's hints as fallbacks.
    pub fn refine(
        &self,
        req: &DownloadRequest,
        content_type: Option<&str>,
        content_disposition: Option<&str>,
    ) -> ResolvedDownload {
        let mut refined = req.clone();
        if let Some(ct) = content_type.filter(|ct| !is_generic_mime(ct)) {
            refined.declared_mime_type = Some(ct.to_string());
        }
        if let Some(cd) = content_disposition.filter(|cd| !cd.trim().is_empty()) {
            refined.content_disposition = Some(cd.to_string());
        }
        self.resolve(&refined)
    }

    fn base_name(&self, req: &DownloadRequest) -> String {
        let url = req.url.as_str();
        let (candidate, source) = match req
            .content_disposition
            .as_deref()
            .and_then(parse_content_disposition_filename)
        {
            Some(name) => (Some(name), NameSource::Header),
            None => match req
                .declared_file_name
                .as_deref()
                .map(sanitize_file_name)
                .filter(|n| !n.trim().is_empty())
            {
                Some(name) => (Some(name), NameSource::Declared),
                None => (
                    file_name_from_query(url).or_else(|| file_name_from_url_path(url)),
                    NameSource::Url,
                ),
            },
        };

        let candidate = if source == NameSource::Url {
            let from_query = file_name_from_query(url).is_some();
            match self.site.form_file_name(url) {
                Some(name) if !from_query => Some(name),
                _ => candidate,
            }
        } else {
            candidate
        };

        let name = candidate.map(|n| tidy_file_name(&n)).unwrap_or_default();
        if name.is_empty() {
            let fallback = timestamp_file_name(self.clock.as_ref());
            debug!(url, fallback = %fallback, "no filename hint, using timestamp");
            fallback
        } else {
            debug!(url, ?source, name = %name, "filename hint");
            name
        }
    }

    fn mime_type(&self, req: &DownloadRequest, file_name: &str) -> String {
        let url = req.url.as_str();
        if let Some(declared) = req
            .declared_mime_type
            .as_deref()
            .filter(|m| !is_generic_mime(m))
        {
            return canonical_mime(declared);
        }
        mime_from_file_name(file_name)
            .or_else(|| url_extension(url).and_then(|ext| mime_from_extension(&ext)))
            .or_else(|| mime_from_url_keywords(url))
            .unwrap_or(OCTET_STREAM)
            .to_string()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(SiteRules::default())
    }
}
