//! Rules specific to the leakage-test web application.
//!
//! Its form endpoint (`/DownloadFile?type=F<Field>&id=<record>`) names files
//! by form field, and some fields are always JPEG photos even when the server
//! declares something else. The marker list comes from configuration.

use crate::config::TkfConfig;
use crate::url_model::{is_form_file_endpoint, query_param};

#[derive(Debug, Clone)]
pub struct SiteRules {
    jpeg_markers: Vec<String>,
}

impl SiteRules {
    pub fn new(jpeg_markers: Vec<String>) -> Self {
        let jpeg_markers = jpeg_markers.into_iter().filter(|m| !m.is_empty()).collect();
        SiteRules { jpeg_markers }
    }

    pub fn from_config(cfg: &TkfConfig) -> Self {
        Self::new(cfg.jpeg_markers.clone())
    }

    /// No site-specific behavior at all.
    pub fn none() -> Self {
        SiteRules {
            jpeg_markers: Vec::new(),
        }
    }

    /// True when the URL names a field that is always a JPEG photo.
    pub fn forces_jpeg(&self, url: &str) -> bool {
        self.jpeg_markers.iter().any(|m| url.contains(m.as_str()))
    }

    /// Base name for the form endpoint: `<id><Field>` from `type=F<Field>`,
    /// `<Field>` without an id, `download_<id>` without a usable type.
    pub fn form_file_name(&self, url: &str) -> Option<String> {
        if !is_form_file_endpoint(url) {
            return None;
        }
        let field = query_param(url, "type")
            .and_then(|t| t.strip_prefix('F').map(str::to_string))
            .filter(|f| !f.is_empty());
        let id = query_param(url, "id");
        match (field, id) {
            (Some(field), Some(id)) => Some(format!("{id}{field}")),
            (Some(field), None) => Some(field),
            (None, Some(id)) => Some(format!("download_{id}")),
            (None, None) => None,
        }
    }
}

impl Default for SiteRules {
    fn default() -> Self {
        Self::from_config(&TkfConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = "https://tkf.example/EXT/PKControl/DownloadFile";

    #[test]
    fn form_name_from_type_and_id() {
        let rules = SiteRules::default();
        assert_eq!(
            rules.form_file_name(&format!("{FORM}?type=FSoilContinuity&id=42")).as_deref(),
            Some("42SoilContinuity")
        );
        assert_eq!(
            rules.form_file_name(&format!("{FORM}?type=FPhoto")).as_deref(),
            Some("Photo")
        );
        assert_eq!(
            rules.form_file_name(&format!("{FORM}?id=7")).as_deref(),
            Some("download_7")
        );
        assert_eq!(
            rules.form_file_name(&format!("{FORM}?type=X&id=7")).as_deref(),
            Some("download_7")
        );
        assert_eq!(rules.form_file_name(FORM), None);
        assert_eq!(rules.form_file_name("https://x.test/get?type=FA&id=1"), None);
    }

    #[test]
    fn jpeg_markers() {
        let rules = SiteRules::default();
        assert!(rules.forces_jpeg(&format!("{FORM}?type=FSoilContinuity&id=1")));
        assert!(!rules.forces_jpeg(&format!("{FORM}?type=FPhoto&id=1")));
        assert!(!SiteRules::none().forces_jpeg("https://x.test/SoilContinuity"));
        assert!(!SiteRules::new(vec![String::new()]).forces_jpeg("https://x.test/a"));
    }
}
