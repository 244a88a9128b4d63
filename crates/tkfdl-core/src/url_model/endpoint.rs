//! Recognizing URLs that point at a download rather than a page.

use regex::Regex;
use std::sync::OnceLock;

/// Path fragments of known download endpoints.
const DOWNLOAD_PATHS: [&str; 6] = [
    "/DownloadFile",
    "/download.php",
    "/filedownload",
    "/file_download",
    "/getfile",
    "/get_file",
];

fn document_suffix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\.(pdf|doc|docx|xls|xlsx|ppt|pptx|zip|rar|7z|txt|csv)(\?.*)?$").ok()
    })
    .as_ref()
}

/// True if `url` looks like a file download endpoint.
pub fn is_download_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    DOWNLOAD_PATHS.iter().any(|p| url.contains(p))
        || (url.contains("download") && url.contains("id="))
        || document_suffix().is_some_and(|re| re.is_match(url))
}

/// True if `url` is the form application's `DownloadFile` endpoint, whose
/// `type`/`id` query parameters name the file.
pub fn is_form_file_endpoint(url: &str) -> bool {
    url.contains("/DownloadFile")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_endpoints() {
        assert!(is_download_url(
            "https://app.example.com/EXT/PKControl/DownloadFile?type=FSoilContinuity&id=42"
        ));
        assert!(is_download_url("https://x.test/download.php?f=1"));
        assert!(is_download_url("https://x.test/api/getfile/7"));
        assert!(is_download_url("https://x.test/download?id=7"));
    }

    #[test]
    fn document_extensions() {
        assert!(is_download_url("https://x.test/docs/report.PDF"));
        assert!(is_download_url("https://x.test/docs/sheet.xlsx?v=2"));
        assert!(!is_download_url("https://x.test/docs/report.pdf.html"));
    }

    #[test]
    fn ordinary_pages() {
        assert!(!is_download_url(""));
        assert!(!is_download_url("https://x.test/EXT/PKControl/EditLeakage/12"));
        assert!(!is_download_url("https://x.test/index.html"));
    }

    #[test]
    fn form_endpoint() {
        assert!(is_form_file_endpoint("https://x.test/EXT/PKControl/DownloadFile?id=1"));
        assert!(!is_form_file_endpoint("https://x.test/getfile?id=1"));
    }
}
