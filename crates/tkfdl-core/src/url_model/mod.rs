//! URL modeling and filename hints.
//!
//! Extracts candidate filenames from Content-Disposition, query parameters and
//! URL paths, and makes them safe to save. Picking between candidates is the
//! classifier's job (`crate::classify`).

mod content_disposition;
mod endpoint;
mod path;
mod sanitize;

pub use content_disposition::parse_content_disposition_filename;
pub use endpoint::{is_download_url, is_form_file_endpoint};
pub use path::{file_name_from_query, file_name_from_url_path, query_param, url_extension};
pub use sanitize::{fit_file_name, sanitize_file_name, tidy_file_name, MAX_SAVED_NAME};

/// Derives a filename from the header or the URL alone, without MIME handling.
///
/// Prefers the Content-Disposition filename, then the `file`/`name`/`fn`
/// query parameters, then the last path segment. Returns `None` when none of
/// them yields a usable name.
pub fn derive_file_name(url: &str, content_disposition: Option<&str>) -> Option<String> {
    content_disposition
        .and_then(parse_content_disposition_filename)
        .or_else(|| file_name_from_query(url))
        .or_else(|| file_name_from_url_path(url))
        .map(|raw| tidy_file_name(&raw))
        .filter(|name| !name.is_empty())
}
