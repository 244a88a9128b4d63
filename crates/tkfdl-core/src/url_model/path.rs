//! Filename hints taken from the URL itself: query parameters and path.

use url::Url;

/// Query parameters some servers use to carry the real filename, in the order
/// they are consulted; a later one present overrides an earlier one.
const NAME_PARAMS: [&str; 3] = ["file", "name", "fn"];

/// Returns the value of a query parameter, if present and non-empty.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let value = parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())?;
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Filename carried in the `file`, `name` or `fn` query parameter.
pub fn file_name_from_query(url: &str) -> Option<String> {
    NAME_PARAMS
        .iter()
        .filter_map(|key| query_param(url, key))
        .last()
}

/// Extracts the last path segment from a URL for use as a filename hint.
///
/// Percent-escapes in the segment are decoded. Returns `None` if the path is
/// empty/root. Unparseable URLs fall back to plain string splitting.
pub fn file_name_from_url_path(url: &str) -> Option<String> {
    let segment = match Url::parse(url) {
        Ok(parsed) => {
            let seg = parsed
                .path_segments()?
                .filter(|s| !s.is_empty())
                .last()?
                .to_string();
            super::content_disposition::percent_decode(&seg)
        }
        Err(_) => {
            let without_query = url.split(['?', '#']).next().unwrap_or("");
            without_query
                .rsplit('/')
                .find(|s| !s.is_empty())?
                .to_string()
        }
    };
    if segment.is_empty() || segment == "." || segment == ".." {
        return None;
    }
    Some(segment)
}

/// Lowercased extension of the URL's last path segment, if it has one.
pub fn url_extension(url: &str) -> Option<String> {
    let segment = file_name_from_url_path(url)?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
