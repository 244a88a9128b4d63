//! MIME type guesses from filenames and URL substrings.

use super::table::{self, GIF, JPEG, OCTET_STREAM, PDF, PNG};

/// Declared types that say nothing about the content.
const GENERIC: [&str; 3] = [
    OCTET_STREAM,
    "application/force-download",
    "binary/octet-stream",
];

/// True for empty or catch-all MIME types that should be re-inferred.
pub fn is_generic_mime(mime: &str) -> bool {
    let canonical = table::canonical_mime(mime);
    canonical.is_empty() || GENERIC.contains(&canonical.as_str())
}

/// Extension of a filename (text after the last dot), if non-empty.
pub fn file_extension(file_name: &str) -> Option<&str> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// MIME type implied by the filename's extension, if it is a known one.
pub fn mime_from_file_name(file_name: &str) -> Option<&'static str> {
    file_extension(file_name).and_then(table::mime_from_extension)
}

/// Like [`mime_from_file_name`] but never fails: unknown names are octet-stream.
pub fn mime_from_file_name_or_default(file_name: &str) -> &'static str {
    mime_from_file_name(file_name).unwrap_or(OCTET_STREAM)
}

/// Keyword heuristics on the whole URL, most specific markers first so that
/// `.docx` is not mistaken for `.doc`.
const URL_KEYWORDS: &[(&[&str], &str)] = &[
    (&[".pdf", "pdf=true", "format=pdf"], PDF),
    (&[".jpg", ".jpeg", "format=jpg", "format=jpeg"], JPEG),
    (&[".png", "format=png"], PNG),
    (&[".gif", "format=gif"], GIF),
    (
        &[".docx"],
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (&[".doc"], "application/msword"),
    (
        &[".xlsx"],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (&[".xls"], "application/vnd.ms-excel"),
    (
        &[".pptx"],
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    (&[".ppt"], "application/vnd.ms-powerpoint"),
    (&[".zip"], "application/zip"),
];

/// MIME type suggested by substrings anywhere in the URL (path or query).
pub fn mime_from_url_keywords(url: &str) -> Option<&'static str> {
    let lower = url.to_ascii_lowercase();
    URL_KEYWORDS
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| lower.contains(m)))
        .map(|(_, mime)| *mime)
}
