//! Fixed extension <-> MIME type tables.

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const JPEG: &str = "image/jpeg";
pub const PNG: &str = "image/png";
pub const GIF: &str = "image/gif";
pub const PDF: &str = "application/pdf";

/// Extension (lowercase, no dot) to MIME type, for sniffing by name.
const BY_EXTENSION: &[(&str, &str)] = &[
    ("jpg", JPEG),
    ("jpeg", JPEG),
    ("png", PNG),
    ("gif", GIF),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("pdf", PDF),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("zip", "application/zip"),
    ("rar", "application/x-rar-compressed"),
    ("7z", "application/x-7z-compressed"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
];

/// MIME type to the extension a saved file must carry.
const EXTENSION_FOR: &[(&str, &str)] = &[
    (PDF, "pdf"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    ("application/vnd.ms-excel", "xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    ("application/vnd.ms-powerpoint", "ppt"),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
    ),
    ("text/plain", "txt"),
    ("text/html", "html"),
    (JPEG, "jpg"),
    (PNG, "png"),
    (GIF, "gif"),
    ("application/zip", "zip"),
    ("application/x-rar-compressed", "rar"),
    ("audio/mpeg", "mp3"),
    ("video/mp4", "mp4"),
];

/// Lowercases, drops parameters (`; charset=...`) and folds `image/jpg` into `image/jpeg`.
pub fn canonical_mime(mime: &str) -> String {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if essence == "image/jpg" || essence == "image/pjpeg" {
        JPEG.to_string()
    } else {
        essence
    }
}

/// MIME type for a bare extension (case-insensitive, leading dot allowed).
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    BY_EXTENSION
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, m)| *m)
}

/// The extension a file of this MIME type should carry, if it is in the table.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let canonical = canonical_mime(mime);
    EXTENSION_FOR
        .iter()
        .find(|(m, _)| *m == canonical)
        .map(|(_, e)| *e)
}

/// Extensions accepted as already matching `expected` (`jpeg` for `jpg`, `htm` for `html`).
pub(super) fn extension_matches(current: &str, expected: &str) -> bool {
    current.eq_ignore_ascii_case(expected)
        || (expected == "jpg" && current.eq_ignore_ascii_case("jpeg"))
        || (expected == "html" && current.eq_ignore_ascii_case("htm"))
}
