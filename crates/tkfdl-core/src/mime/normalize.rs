//! Extension normalizer: make a filename's extension agree with its MIME type.

use super::table::{extension_for_mime, extension_matches};

/// Rewrites `file_name` so its extension matches `mime`.
///
/// Trailing `.bin` extensions never count as a real extension and are always
/// removed. If the MIME type has a table extension and the current extension
/// differs, the current one is replaced. Idempotent for every input pair.
pub fn normalize_extension(file_name: &str, mime: &str) -> String {
    let mut name = file_name;
    while let Some(stem) = strip_bin(name) {
        name = stem;
    }

    let Some(expected) = extension_for_mime(mime) else {
        return name.to_string();
    };

    match name.rsplit_once('.') {
        Some((_, current)) if extension_matches(current, expected) => name.to_string(),
        Some((stem, _)) => format!("{stem}.{expected}"),
        None => format!("{name}.{expected}"),
    }
}

fn strip_bin(name: &str) -> Option<&str> {
    let cut = name.len().checked_sub(4)?;
    if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".bin") {
        Some(&name[..cut])
    } else {
        None
    }
}
