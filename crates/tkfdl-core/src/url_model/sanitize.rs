//! Path-safe filename sanitization.

/// Characters that may not appear in a saved filename on any target platform.
const UNSAFE: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replaces path-unsafe characters (`\/:*?"<>|`) and control characters with `_`.
///
/// Everything else, including spaces and non-ASCII letters, is kept as-is;
/// trimming is left to [`tidy_file_name`].
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE.contains(&c) || c.is_control() { '_' } else { c })
        .collect()
}

/// Sanitizes and trims a candidate: surrounding whitespace and trailing dots go,
/// and `.`/`..` collapse to empty. Length is capped by [`fit_file_name`].
pub fn tidy_file_name(name: &str) -> String {
    let sanitized = sanitize_file_name(name);
    fit_file_name(sanitized.trim().trim_end_matches('.').trim_end())
}

/// Longest name a saved file may have: 255 bytes less room for the `.part`
/// staging suffix and a ` (nnn)` collision counter.
pub const MAX_SAVED_NAME: usize = 255 - ".part".len() - " (nnn)".len();

/// Extensions longer than this are treated as part of the stem when cutting.
const MAX_KEPT_EXTENSION: usize = 16;

/// Cuts `name` to [`MAX_SAVED_NAME`] bytes, shortening the stem so the
/// extension survives. Cuts land on char boundaries.
pub fn fit_file_name(name: &str) -> String {
    if name.len() <= MAX_SAVED_NAME {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.len() <= MAX_KEPT_EXTENSION =>
        {
            (stem, Some(ext))
        }
        _ => (name, None),
    };
    let budget = match ext {
        Some(ext) => MAX_SAVED_NAME - ext.len() - 1,
        None => MAX_SAVED_NAME,
    };
    let mut take = budget.min(stem.len());
    while take > 0 && !stem.is_char_boundary(take) {
        take -= 1;
    }
    let stem = stem[..take].trim_end().trim_end_matches('.');
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}
