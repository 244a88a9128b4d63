//! Content-Disposition header parsing (filename and filename*).

use regex::Regex;
use std::sync::OnceLock;

use super::sanitize::sanitize_file_name;

fn filename_param() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|;)\s*filename(\*)?\s*=\s*(?:"((?:[^"\\]|\\.)*)"?|([^;]*))"#).ok()
    })
    .as_ref()
}

/// Extracts the filename from a raw Content-Disposition header value.
///
/// Supports:
/// - `filename="value"` (quoted; strips quotes and backslash escapes)
/// - `filename=value` (token)
/// - `filename*=UTF-8''percent-encoded` (charset prefix dropped, decoded)
///
/// If both `filename` and `filename*` exist, `filename*` takes precedence.
/// Path-unsafe characters (`\/:*?"<>|`) in the result are replaced with `_`.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for caps in filename_param()?.captures_iter(header_value) {
        let extended = caps.get(1).is_some();
        let raw = match (caps.get(2), caps.get(3)) {
            (Some(q), _) => decode_quoted_filename(q.as_str()),
            (None, Some(t)) => t.as_str().trim().to_string(),
            (None, None) => continue,
        };

        if extended {
            let value = strip_charset_prefix(raw.trim_matches('"'));
            let decoded = sanitize_file_name(&percent_decode(value));
            if !decoded.trim().is_empty() {
                return Some(decoded);
            }
        } else if plain.is_none() {
            let cleaned = sanitize_file_name(&raw);
            if !cleaned.trim().is_empty() {
                plain = Some(cleaned);
            }
        }
    }

    plain
}

/// Drop the RFC 5987 `charset'language'` prefix, if any.
fn strip_charset_prefix(value: &str) -> &str {
    let mut parts = value.splitn(3, '\'');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(charset), Some(_lang), Some(rest))
            if !charset.is_empty()
                && charset
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
        {
            rest
        }
        _ => value,
    }
}

/// Decode backslash-escaped characters in a quoted filename value.
pub(super) fn decode_quoted_filename(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next_if(|n| *n == '"' || *n == '\\') {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Percent-decode a `filename*` value; malformed escapes are kept verbatim.
pub(super) fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
