//! Parse HTTP response header lines into HeadResult.

use std::str;

use super::HeadResult;

/// Accumulates header lines from curl's header callback.
///
/// Curl reports the headers of every response in a redirect chain; a new
/// status line starts over so only the final response is kept.
#[derive(Debug, Default)]
pub struct HeaderCollector {
    lines: Vec<String>,
}

impl HeaderCollector {
    pub fn push(&mut self, data: &[u8]) {
        let Ok(s) = str::from_utf8(data) else {
            return;
        };
        let line = s.trim_end();
        if line.starts_with("HTTP/") {
            self.lines.clear();
        }
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Parse collected header lines into HeadResult. Unknown headers are ignored.
pub fn parse_headers(lines: &[String]) -> HeadResult {
    let mut head = HeadResult::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    head.content_length = Some(n);
                }
            } else if name.eq_ignore_ascii_case("content-type") {
                head.content_type = Some(value.to_string()).filter(|v| !v.is_empty());
            } else if name.eq_ignore_ascii_case("content-disposition") {
                head.content_disposition = Some(value.to_string()).filter(|v| !v.is_empty());
            }
        }
    }

    head
}
