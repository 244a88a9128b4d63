//! HTTP HEAD probing.
//!
//! Some download endpoints only reveal the real filename in the response's
//! `Content-Disposition`. When the page hands us nothing but a URL, a HEAD
//! request recovers it (and the declared type and size) before classifying.

mod parse;

pub use parse::{parse_headers, HeaderCollector};

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Response metadata that matters for naming and dispatching a download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// `Content-Type` value if present (parameters kept).
    pub content_type: Option<String>,
    /// `Content-Disposition` value if present (filename hint).
    pub content_disposition: Option<String>,
}

/// Performs a HEAD request and returns parsed metadata of the final response.
///
/// Follows redirects. Runs in the current thread; call from `spawn_blocking`
/// or the legacy worker when used from async code.
pub fn probe(
    url: &str,
    custom_headers: &HashMap<String, String>,
    connect_timeout: Duration,
) -> Result<HeadResult> {
    let mut collector = HeaderCollector::default();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.connect_timeout(connect_timeout)?;
    easy.timeout(connect_timeout * 2)?;

    if !custom_headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in custom_headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            collector.push(data);
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("HEAD {} returned HTTP {}", url, code);
    }

    Ok(parse_headers(collector.lines()))
}

/// Like [`probe`] but never fails: errors are logged and yield `None`.
pub fn probe_best_effort(
    url: &str,
    custom_headers: &HashMap<String, String>,
    connect_timeout: Duration,
) -> Option<HeadResult> {
    match probe(url, custom_headers, connect_timeout) {
        Ok(head) => {
            tracing::debug!(url, ?head, "HEAD probe");
            Some(head)
        }
        Err(e) => {
            tracing::debug!(url, error = %e, "HEAD probe failed, continuing without headers");
            None
        }
    }
}
