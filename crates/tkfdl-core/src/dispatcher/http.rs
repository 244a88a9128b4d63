//! Single-stream HTTP GET used by the direct (legacy) path and the local
//! download service.

use std::io::{self, Write};
use std::time::Duration;

use crate::config::TkfConfig;
use crate::error::DownloadError;
use crate::fetch_head::{parse_headers, HeadResult, HeaderCollector};

#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    pub transfer_timeout: Duration,
}

impl HttpOptions {
    pub fn from_config(cfg: &TkfConfig) -> Self {
        HttpOptions {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            transfer_timeout: Duration::from_secs(cfg.transfer_timeout_secs),
        }
    }
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self::from_config(&TkfConfig::default())
    }
}

/// Headers of the final response and the number of body bytes written.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub head: HeadResult,
    pub bytes: u64,
}

/// GETs `url` and streams the body into `sink`.
///
/// Non-2xx responses become [`DownloadError::Http`]; whatever body they
/// carried has already been written, so callers discard `sink` on error.
pub fn fetch_to<W: Write>(
    url: &str,
    headers: &[(String, String)],
    opts: &HttpOptions,
    sink: &mut W,
) -> Result<Fetched, DownloadError> {
    let mut collector = HeaderCollector::default();
    let mut write_error: Option<io::Error> = None;
    let mut bytes = 0u64;

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(opts.connect_timeout)?;
    // Abort if throughput stays below 1 KiB/s for a minute.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.timeout(opts.transfer_timeout)?;

    if !headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            collector.push(data);
            true
        })?;
        transfer.write_function(|data| match sink.write_all(data) {
            Ok(()) => {
                bytes += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                tracing::warn!("download write failed: {}", e);
                write_error = Some(e);
                Ok(0) // abort transfer
            }
        })?;
        transfer.perform()
    };

    if let Some(e) = write_error {
        return Err(DownloadError::Storage(e));
    }
    performed?;

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(DownloadError::Http(code));
    }
    sink.flush()?;

    Ok(Fetched {
        head: parse_headers(collector.lines()),
        bytes,
    })
}
