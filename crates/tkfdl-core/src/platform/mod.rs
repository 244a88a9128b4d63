//! Platform services the download subsystem drives but does not implement.
//!
//! On a device these are the download queue, the shared media index, the
//! content resolver, notifications, the permission state and the intent
//! launcher. Each is a trait here; `local` has filesystem and log-backed
//! implementations for the desktop CLI and tests.

pub mod local;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::DownloadError;

/// Opaque identifier the download service assigns to an enqueued transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DownloadId(pub i64);

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared media index collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Images,
    Downloads,
}

impl Collection {
    /// Images for `image/*`, Downloads for everything else.
    pub fn for_mime(mime: &str) -> Self {
        if mime.trim().to_ascii_lowercase().starts_with("image/") {
            Collection::Images
        } else {
            Collection::Downloads
        }
    }

    /// Top-level public directory of the collection.
    pub fn public_dir(&self) -> &'static str {
        match self {
            Collection::Images => "Pictures",
            Collection::Downloads => "Download",
        }
    }

    /// Relative path entries are filed under, e.g. `Pictures/Downloads`.
    pub fn relative_path(&self, subdir: &str) -> String {
        let subdir = subdir.trim_matches('/');
        if subdir.is_empty() {
            self.public_dir().to_string()
        } else {
            format!("{}/{}", self.public_dir(), subdir)
        }
    }
}

/// Where the download service should put the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// Path under the public storage root (pre-scoped-storage platforms).
    PublicDir { relative_path: PathBuf },
    /// Entry in a media index collection (scoped-storage platforms).
    Collection {
        collection: Collection,
        relative_path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueRequest {
    pub url: String,
    pub file_name: String,
    pub mime_type: String,
    pub destination: Destination,
    /// Request headers in send order.
    pub headers: Vec<(String, String)>,
    pub title: String,
    pub description: String,
}

impl EnqueueRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    Pending,
    Running,
    Paused,
    Successful,
    /// Failed with the platform's reason code (HTTP status or internal code).
    Failed { reason: i32 },
}

/// What the download service reports about one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub status: DownloadStatus,
    pub local_uri: Option<String>,
    pub mime_type: Option<String>,
}

pub trait DownloadService: Send + Sync {
    fn enqueue(&self, request: EnqueueRequest) -> Result<DownloadId, DownloadError>;

    /// `Ok(None)` when the service no longer knows the id.
    fn query(&self, id: DownloadId) -> Result<Option<DownloadRecord>, DownloadError>;
}

/// A pending media index entry being written. Dropping it without
/// [`publish`](MediaEntry::publish) discards the entry.
pub trait MediaEntry: Write + Send {
    fn uri(&self) -> &str;

    /// Make the entry visible; returns its final URI.
    fn publish(self: Box<Self>) -> Result<String, DownloadError>;
}

pub trait MediaStore: Send + Sync {
    fn insert(
        &self,
        collection: Collection,
        relative_path: &str,
        file_name: &str,
        mime_type: &str,
    ) -> Result<Box<dyn MediaEntry>, DownloadError>;

    /// Ask the index to pick up a file written outside it. Best effort.
    fn scan(&self, path: &Path, mime_type: &str);
}

pub trait PermissionGate: Send + Sync {
    fn storage_permission_granted(&self) -> bool;
}

/// User-visible notices. Presentation is the platform's business.
pub trait Notifier: Send + Sync {
    /// Short transient message.
    fn toast(&self, message: &str);

    fn download_succeeded(&self, file_name: &str, uri: &str, mime_type: &str);

    fn download_failed(&self, file_name: &str, reason: &str);

    /// Ask the user whether to open the finished file.
    fn offer_open(&self, uri: &str, mime_type: &str);
}

pub trait Launcher: Send + Sync {
    fn open_file(&self, uri: &str, mime_type: &str) -> Result<(), DownloadError>;

    fn open_downloads(&self) -> Result<(), DownloadError>;
}

/// Metadata the content resolver knows about an opaque content reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMetadata {
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

pub trait ContentResolver: Send + Sync {
    fn metadata(&self, uri: &str) -> Option<ContentMetadata>;

    fn open(&self, uri: &str) -> Result<Box<dyn Read + Send>, DownloadError>;
}

pub trait CookieJar: Send + Sync {
    /// `Cookie` header value for `url`, if the browser holds any.
    fn cookies_for(&self, url: &str) -> Option<String>;
}

/// The set of platform services one screen works with.
#[derive(Clone)]
pub struct Platform {
    pub downloads: Arc<dyn DownloadService>,
    pub media: Arc<dyn MediaStore>,
    pub permission: Arc<dyn PermissionGate>,
    pub notifier: Arc<dyn Notifier>,
    pub launcher: Arc<dyn Launcher>,
    pub content: Arc<dyn ContentResolver>,
    pub cookies: Arc<dyn CookieJar>,
}

/// `file://` URI for a local path. Relative paths are made absolute first.
pub fn file_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    url::Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("file://{}", absolute.display()))
}

/// Local path behind a `file://` URI; plain paths are returned as-is.
pub fn path_from_uri(uri: &str) -> Option<PathBuf> {
    if uri.starts_with("file:") {
        url::Url::parse(uri).ok()?.to_file_path().ok()
    } else if uri.contains("://") {
        None
    } else {
        Some(PathBuf::from(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_for_mime() {
        assert_eq!(Collection::for_mime("image/jpeg"), Collection::Images);
        assert_eq!(Collection::for_mime("Image/PNG"), Collection::Images);
        assert_eq!(Collection::for_mime("application/pdf"), Collection::Downloads);
        assert_eq!(Collection::for_mime(""), Collection::Downloads);
    }

    #[test]
    fn collection_relative_path() {
        assert_eq!(Collection::Images.relative_path("Downloads"), "Pictures/Downloads");
        assert_eq!(Collection::Downloads.relative_path("/TKF/"), "Download/TKF");
        assert_eq!(Collection::Downloads.relative_path(""), "Download");
    }

    #[test]
    fn uri_roundtrip_for_absolute_path() {
        let p = Path::new("/tmp/tkf/Ölçüm raporu.pdf");
        let uri = file_uri(p);
        assert!(uri.starts_with("file:///tmp/tkf/"));
        assert_eq!(path_from_uri(&uri).as_deref(), Some(p));
    }

    #[test]
    fn path_from_non_file_uri() {
        assert_eq!(path_from_uri("content://media/external/images/1"), None);
        assert_eq!(path_from_uri("a/b.txt"), Some(PathBuf::from("a/b.txt")));
    }

    #[test]
    fn enqueue_request_header_lookup() {
        let req = EnqueueRequest {
            url: "https://x.test/a".into(),
            file_name: "a".into(),
            mime_type: "text/plain".into(),
            destination: Destination::PublicDir {
                relative_path: PathBuf::from("Download/a"),
            },
            headers: vec![("User-Agent".into(), "ua".into())],
            title: "a".into(),
            description: String::new(),
        };
        assert_eq!(req.header("user-agent"), Some("ua"));
        assert_eq!(req.header("Cookie"), None);
    }
}
