//! Error type shared by the download subsystem.
//!
//! Nothing in the subsystem propagates these to a crash: the dispatcher and the
//! completion notifier log them and turn them into a user-visible notice.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Storage permission missing on a legacy-storage platform.
    #[error("storage permission not granted")]
    PermissionDenied,

    /// The media index refused the insertion or could not open the entry.
    #[error("media store: {0}")]
    MediaStore(String),

    /// Server answered with a non-success status.
    #[error("HTTP {0}")]
    Http(u32),

    /// Curl reported an error (timeout, connection, invalid URL, ...).
    #[error("transfer failed: {0}")]
    Curl(#[from] curl::Error),

    /// Local disk write failed.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),

    /// Any other failure reported by a platform collaborator.
    #[error("platform: {0}")]
    Platform(String),

    /// The browser instance went away (detached or destroyed) mid-operation.
    #[error("browser instance unavailable")]
    EngineUnavailable,
}

impl DownloadError {
    /// True for failures worth one retry after re-acquiring resources.
    pub fn is_transient(&self) -> bool {
        matches!(self, DownloadError::EngineUnavailable)
    }
}
