//! In-flight downloads by platform id, each with a one-shot completion.
//!
//! The table lives in memory only; a restart forgets every entry. An id is
//! completed at most once: `take` removes the entry together with its sender.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::platform::DownloadId;

/// How a tracked download ended, as seen by the completion notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Succeeded {
        uri: Option<String>,
        mime_type: String,
    },
    Failed {
        /// Platform reason code, when the service reported one.
        reason: Option<i32>,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDownload {
    pub id: DownloadId,
    pub file_name: String,
    pub mime_type: String,
}

/// Receiving side of one download's completion.
#[derive(Debug)]
pub struct CompletionHandle {
    id: DownloadId,
    rx: oneshot::Receiver<CompletionOutcome>,
}

impl CompletionHandle {
    pub fn id(&self) -> DownloadId {
        self.id
    }

    /// Waits for the outcome. `None` if the entry was dropped or replaced
    /// without being completed.
    pub async fn outcome(self) -> Option<CompletionOutcome> {
        self.rx.await.ok()
    }

    /// Outcome if it has already been delivered.
    pub fn try_outcome(&mut self) -> Option<CompletionOutcome> {
        self.rx.try_recv().ok()
    }
}

/// Sending side, handed out by [`ActiveDownloads::take`].
#[derive(Debug)]
pub struct Completer {
    tx: oneshot::Sender<CompletionOutcome>,
}

impl Completer {
    pub fn complete(self, outcome: CompletionOutcome) {
        // Nobody waiting is fine.
        let _ = self.tx.send(outcome);
    }
}

#[derive(Debug)]
struct Entry {
    download: ActiveDownload,
    tx: oneshot::Sender<CompletionOutcome>,
}

#[derive(Debug, Default)]
pub struct ActiveDownloads {
    entries: Mutex<HashMap<DownloadId, Entry>>,
}

impl ActiveDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `id`. Registering an id again replaces the old entry; its
    /// handle then resolves to `None`.
    pub fn register(&self, id: DownloadId, file_name: &str, mime_type: &str) -> CompletionHandle {
        let (tx, rx) = oneshot::channel();
        let entry = Entry {
            download: ActiveDownload {
                id,
                file_name: file_name.to_string(),
                mime_type: mime_type.to_string(),
            },
            tx,
        };
        if self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, entry)
            .is_some()
        {
            tracing::warn!(%id, "download id registered twice, replacing entry");
        }
        CompletionHandle { id, rx }
    }

    /// Remove and return the entry for `id`, if tracked.
    pub fn take(&self, id: DownloadId) -> Option<(ActiveDownload, Completer)> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .map(|e| (e.download, Completer { tx: e.tx }))
    }

    pub fn contains(&self, id: DownloadId) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Currently tracked downloads, ordered by id.
    pub fn snapshot(&self) -> Vec<ActiveDownload> {
        let mut all: Vec<_> = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|e| e.download.clone())
            .collect();
        all.sort_by_key(|d| d.id);
        all
    }
}
