//! Change streams over the store.
//!
//! Writers publish a `StoreEvent` after each commit. Observers never cache
//! rows: every emission is a fresh read, so a consumer always sees the state
//! as of (or after) the write that woke it.

use anyhow::Result;
use tokio::sync::broadcast::{self, error::RecvError};

use super::db::DownloadStore;
use super::types::{DownloadId, InfoAndPieces};

/// Published after a committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Changed(DownloadId),
    Deleted(DownloadId),
}

impl StoreEvent {
    pub fn id(&self) -> DownloadId {
        match self {
            StoreEvent::Changed(id) | StoreEvent::Deleted(id) => *id,
        }
    }
}

/// Stream of snapshots of one download. See [`DownloadStore::observe_info`].
pub struct InfoObserver {
    store: DownloadStore,
    id: DownloadId,
    rx: broadcast::Receiver<StoreEvent>,
    primed: bool,
}

impl InfoObserver {
    /// Next snapshot. The first call returns the current state immediately.
    /// `Ok(None)` means the download no longer exists.
    pub async fn next(&mut self) -> Result<Option<InfoAndPieces>> {
        if !self.primed {
            self.primed = true;
            return self.store.get_info_and_pieces(self.id).await;
        }
        loop {
            match self.rx.recv().await {
                Ok(StoreEvent::Deleted(id)) if id == self.id => return Ok(None),
                Ok(event) if event.id() == self.id => break,
                Ok(_) => continue,
                // Missed events may include ours; reload to be safe.
                Err(RecvError::Lagged(_)) => break,
                Err(RecvError::Closed) => return Ok(None),
            }
        }
        self.store.get_info_and_pieces(self.id).await
    }
}

/// Stream of snapshots of every download. See [`DownloadStore::observe_all_info`].
pub struct AllInfoObserver {
    store: DownloadStore,
    rx: broadcast::Receiver<StoreEvent>,
    primed: bool,
}

impl AllInfoObserver {
    /// Next snapshot of the whole set; the first call returns immediately.
    /// `Ok(None)` once the event channel is closed.
    pub async fn next(&mut self) -> Result<Option<Vec<InfoAndPieces>>> {
        if !self.primed {
            self.primed = true;
            return self.store.get_all_info_and_pieces().await.map(Some);
        }
        match self.rx.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return Ok(None),
        }
        // Coalesce a burst of writes into one emission.
        while let Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) = self.rx.try_recv() {}
        self.store.get_all_info_and_pieces().await.map(Some)
    }
}

impl DownloadStore {
    /// Push-based view of one download and its pieces.
    pub fn observe_info(&self, id: DownloadId) -> InfoObserver {
        InfoObserver {
            store: self.clone(),
            id,
            rx: self.events.subscribe(),
            primed: false,
        }
    }

    /// Push-based view of every download.
    pub fn observe_all_info(&self) -> AllInfoObserver {
        AllInfoObserver {
            store: self.clone(),
            rx: self.events.subscribe(),
            primed: false,
        }
    }

    /// Raw event feed for callers that only need ids.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
