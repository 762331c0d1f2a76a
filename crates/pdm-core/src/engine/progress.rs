//! Progress persistence and live progress snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::status::StatusCode;
use crate::store::{DownloadId, DownloadPiece, DownloadStore};

/// Current speed per piece of each running download.
pub(crate) type SpeedTable = Arc<Mutex<HashMap<DownloadId, HashMap<u32, u64>>>>;

/// Progress of one download as seen by a UI.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub id: DownloadId,
    pub status: StatusCode,
    pub downloaded_bytes: i64,
    /// Total length, or `UNKNOWN_SIZE`.
    pub total_bytes: i64,
    /// Sum of piece speeds, bytes per second. Zero when not running.
    pub speed: u64,
}

impl DownloadProgress {
    /// Completed share in `0..=100`, when the size is known.
    pub fn percent(&self) -> Option<u8> {
        if self.total_bytes <= 0 {
            return None;
        }
        let pct = self.downloaded_bytes.saturating_mul(100) / self.total_bytes;
        Some(pct.clamp(0, 100) as u8)
    }
}

/// Write piece snapshots from workers to the store until every sender is
/// dropped. A burst is collapsed to the newest snapshot per piece.
pub(crate) async fn persist_progress(
    store: DownloadStore,
    speeds: SpeedTable,
    mut rx: mpsc::Receiver<DownloadPiece>,
) {
    while let Some(first) = rx.recv().await {
        let mut latest = BTreeMap::new();
        latest.insert(first.index, first);
        while let Ok(piece) = rx.try_recv() {
            latest.insert(piece.index, piece);
        }
        for piece in latest.values() {
            record_speed(&speeds, piece);
            if let Err(e) = store.update_piece(piece).await {
                tracing::warn!(
                    id = %piece.info_id,
                    piece = piece.index,
                    "failed to persist piece progress: {:#}",
                    e
                );
            }
        }
    }
}

fn record_speed(speeds: &SpeedTable, piece: &DownloadPiece) {
    let mut table = speeds.lock().unwrap_or_else(|e| e.into_inner());
    let speed = if piece.status_code == StatusCode::Running {
        piece.speed
    } else {
        0
    };
    table.entry(piece.info_id).or_default().insert(piece.index, speed);
}

pub(crate) fn total_speed(speeds: &SpeedTable, id: DownloadId) -> u64 {
    let table = speeds.lock().unwrap_or_else(|e| e.into_inner());
    table.get(&id).map(|m| m.values().sum()).unwrap_or(0)
}

pub(crate) fn clear_speed(speeds: &SpeedTable, id: DownloadId) {
    speeds.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DownloadInfo;

    #[tokio::test]
    async fn latest_snapshot_per_piece_is_stored() {
        let store = DownloadStore::open_memory().await.unwrap();
        let mut info = DownloadInfo::new("http://h/f", "/tmp", "f");
        info.total_bytes = 100;
        info.num_pieces = 2;
        let pieces = info.make_pieces();
        store
            .add_info_with_pieces_and_headers(&info, &pieces, &[])
            .await
            .unwrap();

        let speeds = SpeedTable::default();
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(persist_progress(store.clone(), speeds.clone(), rx));
        for cur in [10, 20, 30] {
            let mut p = pieces[0].clone();
            p.cur_bytes = cur;
            p.status_code = StatusCode::Running;
            p.speed = 100;
            tx.send(p).await.unwrap();
        }
        let mut done = pieces[1].clone();
        done.cur_bytes = 100;
        done.status_code = StatusCode::Success;
        tx.send(done).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let stored = store.get_pieces(info.id).await.unwrap();
        assert_eq!(stored[0].cur_bytes, 30);
        assert_eq!(stored[1].status_code, StatusCode::Success);
        assert_eq!(total_speed(&speeds, info.id), 100);
        clear_speed(&speeds, info.id);
        assert_eq!(total_speed(&speeds, info.id), 0);
    }

    #[test]
    fn percent_needs_known_size() {
        let mut p = DownloadProgress {
            id: uuid::Uuid::new_v4(),
            status: StatusCode::Running,
            downloaded_bytes: 50,
            total_bytes: -1,
            speed: 0,
        };
        assert_eq!(p.percent(), None);
        p.total_bytes = 200;
        assert_eq!(p.percent(), Some(25));
    }
}
