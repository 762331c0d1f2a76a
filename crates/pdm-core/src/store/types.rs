//! Records kept by the download store: downloads, their pieces and request headers.

use crate::status::StatusCode;
use uuid::Uuid;

/// Download identifier.
pub type DownloadId = Uuid;

/// Sentinel for "size not known yet".
pub const UNKNOWN_SIZE: i64 = -1;

/// Notification policy for a download; stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Shown while running and after completion.
    #[default]
    VisibleNotifyCompleted,
    /// Shown only while running.
    Visible,
    /// Only the completion notification is shown.
    VisibleNotifyOnlyCompletion,
    Hidden,
}

impl Visibility {
    pub fn code(self) -> i32 {
        match self {
            Visibility::VisibleNotifyCompleted => 1,
            Visibility::Visible => 0,
            Visibility::VisibleNotifyOnlyCompletion => 3,
            Visibility::Hidden => 2,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Visibility::Visible,
            2 => Visibility::Hidden,
            3 => Visibility::VisibleNotifyOnlyCompletion,
            _ => Visibility::VisibleNotifyCompleted,
        }
    }
}

/// One user-requested download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadInfo {
    pub id: DownloadId,
    pub url: String,
    /// Destination directory: a plain path or a `file://` URI.
    pub dir_path: String,
    pub file_name: String,
    pub description: Option<String>,
    pub mime_type: String,
    /// Total length in bytes, or `UNKNOWN_SIZE`.
    pub total_bytes: i64,
    pub num_pieces: u32,
    pub status_code: StatusCode,
    pub status_msg: Option<String>,
    pub unmetered_connections_only: bool,
    /// Retry automatically on retryable failures.
    pub retry: bool,
    /// Server honours `Range: bytes=...`.
    pub partial_support: bool,
    pub num_failed: u32,
    /// Delay before the next automatic attempt, in milliseconds.
    pub retry_after: i64,
    /// Server `Last-Modified`, ms since the Unix epoch (0 = unknown).
    pub last_modify: i64,
    /// Expected MD5 or SHA-256 digest (hex).
    pub checksum: Option<String>,
    pub user_agent: Option<String>,
    pub visibility: Visibility,
    /// Set once a probe has filled size, MIME type and range support.
    pub has_metadata: bool,
    /// Creation time, ms since the Unix epoch.
    pub date_added: i64,
}

impl DownloadInfo {
    /// New pending download with a fresh id and no metadata.
    pub fn new(url: impl Into<String>, dir_path: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            dir_path: dir_path.into(),
            file_name: file_name.into(),
            description: None,
            mime_type: String::new(),
            total_bytes: UNKNOWN_SIZE,
            num_pieces: 1,
            status_code: StatusCode::Pending,
            status_msg: None,
            unmetered_connections_only: false,
            retry: true,
            partial_support: false,
            num_failed: 0,
            retry_after: 0,
            last_modify: 0,
            checksum: None,
            user_agent: None,
            visibility: Visibility::default(),
            has_metadata: false,
            date_added: crate::store::db::unix_millis(),
        }
    }

    /// Size assigned to piece `index` under the current plan.
    pub fn piece_size(&self, index: u32) -> i64 {
        crate::planner::piece_size(self.total_bytes, self.num_pieces, index)
    }

    /// First byte offset of piece `index`.
    pub fn piece_start_pos(&self, index: u32) -> i64 {
        crate::planner::piece_start_pos(self.total_bytes, self.num_pieces, index)
    }

    /// Last byte offset (inclusive) of piece `index`; -1 when the size is unknown.
    pub fn piece_end_pos(&self, index: u32) -> i64 {
        let size = self.piece_size(index);
        if size < 0 {
            return UNKNOWN_SIZE;
        }
        self.piece_start_pos(index) + size - 1
    }

    /// Fresh piece rows for the current plan, all pending at their start offset.
    pub fn make_pieces(&self) -> Vec<DownloadPiece> {
        (0..self.num_pieces)
            .map(|index| DownloadPiece::new(self.id, index, self.piece_size(index), self.piece_start_pos(index)))
            .collect()
    }

    /// Bytes already on disk across all pieces.
    pub fn downloaded_bytes(&self, pieces: &[DownloadPiece]) -> i64 {
        pieces.iter().map(|p| self.piece_downloaded_bytes(p)).sum()
    }

    /// Bytes already on disk for one piece (`cur_bytes - start`).
    pub fn piece_downloaded_bytes(&self, piece: &DownloadPiece) -> i64 {
        (piece.cur_bytes - self.piece_start_pos(piece.index)).max(0)
    }
}

/// One byte range of a download. Identity is `(info_id, index)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadPiece {
    pub info_id: DownloadId,
    pub index: u32,
    /// Assigned size, or `UNKNOWN_SIZE` for the single piece of a download
    /// whose total is unknown.
    pub size: i64,
    /// Absolute file offset written so far.
    pub cur_bytes: i64,
    pub status_code: StatusCode,
    pub status_msg: Option<String>,
    pub num_failed: u32,
    /// Bytes per second; recomputed on every progress tick, never persisted.
    pub speed: u64,
}

impl DownloadPiece {
    pub fn new(info_id: DownloadId, index: u32, size: i64, start: i64) -> Self {
        Self {
            info_id,
            index,
            size,
            cur_bytes: start,
            status_code: StatusCode::Pending,
            status_msg: None,
            num_failed: 0,
            speed: 0,
        }
    }
}

/// Request header override owned by a download (User-Agent, ETag, Referer...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub info_id: DownloadId,
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(info_id: DownloadId, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            info_id,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A download together with its pieces, as emitted by the change streams.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoAndPieces {
    pub info: DownloadInfo,
    pub pieces: Vec<DownloadPiece>,
}

impl InfoAndPieces {
    pub fn downloaded_bytes(&self) -> i64 {
        self.info.downloaded_bytes(&self.pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_positions_follow_plan() {
        let mut info = DownloadInfo::new("http://h/f", "/tmp", "f");
        info.total_bytes = 10;
        info.num_pieces = 3;
        assert_eq!(info.piece_size(0), 3);
        assert_eq!(info.piece_size(1), 3);
        assert_eq!(info.piece_size(2), 4);
        assert_eq!(info.piece_start_pos(2), 6);
        assert_eq!(info.piece_end_pos(2), 9);
        let pieces = info.make_pieces();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[1].cur_bytes, 3);
        assert_eq!(info.downloaded_bytes(&pieces), 0);
    }

    #[test]
    fn unknown_size_single_piece() {
        let info = DownloadInfo::new("http://h/f", "/tmp", "f");
        let pieces = info.make_pieces();
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].size, UNKNOWN_SIZE);
        assert_eq!(pieces[0].cur_bytes, 0);
        assert_eq!(info.piece_end_pos(0), UNKNOWN_SIZE);
    }

    #[test]
    fn visibility_codes_roundtrip() {
        for v in [
            Visibility::Visible,
            Visibility::VisibleNotifyCompleted,
            Visibility::VisibleNotifyOnlyCompletion,
            Visibility::Hidden,
        ] {
            assert_eq!(Visibility::from_code(v.code()), v);
        }
    }
}
