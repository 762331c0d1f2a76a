//! Point queries.

use anyhow::Result;

use super::db::{header_from_row, info_from_row, piece_from_row, DownloadStore};
use super::types::{DownloadId, DownloadInfo, DownloadPiece, Header, InfoAndPieces};

impl DownloadStore {
    pub async fn get_info(&self, id: DownloadId) -> Result<Option<DownloadInfo>> {
        let row = sqlx::query("SELECT * FROM downloads WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(info_from_row).transpose()
    }

    /// All downloads, oldest first.
    pub async fn get_all_info(&self) -> Result<Vec<DownloadInfo>> {
        let rows = sqlx::query("SELECT * FROM downloads ORDER BY date_added ASC, rowid ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(info_from_row).collect()
    }

    /// Pieces of one download ordered by index.
    pub async fn get_pieces(&self, id: DownloadId) -> Result<Vec<DownloadPiece>> {
        let rows = sqlx::query("SELECT * FROM download_pieces WHERE info_id = ?1 ORDER BY idx ASC")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(piece_from_row).collect()
    }

    pub async fn get_piece(&self, id: DownloadId, index: u32) -> Result<Option<DownloadPiece>> {
        let row = sqlx::query("SELECT * FROM download_pieces WHERE info_id = ?1 AND idx = ?2")
            .bind(id.to_string())
            .bind(index as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(piece_from_row).transpose()
    }

    pub async fn get_headers(&self, id: DownloadId) -> Result<Vec<Header>> {
        let rows = sqlx::query("SELECT * FROM request_headers WHERE info_id = ?1 ORDER BY id ASC")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(header_from_row).collect()
    }

    pub async fn get_info_and_pieces(&self, id: DownloadId) -> Result<Option<InfoAndPieces>> {
        let Some(info) = self.get_info(id).await? else {
            return Ok(None);
        };
        let pieces = self.get_pieces(id).await?;
        Ok(Some(InfoAndPieces { info, pieces }))
    }

    pub async fn get_all_info_and_pieces(&self) -> Result<Vec<InfoAndPieces>> {
        let infos = self.get_all_info().await?;
        let mut out = Vec::with_capacity(infos.len());
        for info in infos {
            let pieces = self.get_pieces(info.id).await?;
            out.push(InfoAndPieces { info, pieces });
        }
        Ok(out)
    }
}
