//! Write operations. Multi-row writes run in one transaction.

use anyhow::Result;
use sqlx::{Sqlite, Transaction};

use super::db::DownloadStore;
use super::observe::StoreEvent;
use super::types::{DownloadId, DownloadInfo, DownloadPiece, Header};

async fn insert_info(tx: &mut Transaction<'_, Sqlite>, info: &DownloadInfo) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO downloads (
            id, url, dir_path, file_name, description, mime_type,
            total_bytes, num_pieces, status_code, status_msg,
            unmetered_only, retry, partial_support, num_failed,
            retry_after, last_modify, checksum, user_agent,
            visibility, has_metadata, date_added
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                  ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
        "#,
    )
    .bind(info.id.to_string())
    .bind(&info.url)
    .bind(&info.dir_path)
    .bind(&info.file_name)
    .bind(&info.description)
    .bind(&info.mime_type)
    .bind(info.total_bytes)
    .bind(info.num_pieces as i64)
    .bind(info.status_code.code() as i64)
    .bind(&info.status_msg)
    .bind(info.unmetered_connections_only)
    .bind(info.retry)
    .bind(info.partial_support)
    .bind(info.num_failed as i64)
    .bind(info.retry_after)
    .bind(info.last_modify)
    .bind(&info.checksum)
    .bind(&info.user_agent)
    .bind(info.visibility.code() as i64)
    .bind(info.has_metadata)
    .bind(info.date_added)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn update_info_row(tx: &mut Transaction<'_, Sqlite>, info: &DownloadInfo) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE downloads
        SET url = ?1,
            dir_path = ?2,
            file_name = ?3,
            description = ?4,
            mime_type = ?5,
            total_bytes = ?6,
            num_pieces = ?7,
            status_code = ?8,
            status_msg = ?9,
            unmetered_only = ?10,
            retry = ?11,
            partial_support = ?12,
            num_failed = ?13,
            retry_after = ?14,
            last_modify = ?15,
            checksum = ?16,
            user_agent = ?17,
            visibility = ?18,
            has_metadata = ?19
        WHERE id = ?20
        "#,
    )
    .bind(&info.url)
    .bind(&info.dir_path)
    .bind(&info.file_name)
    .bind(&info.description)
    .bind(&info.mime_type)
    .bind(info.total_bytes)
    .bind(info.num_pieces as i64)
    .bind(info.status_code.code() as i64)
    .bind(&info.status_msg)
    .bind(info.unmetered_connections_only)
    .bind(info.retry)
    .bind(info.partial_support)
    .bind(info.num_failed as i64)
    .bind(info.retry_after)
    .bind(info.last_modify)
    .bind(&info.checksum)
    .bind(&info.user_agent)
    .bind(info.visibility.code() as i64)
    .bind(info.has_metadata)
    .bind(info.id.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_piece(tx: &mut Transaction<'_, Sqlite>, piece: &DownloadPiece) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO download_pieces (
            info_id, idx, size, cur_bytes, status_code, status_msg, num_failed
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(piece.info_id.to_string())
    .bind(piece.index as i64)
    .bind(piece.size)
    .bind(piece.cur_bytes)
    .bind(piece.status_code.code() as i64)
    .bind(&piece.status_msg)
    .bind(piece.num_failed as i64)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_header(tx: &mut Transaction<'_, Sqlite>, header: &Header) -> Result<()> {
    sqlx::query("INSERT INTO request_headers (info_id, name, value) VALUES (?1, ?2, ?3)")
        .bind(header.info_id.to_string())
        .bind(&header.name)
        .bind(&header.value)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

impl DownloadStore {
    /// Insert a download together with its pieces and headers, all or nothing.
    pub async fn add_info_with_pieces_and_headers(
        &self,
        info: &DownloadInfo,
        pieces: &[DownloadPiece],
        headers: &[Header],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_info(&mut tx, info).await?;
        for piece in pieces {
            insert_piece(&mut tx, piece).await?;
        }
        for header in headers {
            insert_header(&mut tx, header).await?;
        }
        tx.commit().await?;
        self.publish(StoreEvent::Changed(info.id));
        Ok(())
    }

    /// Overwrite every mutable column of a download.
    pub async fn update_info(&self, info: &DownloadInfo) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_info_row(&mut tx, info).await?;
        tx.commit().await?;
        self.publish(StoreEvent::Changed(info.id));
        Ok(())
    }

    /// Persist progress and status of one piece.
    pub async fn update_piece(&self, piece: &DownloadPiece) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE download_pieces
            SET size = ?1,
                cur_bytes = ?2,
                status_code = ?3,
                status_msg = ?4,
                num_failed = ?5
            WHERE info_id = ?6 AND idx = ?7
            "#,
        )
        .bind(piece.size)
        .bind(piece.cur_bytes)
        .bind(piece.status_code.code() as i64)
        .bind(&piece.status_msg)
        .bind(piece.num_failed as i64)
        .bind(piece.info_id.to_string())
        .bind(piece.index as i64)
        .execute(&self.pool)
        .await?;
        self.publish(StoreEvent::Changed(piece.info_id));
        Ok(())
    }

    /// Drop every piece of `id` and insert `pieces` in one transaction.
    pub async fn replace_pieces(&self, id: DownloadId, pieces: &[DownloadPiece]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM download_pieces WHERE info_id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        for piece in pieces {
            insert_piece(&mut tx, piece).await?;
        }
        tx.commit().await?;
        self.publish(StoreEvent::Changed(id));
        Ok(())
    }

    /// Update the download row and swap its piece plan atomically.
    pub async fn update_info_and_replace_pieces(
        &self,
        info: &DownloadInfo,
        pieces: &[DownloadPiece],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_info_row(&mut tx, info).await?;
        sqlx::query("DELETE FROM download_pieces WHERE info_id = ?1")
            .bind(info.id.to_string())
            .execute(&mut *tx)
            .await?;
        for piece in pieces {
            insert_piece(&mut tx, piece).await?;
        }
        tx.commit().await?;
        self.publish(StoreEvent::Changed(info.id));
        Ok(())
    }

    /// Set header `name` (case-insensitive) for a download, replacing any previous value.
    pub async fn set_header(&self, id: DownloadId, name: &str, value: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM request_headers WHERE info_id = ?1 AND lower(name) = lower(?2)")
            .bind(id.to_string())
            .bind(name)
            .execute(&mut *tx)
            .await?;
        insert_header(&mut tx, &Header::new(id, name, value)).await?;
        tx.commit().await?;
        self.publish(StoreEvent::Changed(id));
        Ok(())
    }

    /// Remove header `name` (case-insensitive) from a download.
    pub async fn remove_header(&self, id: DownloadId, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM request_headers WHERE info_id = ?1 AND lower(name) = lower(?2)")
            .bind(id.to_string())
            .bind(name)
            .execute(&self.pool)
            .await?;
        self.publish(StoreEvent::Changed(id));
        Ok(())
    }

    /// Delete a download; pieces and headers go with it.
    pub async fn delete_info(&self, id: DownloadId) -> Result<()> {
        sqlx::query("DELETE FROM downloads WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.publish(StoreEvent::Deleted(id));
        Ok(())
    }
}
