//! SQLite-backed download store.
//!
//! Handles connection options, migrations, row decoding and timestamp
//! helpers. CRUD lives in `read` and `write`, change streams in `observe`.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

use super::observe::StoreEvent;
use super::types::{DownloadId, DownloadInfo, DownloadPiece, Header, Visibility};
use crate::status::StatusCode;

const EVENT_CAPACITY: usize = 256;

/// Handle to the download database. Cheap to clone.
///
/// The default database lives under the XDG state directory:
/// `~/.local/state/pdm/downloads.db`.
#[derive(Clone)]
pub struct DownloadStore {
    pub(crate) pool: Pool<Sqlite>,
    pub(crate) events: broadcast::Sender<StoreEvent>,
}

impl DownloadStore {
    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("pdm")?;
        let db_path = xdg_dirs.get_state_home().join("pdm").join("downloads.db");
        Self::open_at(&db_path).await
    }

    /// Open (or create) the database at `path`, creating parent dirs.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .with_context(|| format!("open database {}", path.display()))?;
        Self::with_pool(pool).await
    }

    /// In-memory database (single connection, so every query sees the same data).
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: Pool<Sqlite>) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let store = DownloadStore { pool, events };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id TEXT PRIMARY KEY NOT NULL,
                url TEXT NOT NULL,
                dir_path TEXT NOT NULL,
                file_name TEXT NOT NULL,
                description TEXT,
                mime_type TEXT NOT NULL DEFAULT '',
                total_bytes INTEGER NOT NULL DEFAULT -1,
                num_pieces INTEGER NOT NULL DEFAULT 1,
                status_code INTEGER NOT NULL,
                status_msg TEXT,
                unmetered_only INTEGER NOT NULL DEFAULT 0,
                retry INTEGER NOT NULL DEFAULT 1,
                partial_support INTEGER NOT NULL DEFAULT 0,
                num_failed INTEGER NOT NULL DEFAULT 0,
                retry_after INTEGER NOT NULL DEFAULT 0,
                last_modify INTEGER NOT NULL DEFAULT 0,
                checksum TEXT,
                user_agent TEXT,
                visibility INTEGER NOT NULL DEFAULT 1,
                has_metadata INTEGER NOT NULL DEFAULT 0,
                date_added INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS download_pieces (
                info_id TEXT NOT NULL REFERENCES downloads(id) ON DELETE CASCADE,
                idx INTEGER NOT NULL,
                size INTEGER NOT NULL,
                cur_bytes INTEGER NOT NULL,
                status_code INTEGER NOT NULL,
                status_msg TEXT,
                num_failed INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (info_id, idx)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS request_headers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                info_id TEXT NOT NULL REFERENCES downloads(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS request_headers_info ON request_headers(info_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub(crate) fn publish(&self, event: StoreEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

/// Current time as Unix milliseconds.
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub(crate) fn parse_id(s: &str) -> Result<DownloadId> {
    DownloadId::parse_str(s).with_context(|| format!("invalid download id in database: {}", s))
}

pub(crate) fn info_from_row(row: &SqliteRow) -> Result<DownloadInfo> {
    let id: String = row.get("id");
    let num_pieces: i64 = row.get("num_pieces");
    let num_failed: i64 = row.get("num_failed");
    Ok(DownloadInfo {
        id: parse_id(&id)?,
        url: row.get("url"),
        dir_path: row.get("dir_path"),
        file_name: row.get("file_name"),
        description: row.get("description"),
        mime_type: row.get("mime_type"),
        total_bytes: row.get("total_bytes"),
        num_pieces: num_pieces.max(1) as u32,
        status_code: StatusCode::from_code(row.get::<i64, _>("status_code") as i32),
        status_msg: row.get("status_msg"),
        unmetered_connections_only: row.get("unmetered_only"),
        retry: row.get("retry"),
        partial_support: row.get("partial_support"),
        num_failed: num_failed.max(0) as u32,
        retry_after: row.get("retry_after"),
        last_modify: row.get("last_modify"),
        checksum: row.get("checksum"),
        user_agent: row.get("user_agent"),
        visibility: Visibility::from_code(row.get::<i64, _>("visibility") as i32),
        has_metadata: row.get("has_metadata"),
        date_added: row.get("date_added"),
    })
}

pub(crate) fn piece_from_row(row: &SqliteRow) -> Result<DownloadPiece> {
    let info_id: String = row.get("info_id");
    let idx: i64 = row.get("idx");
    let num_failed: i64 = row.get("num_failed");
    Ok(DownloadPiece {
        info_id: parse_id(&info_id)?,
        index: idx as u32,
        size: row.get("size"),
        cur_bytes: row.get("cur_bytes"),
        status_code: StatusCode::from_code(row.get::<i64, _>("status_code") as i32),
        status_msg: row.get("status_msg"),
        num_failed: num_failed.max(0) as u32,
        speed: 0,
    })
}

pub(crate) fn header_from_row(row: &SqliteRow) -> Result<Header> {
    let info_id: String = row.get("info_id");
    Ok(Header {
        info_id: parse_id(&info_id)?,
        name: row.get("name"),
        value: row.get("value"),
    })
}
