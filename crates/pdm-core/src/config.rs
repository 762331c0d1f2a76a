use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Engine settings loaded from `~/.config/pdm/config.toml`.
///
/// Every field has a default so a partial file still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Downloads admitted to run at the same time; the rest wait as pending.
    pub max_active_downloads: usize,
    /// Automatic attempts per download before it is marked failed.
    pub max_download_retries: u32,
    /// Connect and read (no data) timeout in milliseconds.
    pub timeout_ms: u64,
    /// Global receive limit in bytes per second (0 = unlimited).
    pub speed_limit: u64,
    /// Default for new downloads: only run on unmetered networks.
    pub unmetered_connections_only: bool,
    /// Allow downloads while roaming.
    pub enable_roaming: bool,
    /// When a new download collides with an existing file, replace it
    /// instead of picking a free name.
    pub replace_duplicate_downloads: bool,
    /// Reserve the full file length before starting pieces.
    pub preallocate_disk_space: bool,
    /// Lower bound for the automatic retry delay, in milliseconds.
    pub min_retry_after_ms: u64,
    /// Upper bound for the automatic retry delay, in milliseconds.
    pub max_retry_after_ms: u64,
    /// Piece cap when the user did not choose a piece count.
    pub max_pieces: u32,
    /// Target bytes per piece when the user did not choose a piece count.
    pub piece_size_target: u64,
    /// Default `User-Agent` for requests without an override.
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_active_downloads: 3,
            max_download_retries: 5,
            timeout_ms: 20_000,
            speed_limit: 0,
            unmetered_connections_only: false,
            enable_roaming: true,
            replace_duplicate_downloads: false,
            preallocate_disk_space: true,
            min_retry_after_ms: 30_000,
            max_retry_after_ms: 24 * 60 * 60 * 1000,
            max_pieces: 16,
            piece_size_target: 2 * 1024 * 1024,
            user_agent: format!("pdm/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_retry_after(&self) -> Duration {
        Duration::from_millis(self.min_retry_after_ms)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_millis(self.max_retry_after_ms.max(self.min_retry_after_ms))
    }

    /// Per-connection receive limit when `connections` transfers share the global cap.
    pub fn per_connection_speed_limit(&self, connections: usize) -> Option<u64> {
        if self.speed_limit == 0 {
            return None;
        }
        Some((self.speed_limit / connections.max(1) as u64).max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load settings from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<Settings> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = Settings::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: Settings = toml::from_str(&data)?;
    Ok(cfg)
}
