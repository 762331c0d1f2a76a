//! `pdm pause <id>` – mark a download paused.

use anyhow::Result;
use pdm_core::store::DownloadId;
use pdm_core::Engine;

pub async fn run_pause(engine: &Engine, id: DownloadId) -> Result<()> {
    engine.pause_download(id).await?;
    println!("Paused download {id}");
    Ok(())
}
