//! `pdm resume <id>` – resume a download and run it in the foreground.

use anyhow::Result;
use pdm_core::store::DownloadId;
use pdm_core::Engine;

use super::run::drive;

pub async fn run_resume(engine: &Engine, id: DownloadId) -> Result<()> {
    drive(engine, vec![id], |e, id| async move { e.resume_download(id).await }).await
}
