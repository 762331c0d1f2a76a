//! `pdm remove <id>` – remove a download; `--delete-file` also deletes its file.

use anyhow::Result;
use pdm_core::store::DownloadId;
use pdm_core::Engine;

pub async fn run_remove(engine: &Engine, id: DownloadId, delete_file: bool) -> Result<()> {
    engine.delete_download(id, delete_file).await?;
    if delete_file {
        println!("Removed download {id} and its file");
    } else {
        println!("Removed download {id}");
    }
    Ok(())
}
