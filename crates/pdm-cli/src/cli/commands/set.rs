//! `pdm set <id>` – change parameters of an existing download.

use anyhow::{bail, Result};
use clap::Args;
use pdm_core::store::DownloadId;
use pdm_core::{ChangeableParams, Engine};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Download id or unique prefix.
    pub id: String,

    /// New URL; discards progress.
    #[arg(long)]
    pub url: Option<String>,

    /// New file name; the file is renamed.
    #[arg(long)]
    pub name: Option<String>,

    /// New destination directory; the file is moved.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    #[arg(long)]
    pub description: Option<String>,

    /// Expected MD5 or SHA-256 digest; empty to clear.
    #[arg(long, value_name = "HEX")]
    pub checksum: Option<String>,

    /// Only download on unmetered networks.
    #[arg(long, value_name = "BOOL")]
    pub unmetered_only: Option<bool>,

    /// Retry automatically after failures.
    #[arg(long, value_name = "BOOL")]
    pub retry: Option<bool>,

    /// Overwrite an existing file at the new location.
    #[arg(long)]
    pub replace: bool,
}

impl SetArgs {
    pub fn to_params(&self) -> ChangeableParams {
        ChangeableParams {
            url: self.url.clone(),
            file_name: self.name.clone(),
            dir_path: self.dir.as_ref().map(|d| d.to_string_lossy().into_owned()),
            description: self.description.clone(),
            unmetered_connections_only: self.unmetered_only,
            retry: self.retry,
            checksum: self.checksum.clone(),
        }
    }
}

pub async fn run_set(engine: &Engine, id: DownloadId, args: SetArgs) -> Result<()> {
    let params = args.to_params();
    if params.is_empty() {
        bail!("nothing to change");
    }
    engine.change_params(id, params, args.replace).await?;
    println!("Updated download {id}");
    Ok(())
}
