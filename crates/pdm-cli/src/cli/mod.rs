//! CLI for the PDM download manager.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use pdm_core::config;
use pdm_core::files::LocalFileSystem;
use pdm_core::store::{DownloadId, DownloadStore};
use pdm_core::system::StaticSystemFacade;
use pdm_core::Engine;

use commands::{
    run_add, run_checksum, run_downloads, run_pause, run_remove, run_resume, run_set, run_status,
    AddArgs, SetArgs,
};

/// Top-level CLI for the PDM download manager.
#[derive(Debug, Parser)]
#[command(name = "pdm")]
#[command(about = "PDM: multi-piece HTTP download manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Add a new download.
    Add(AddArgs),

    /// Run downloads in the foreground until they finish, fail or wait.
    Run {
        /// Download ids (or unique prefixes). Default: every unfinished download.
        ids: Vec<String>,
    },

    /// Show all downloads.
    Status {
        /// Print one JSON object per download instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Pause a download.
    Pause {
        /// Download id or unique prefix.
        id: String,
    },

    /// Resume a paused, stopped or failed download and run it.
    Resume {
        /// Download id or unique prefix.
        id: String,
    },

    /// Remove a download.
    Remove {
        /// Download id or unique prefix.
        id: String,

        /// Also delete the downloaded file.
        #[arg(long)]
        delete_file: bool,
    },

    /// Change parameters of an existing download.
    Set(SetArgs),

    /// Compute (or verify) the checksum of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,

        /// Expected MD5 or SHA-256 digest; exit with an error on mismatch.
        #[arg(long, value_name = "HEX")]
        expect: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Checksum { path, expect } = &cli.command {
            return run_checksum(path, expect.as_deref()).await;
        }

        let settings = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", settings);
        let store = DownloadStore::open_default().await?;
        let engine = Engine::new(
            store,
            Arc::new(LocalFileSystem::new()),
            Arc::new(StaticSystemFacade::default()),
            settings,
        );

        match cli.command {
            CliCommand::Add(args) => run_add(&engine, args).await?,
            CliCommand::Run { ids } => {
                let ids = resolve_ids(engine.store(), &ids).await?;
                run_downloads(&engine, ids).await?;
            }
            CliCommand::Status { json } => run_status(&engine, json).await?,
            CliCommand::Pause { id } => {
                let id = resolve_id(engine.store(), &id).await?;
                run_pause(&engine, id).await?;
            }
            CliCommand::Resume { id } => {
                let id = resolve_id(engine.store(), &id).await?;
                run_resume(&engine, id).await?;
            }
            CliCommand::Remove { id, delete_file } => {
                let id = resolve_id(engine.store(), &id).await?;
                run_remove(&engine, id, delete_file).await?;
            }
            CliCommand::Set(args) => {
                let id = resolve_id(engine.store(), &args.id).await?;
                run_set(&engine, id, args).await?;
            }
            CliCommand::Checksum { .. } => {}
        }
        Ok(())
    }
}

/// Match `needle` against stored ids: a full UUID or a unique prefix.
fn match_id(known: &[DownloadId], needle: &str) -> Result<DownloadId> {
    let needle = needle.trim().to_ascii_lowercase();
    if needle.is_empty() {
        bail!("empty download id");
    }
    let hits: Vec<DownloadId> = known
        .iter()
        .copied()
        .filter(|id| id.to_string().starts_with(&needle))
        .collect();
    match hits.as_slice() {
        [id] => Ok(*id),
        [] => bail!("no download matches {:?}", needle),
        _ => bail!("{:?} matches {} downloads; use more characters", needle, hits.len()),
    }
}

async fn resolve_id(store: &DownloadStore, needle: &str) -> Result<DownloadId> {
    let known: Vec<DownloadId> = store.get_all_info().await?.into_iter().map(|i| i.id).collect();
    match_id(&known, needle)
}

async fn resolve_ids(store: &DownloadStore, needles: &[String]) -> Result<Vec<DownloadId>> {
    let known: Vec<DownloadId> = store.get_all_info().await?.into_iter().map(|i| i.id).collect();
    needles.iter().map(|n| match_id(&known, n)).collect()
}

#[cfg(test)]
mod tests;
