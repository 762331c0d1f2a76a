use std::path::PathBuf;

use crate::files::FilesError;
use crate::http::ProbeError;
use crate::store::DownloadId;

/// Errors surfaced to callers of the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("download {0} not found")]
    NotFound(DownloadId),
    /// Target file exists; retry with `replace_existing` to overwrite it.
    #[error("file already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),
    #[error("insufficient space: {required} bytes needed, {available} available")]
    InsufficientSpace { required: u64, available: u64 },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Files(#[from] FilesError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
