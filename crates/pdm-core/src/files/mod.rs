//! File storage facade.
//!
//! The engine and piece workers only see `FileSystemFacade` and `FileHandle`.
//! Directory references are plain paths or `file://` URIs; `LocalFileSystem`
//! maps both onto the local filesystem. Positioned writes let every worker of
//! a download share one handle without a shared cursor.

mod handle;
mod local;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use handle::{FileHandle, LocalFile};
pub use local::LocalFileSystem;

/// Errors from the file facade.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    #[error("unsupported directory reference: {0}")]
    UnsupportedScheme(String),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FilesError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        FilesError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the underlying I/O error is `ENOSPC`.
    pub fn is_no_space(&self) -> bool {
        match self {
            FilesError::Io { source, .. } => is_no_space(source),
            FilesError::UnsupportedScheme(_) => false,
        }
    }
}

fn is_no_space(e: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        e.raw_os_error() == Some(libc::ENOSPC)
    }
    #[cfg(not(unix))]
    {
        let _ = e;
        false
    }
}

/// Capability interface over the destination storage.
pub trait FileSystemFacade: Send + Sync {
    /// Resolve a directory reference and file name to a concrete path.
    fn resolve(&self, dir: &str, name: &str) -> Result<PathBuf, FilesError>;

    fn exists(&self, path: &Path) -> bool;

    /// Create (or truncate) an empty file, creating parent directories.
    fn create_file(&self, path: &Path) -> Result<(), FilesError>;

    /// Delete a file; a missing file is not an error.
    fn delete(&self, path: &Path) -> Result<(), FilesError>;

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FilesError>;

    /// Bytes available to an unprivileged user in `dir`.
    fn free_space(&self, dir: &str) -> Result<u64, FilesError>;

    /// Open `path` for positioned read/write, creating it if missing.
    /// Existing content is kept.
    fn open_rw(&self, path: &Path) -> Result<Arc<dyn FileHandle>, FilesError>;
}
