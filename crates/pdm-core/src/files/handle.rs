//! Positioned read/write handle shared by the workers of one download.

use std::fs::File;
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use super::FilesError;

/// Open destination file. Implementations must allow concurrent `write_at`
/// calls on disjoint ranges.
pub trait FileHandle: Send + Sync {
    /// Write all of `data` at `offset` without moving any shared cursor.
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), FilesError>;

    /// Flush written data to the device.
    fn sync_data(&self) -> Result<(), FilesError>;

    fn len(&self) -> Result<u64, FilesError>;

    /// Set the file length, dropping or zero-filling the tail.
    fn truncate(&self, len: u64) -> Result<(), FilesError>;

    /// Reserve `len` bytes of disk blocks.
    fn preallocate(&self, len: u64) -> Result<(), FilesError>;
}

/// `FileHandle` over a local file (pwrite on Unix).
#[derive(Debug)]
pub struct LocalFile {
    file: File,
    path: PathBuf,
}

impl LocalFile {
    pub fn open(path: &Path) -> Result<Self, FilesError> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| FilesError::io(path, e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileHandle for LocalFile {
    #[cfg(unix)]
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), FilesError> {
        self.file
            .write_all_at(data, offset)
            .map_err(|e| FilesError::io(&self.path, e))
    }

    #[cfg(not(unix))]
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), FilesError> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone().map_err(|e| FilesError::io(&self.path, e))?;
        f.seek(SeekFrom::Start(offset))
            .and_then(|_| f.write_all(data))
            .map_err(|e| FilesError::io(&self.path, e))
    }

    fn sync_data(&self) -> Result<(), FilesError> {
        self.file.sync_data().map_err(|e| FilesError::io(&self.path, e))
    }

    fn len(&self) -> Result<u64, FilesError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| FilesError::io(&self.path, e))
    }

    fn truncate(&self, len: u64) -> Result<(), FilesError> {
        self.file.set_len(len).map_err(|e| FilesError::io(&self.path, e))
    }

    /// On Unix tries `posix_fallocate` for real block allocation; falls back
    /// to `set_len` when the filesystem does not support it.
    fn preallocate(&self, len: u64) -> Result<(), FilesError> {
        if len == 0 {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, len as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            if r == libc::ENOSPC {
                return Err(FilesError::io(&self.path, std::io::Error::from_raw_os_error(r)));
            }
            tracing::debug!(errno = r, path = %self.path.display(), "posix_fallocate failed, falling back to set_len");
        }
        if self.len()? < len {
            self.truncate(len)?;
        }
        Ok(())
    }
}
