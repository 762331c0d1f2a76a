//! Local filesystem implementation of the file facade.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FileHandle, FileSystemFacade, FilesError, LocalFile};

/// Plain paths and `file://` URIs on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn dir_path(dir: &str) -> Result<PathBuf, FilesError> {
        if dir.starts_with("file:") {
            let parsed =
                url::Url::parse(dir).map_err(|_| FilesError::UnsupportedScheme(dir.to_string()))?;
            return parsed
                .to_file_path()
                .map_err(|_| FilesError::UnsupportedScheme(dir.to_string()));
        }
        if let Some((scheme, _)) = dir.split_once("://") {
            if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
                return Err(FilesError::UnsupportedScheme(dir.to_string()));
            }
        }
        Ok(PathBuf::from(dir))
    }
}

impl FileSystemFacade for LocalFileSystem {
    fn resolve(&self, dir: &str, name: &str) -> Result<PathBuf, FilesError> {
        Ok(Self::dir_path(dir)?.join(name))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_file(&self, path: &Path) -> Result<(), FilesError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FilesError::io(parent, e))?;
        }
        std::fs::File::create(path)
            .map(|_| ())
            .map_err(|e| FilesError::io(path, e))
    }

    fn delete(&self, path: &Path) -> Result<(), FilesError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FilesError::io(path, e)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FilesError> {
        std::fs::rename(from, to).map_err(|e| FilesError::io(from, e))
    }

    #[cfg(unix)]
    fn free_space(&self, dir: &str) -> Result<u64, FilesError> {
        use std::os::unix::ffi::OsStrExt;

        let path = Self::dir_path(dir)?;
        let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            FilesError::io(&path, std::io::Error::from(std::io::ErrorKind::InvalidInput))
        })?;
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let r = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if r != 0 {
            return Err(FilesError::io(&path, std::io::Error::last_os_error()));
        }
        Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
    }

    #[cfg(not(unix))]
    fn free_space(&self, dir: &str) -> Result<u64, FilesError> {
        Self::dir_path(dir)?;
        Ok(u64::MAX)
    }

    fn open_rw(&self, path: &Path) -> Result<Arc<dyn FileHandle>, FilesError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FilesError::io(parent, e))?;
        }
        Ok(Arc::new(LocalFile::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_plain_paths_and_file_uris() {
        let fs = LocalFileSystem::new();
        assert_eq!(
            fs.resolve("/tmp/dl", "a.bin").unwrap(),
            PathBuf::from("/tmp/dl/a.bin")
        );
        assert_eq!(
            fs.resolve("file:///tmp/my%20dir", "a.bin").unwrap(),
            PathBuf::from("/tmp/my dir/a.bin")
        );
        assert!(matches!(
            fs.resolve("content://com.android.externalstorage/tree/x", "a.bin"),
            Err(FilesError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn create_rename_delete() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let a = dir.path().join("sub").join("a.bin");
        let b = dir.path().join("sub").join("b.bin");
        fs.create_file(&a).unwrap();
        assert!(fs.exists(&a));
        fs.rename(&a, &b).unwrap();
        assert!(!fs.exists(&a));
        assert!(fs.exists(&b));
        fs.delete(&b).unwrap();
        fs.delete(&b).unwrap();
        assert!(!fs.exists(&b));
    }

    #[test]
    fn free_space_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let free = fs.free_space(dir.path().to_str().unwrap()).unwrap();
        assert!(free > 0);
    }
}
