//! Post-download checksum verification (MD5 or SHA-256).
//!
//! Computed once after all pieces succeed, never inline with the transfer.
//! The algorithm is picked from the expected digest length: 32 hex chars is
//! MD5, 64 is SHA-256.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Md5,
    Sha256,
}

impl ChecksumKind {
    /// Algorithm implied by a hex digest, or `None` if it is neither MD5 nor SHA-256.
    pub fn detect(hex_digest: &str) -> Option<Self> {
        let d = hex_digest.trim();
        if !d.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match d.len() {
            32 => Some(ChecksumKind::Md5),
            64 => Some(ChecksumKind::Sha256),
            _ => None,
        }
    }
}

/// True if `s` is a usable MD5 or SHA-256 hex digest.
pub fn is_valid_checksum(s: &str) -> bool {
    ChecksumKind::detect(s).is_some()
}

fn read_chunks(path: &Path, mut f: impl FnMut(&[u8])) -> Result<()> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        f(&buf[..n]);
    }
    Ok(())
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    read_chunks(path, |chunk| hasher.update(chunk))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compute MD5 of a file as lowercase hex.
pub fn md5_path(path: &Path) -> Result<String> {
    let mut ctx = md5::Context::new();
    read_chunks(path, |chunk| ctx.consume(chunk))?;
    Ok(format!("{:x}", ctx.compute()))
}

/// Digest of `path` with the given algorithm.
pub fn digest_path(path: &Path, kind: ChecksumKind) -> Result<String> {
    match kind {
        ChecksumKind::Md5 => md5_path(path),
        ChecksumKind::Sha256 => sha256_path(path),
    }
}

/// Compare a file against an expected digest (case-insensitive).
/// Returns `Ok(false)` on mismatch and an error for an unrecognised digest.
pub fn verify_path(path: &Path, expected: &str) -> Result<bool> {
    let kind = ChecksumKind::detect(expected)
        .with_context(|| format!("unsupported checksum: {}", expected))?;
    let actual = digest_path(path, kind)?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = sha256_path(f.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn known_content_digests() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        assert_eq!(
            sha256_path(f.path()).unwrap(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
        assert_eq!(md5_path(f.path()).unwrap(), "b1946ac92492d2347c6235b4d2611184");
    }

    #[test]
    fn verify_matches_and_mismatches() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        assert!(verify_path(f.path(), "B1946AC92492D2347C6235B4D2611184").unwrap());
        assert!(!verify_path(f.path(), "d41d8cd98f00b204e9800998ecf8427e").unwrap());
        assert!(verify_path(
            f.path(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        )
        .unwrap());
        assert!(verify_path(f.path(), "abc").is_err());
    }

    #[test]
    fn detect_kind() {
        assert_eq!(ChecksumKind::detect(&"a".repeat(32)), Some(ChecksumKind::Md5));
        assert_eq!(ChecksumKind::detect(&"0".repeat(64)), Some(ChecksumKind::Sha256));
        assert_eq!(ChecksumKind::detect(&"z".repeat(32)), None);
        assert_eq!(ChecksumKind::detect("1234"), None);
    }
}
