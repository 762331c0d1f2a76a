//! Checksum command: compute SHA-256 of a file, or verify an expected digest.

use anyhow::{bail, Result};
use pdm_core::checksum;
use std::path::Path;

pub async fn run_checksum(path: &Path, expect: Option<&str>) -> Result<()> {
    let Some(expected) = expect else {
        let digest = checksum::sha256_path(path)?;
        println!("{}  {}", digest, path.display());
        return Ok(());
    };
    if !checksum::is_valid_checksum(expected) {
        bail!("not an MD5 or SHA-256 digest: {}", expected);
    }
    if checksum::verify_path(path, expected)? {
        println!("OK  {}", path.display());
        Ok(())
    } else {
        bail!("checksum mismatch for {}", path.display())
    }
}
