//! `pdm add <url>` – add a new download.

use anyhow::{bail, Result};
use clap::Args;
use pdm_core::{AddDownloadRequest, Engine};
use std::path::PathBuf;

use super::human_bytes;

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Direct HTTP/HTTPS URL to download.
    pub url: String,

    /// Destination directory (default: current directory).
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// File name (default: from the server or the URL).
    #[arg(long)]
    pub name: Option<String>,

    /// Number of pieces (1-256; default: chosen from the size).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=256))]
    pub pieces: Option<u32>,

    /// Expected MD5 or SHA-256 digest, checked after the download.
    #[arg(long, value_name = "HEX")]
    pub checksum: Option<String>,

    /// Extra request header, `Name: value`. Repeatable.
    #[arg(long = "header", short = 'H', value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Only download on unmetered networks.
    #[arg(long)]
    pub unmetered_only: bool,

    /// Do not retry automatically after a failure.
    #[arg(long)]
    pub no_retry: bool,

    /// Fetch size and name from the server now instead of on the first run.
    #[arg(long)]
    pub probe: bool,
}

/// Split `Name: value`.
pub(crate) fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => bail!("header must look like `Name: value`: {:?}", raw),
    }
}

pub async fn run_add(engine: &Engine, args: AddArgs) -> Result<()> {
    let dir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let headers = args
        .headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<Result<Vec<_>>>()?;
    let probe = if args.probe {
        let probe = engine.probe(&args.url, &headers).await?;
        println!(
            "{}: {} ({})",
            probe.file_name(),
            human_bytes(probe.total_bytes),
            if probe.partial_support {
                "resumable"
            } else {
                "not resumable"
            }
        );
        Some(probe)
    } else {
        None
    };

    let req = AddDownloadRequest {
        url: args.url.clone(),
        dir_path: dir.to_string_lossy().into_owned(),
        file_name: args.name,
        num_pieces: args.pieces,
        checksum: args.checksum,
        unmetered_connections_only: args.unmetered_only.then_some(true),
        no_retry: args.no_retry,
        headers,
        probe,
        ..Default::default()
    };
    let id = engine.add_download(req).await?;
    println!("Added download {id} for URL: {}", args.url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_header;

    #[test]
    fn header_parsing() {
        assert_eq!(
            parse_header("Referer: http://h/a").unwrap(),
            ("Referer".to_string(), "http://h/a".to_string())
        );
        assert!(parse_header("no colon").is_err());
        assert!(parse_header(": value").is_err());
    }
}
