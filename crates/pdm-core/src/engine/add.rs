//! Creating downloads and probing URLs on behalf of the UI.

use super::run::apply_metadata;
use super::{Engine, EngineError};
use crate::checksum::is_valid_checksum;
use crate::http::{validate_url, ProbeResult};
use crate::planner::{MAX_PIECES, MIN_PIECES};
use crate::store::{DownloadId, DownloadInfo, Header, Visibility};
use crate::url_model::{derive_filename, sanitize_filename, unique_filename};

/// A new download as submitted by the user.
#[derive(Debug, Clone, Default)]
pub struct AddDownloadRequest {
    pub url: String,
    /// Destination directory: a plain path or a `file://` URI.
    pub dir_path: String,
    /// Preferred file name; derived from the probe or URL when absent.
    pub file_name: Option<String>,
    pub description: Option<String>,
    /// Piece count chosen by the user; the engine picks one when absent.
    pub num_pieces: Option<u32>,
    pub checksum: Option<String>,
    pub user_agent: Option<String>,
    /// Falls back to the `unmetered_connections_only` setting.
    pub unmetered_connections_only: Option<bool>,
    /// Disable automatic retries.
    pub no_retry: bool,
    pub visibility: Visibility,
    /// Extra request headers (Referer, Cookie...).
    pub headers: Vec<(String, String)>,
    /// Metadata from an earlier `probe` call. Without it the first run probes.
    pub probe: Option<ProbeResult>,
    /// Start the download in the background right away.
    pub start: bool,
}

impl Engine {
    /// Fetch metadata for `url` without creating a download.
    pub async fn probe(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<ProbeResult, EngineError> {
        validate_url(url).map_err(|e| EngineError::InvalidRequest(e.to_string()))?;
        let mut headers = headers.to_vec();
        if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("user-agent")) {
            headers.push(("User-Agent".into(), self.settings().user_agent));
        }
        self.probe_url(url, headers).await
    }

    /// Validate and store a new download with its initial piece plan.
    ///
    /// A name that collides with an existing file or download in the same
    /// directory gets a ` (N)` suffix, unless the `replace_duplicate_downloads`
    /// setting is on, in which case the old file is deleted.
    pub async fn add_download(&self, req: AddDownloadRequest) -> Result<DownloadId, EngineError> {
        validate_url(&req.url).map_err(|e| EngineError::InvalidRequest(e.to_string()))?;
        if req.dir_path.trim().is_empty() {
            return Err(EngineError::InvalidRequest("destination directory is empty".into()));
        }
        let checksum = req
            .checksum
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        if let Some(c) = checksum {
            if !is_valid_checksum(c) {
                return Err(EngineError::InvalidRequest(format!(
                    "not an MD5 or SHA-256 digest: {}",
                    c
                )));
            }
        }
        let settings = self.settings();

        let wanted = match (&req.file_name, &req.probe) {
            (Some(name), _) => sanitize_filename(name),
            (None, Some(probe)) => probe.file_name(),
            (None, None) => derive_filename(&req.url, None, None),
        };
        if wanted.is_empty() {
            return Err(EngineError::InvalidRequest("unusable file name".into()));
        }
        let file_name = self.free_file_name(&req.dir_path, &wanted, settings.replace_duplicate_downloads).await?;

        let mut info = DownloadInfo::new(req.url.clone(), req.dir_path.clone(), file_name);
        info.description = req.description.clone().filter(|d| !d.is_empty());
        info.checksum = checksum.map(str::to_ascii_lowercase);
        info.user_agent = req.user_agent.clone();
        info.unmetered_connections_only = req
            .unmetered_connections_only
            .unwrap_or(settings.unmetered_connections_only);
        info.retry = !req.no_retry;
        info.visibility = req.visibility;
        info.num_pieces = req
            .num_pieces
            .map(|n| n.clamp(MIN_PIECES, MAX_PIECES))
            .unwrap_or(1);

        let mut headers: Vec<Header> = req
            .headers
            .iter()
            .map(|(n, v)| Header::new(info.id, n.clone(), v.clone()))
            .collect();
        if let Some(probe) = &req.probe {
            apply_metadata(&mut info, probe, &settings);
            if let Some(tag) = &probe.etag {
                headers.retain(|h| !h.name.eq_ignore_ascii_case("etag"));
                headers.push(Header::new(info.id, "ETag", tag.clone()));
            }
        }
        let pieces = info.make_pieces();
        self.inner
            .store
            .add_info_with_pieces_and_headers(&info, &pieces, &headers)
            .await?;
        tracing::info!(
            id = %info.id,
            url = %info.url,
            name = %info.file_name,
            pieces = info.num_pieces,
            "download added"
        );

        if req.start {
            self.spawn_run(info.id);
        }
        Ok(info.id)
    }

    /// `wanted`, or the first free `wanted (N)` in `dir`.
    async fn free_file_name(
        &self,
        dir: &str,
        wanted: &str,
        replace: bool,
    ) -> Result<String, EngineError> {
        let files = &self.inner.files;
        if replace {
            let path = files.resolve(dir, wanted)?;
            files.delete(&path)?;
            return Ok(wanted.to_string());
        }
        let known: Vec<String> = self
            .inner
            .store
            .get_all_info()
            .await?
            .into_iter()
            .filter(|i| i.dir_path == dir)
            .map(|i| i.file_name)
            .collect();
        Ok(unique_filename(wanted, |candidate| {
            known.iter().any(|k| k == candidate)
                || files
                    .resolve(dir, candidate)
                    .map(|p| files.exists(&p))
                    .unwrap_or(false)
        }))
    }
}
