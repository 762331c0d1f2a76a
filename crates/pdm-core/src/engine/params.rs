//! Changing parameters of an existing download.

use super::{Engine, EngineError};
use crate::checksum::is_valid_checksum;
use crate::store::{DownloadId, DownloadInfo, UNKNOWN_SIZE};
use crate::url_model::sanitize_filename;

/// Fields a user may change after a download was added. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeableParams {
    /// New URL. Discards progress and metadata.
    pub url: Option<String>,
    pub file_name: Option<String>,
    pub dir_path: Option<String>,
    pub description: Option<String>,
    pub unmetered_connections_only: Option<bool>,
    pub retry: Option<bool>,
    /// New expected digest; an empty string clears it.
    pub checksum: Option<String>,
}

impl ChangeableParams {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Engine {
    /// Apply `params` to download `id`. A running download is paused first
    /// and restarted afterwards.
    ///
    /// When the new name or directory points at an existing file the call
    /// fails with `FileAlreadyExists` unless `replace_existing` is set.
    /// Listeners get `on_params_applied` either way.
    pub async fn change_params(
        &self,
        id: DownloadId,
        params: ChangeableParams,
        replace_existing: bool,
    ) -> Result<(), EngineError> {
        let was_running = self.inner.registry.is_active(id) || self.inner.registry.is_queued(id);
        if was_running {
            self.pause_download(id).await?;
        }
        let result = self.apply_params(id, &params, replace_existing).await;

        let name = match &result {
            Ok(info) => info.file_name.clone(),
            Err(_) => self
                .inner
                .store
                .get_info(id)
                .await
                .ok()
                .flatten()
                .map(|i| i.file_name)
                .unwrap_or_default(),
        };
        for listener in self.listeners() {
            listener.on_params_applied(id, &name, result.as_ref().err());
        }
        if was_running && !matches!(result, Err(EngineError::NotFound(_))) {
            self.resume_download_in_background(id).await;
        }
        result.map(|_| ())
    }

    async fn resume_download_in_background(&self, id: DownloadId) {
        let mut info = match self.load(id).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(%id, "cannot restart after parameter change: {}", e);
                return;
            }
        };
        info.status_code = crate::status::StatusCode::Pending;
        info.status_msg = None;
        if let Err(e) = self.inner.store.update_info(&info).await {
            tracing::warn!(%id, "cannot restart after parameter change: {:#}", e);
            return;
        }
        self.spawn_run(id);
    }

    async fn apply_params(
        &self,
        id: DownloadId,
        params: &ChangeableParams,
        replace_existing: bool,
    ) -> Result<DownloadInfo, EngineError> {
        let mut info = self.load(id).await?;

        if let Some(checksum) = &params.checksum {
            let checksum = checksum.trim();
            if !checksum.is_empty() && !is_valid_checksum(checksum) {
                return Err(EngineError::InvalidRequest(format!(
                    "not an MD5 or SHA-256 digest: {}",
                    checksum
                )));
            }
        }
        if let Some(url) = &params.url {
            crate::http::validate_url(url)
                .map_err(|e| EngineError::InvalidRequest(e.to_string()))?;
        }

        let old_path = self.inner.files.resolve(&info.dir_path, &info.file_name)?;
        let new_name = match &params.file_name {
            Some(name) => {
                let clean = sanitize_filename(name);
                if clean.is_empty() {
                    return Err(EngineError::InvalidRequest(format!("unusable file name: {:?}", name)));
                }
                clean
            }
            None => info.file_name.clone(),
        };
        let new_dir = params.dir_path.clone().unwrap_or_else(|| info.dir_path.clone());
        let new_path = self.inner.files.resolve(&new_dir, &new_name)?;

        if new_path != old_path {
            if self.inner.files.exists(&new_path) {
                if !replace_existing {
                    return Err(EngineError::FileAlreadyExists(new_path));
                }
                self.inner.files.delete(&new_path)?;
            }
            if self.inner.files.exists(&old_path) {
                self.inner.files.rename(&old_path, &new_path)?;
            }
            tracing::info!(%id, from = %old_path.display(), to = %new_path.display(), "download moved");
        }
        info.file_name = new_name;
        info.dir_path = new_dir;

        if let Some(description) = &params.description {
            info.description = Some(description.clone()).filter(|d| !d.is_empty());
        }
        if let Some(unmetered) = params.unmetered_connections_only {
            info.unmetered_connections_only = unmetered;
        }
        if let Some(retry) = params.retry {
            info.retry = retry;
        }
        if let Some(checksum) = &params.checksum {
            let checksum = checksum.trim();
            info.checksum = (!checksum.is_empty()).then(|| checksum.to_ascii_lowercase());
        }

        match &params.url {
            Some(url) if *url != info.url => {
                info.url = url.clone();
                info.has_metadata = false;
                info.total_bytes = UNKNOWN_SIZE;
                info.partial_support = false;
                info.num_pieces = 1;
                info.num_failed = 0;
                info.last_modify = 0;
                self.inner.files.delete(&new_path)?;
                self.inner.store.remove_header(id, "ETag").await?;
                let pieces = info.make_pieces();
                self.inner
                    .store
                    .update_info_and_replace_pieces(&info, &pieces)
                    .await?;
                tracing::info!(%id, "url changed, progress discarded");
            }
            _ => self.inner.store.update_info(&info).await?,
        }
        Ok(info)
    }
}
