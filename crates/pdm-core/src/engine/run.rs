use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::aggregate::{aggregate, Verdict};
use super::progress::{self, persist_progress};
use super::registry::{ActiveRun, Admission, StopReason};
use super::{Dispatch, Engine, EngineError};
use crate::checksum;
use crate::config::Settings;
use crate::http::{self, ProbeError, ProbeResult};
use crate::planner::choose_piece_count;
use crate::retry::{classify_http_error, classify_http_status, RetryPolicy};
use crate::status::StatusCode;
use crate::store::{DownloadId, DownloadInfo, DownloadPiece, Header};
use crate::worker::{self, PieceJob, PieceOutcome, WorkerOptions};

const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Fill probe metadata into `info` and choose its piece count.
///
/// Before metadata is known, a `num_pieces` above one is the count the user
/// asked for; one means "pick for me".
pub(crate) fn apply_metadata(info: &mut DownloadInfo, probe: &ProbeResult, settings: &Settings) {
    info.total_bytes = probe.total_bytes;
    info.partial_support = probe.partial_support;
    if let Some(mime) = &probe.mime_type {
        info.mime_type = mime.clone();
    }
    info.last_modify = probe.last_modified.unwrap_or(0);
    let requested = if info.num_pieces > 1 { info.num_pieces } else { 0 };
    info.num_pieces = choose_piece_count(
        info.total_bytes,
        info.partial_support,
        requested,
        settings.max_pieces,
        settings.piece_size_target,
    );
    info.has_metadata = true;
}

/// Request headers used for probing: stored overrides minus validators.
pub(crate) fn probe_headers(headers: &[Header], user_agent: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = headers
        .iter()
        .filter(|h| !h.name.eq_ignore_ascii_case("etag") && !h.name.eq_ignore_ascii_case("range"))
        .map(|h| (h.name.clone(), h.value.clone()))
        .collect();
    if !out.iter().any(|(n, _)| n.eq_ignore_ascii_case("user-agent")) {
        out.push(("User-Agent".into(), user_agent.into()));
    }
    out
}

fn probe_failure(e: &ProbeError) -> (StatusCode, Option<Duration>) {
    match e {
        ProbeError::Http(e) => (classify_http_error(e), None),
        ProbeError::Status { status, retry_after } => (classify_http_status(*status), *retry_after),
    }
}

impl Engine {
    /// Drive `id` until it succeeds, fails, pauses or stops, or starts waiting
    /// (for a slot, the network or a retry timer). Returns the resulting status.
    ///
    /// A download that is already running is left alone and its current
    /// status returned. Completed downloads are not restarted; use
    /// `resume_download` for that.
    pub async fn run_download(&self, id: DownloadId) -> Result<StatusCode, EngineError> {
        let info = self.load(id).await?;
        if info.status_code.is_completed() {
            return Ok(info.status_code);
        }
        let max_active = self.settings().max_active_downloads;
        let run = match self.inner.registry.admit(id, max_active) {
            Admission::AlreadyActive => return Ok(info.status_code),
            Admission::Queued => {
                tracing::debug!(%id, "no free slot, download queued");
                return self.set_status(info, StatusCode::Pending, None).await;
            }
            Admission::Admitted(run) => run,
        };

        let result = self.run_admitted(info, &run).await;
        self.inner.registry.finish(id, run);
        progress::clear_speed(&self.inner.speeds, id);

        if let Ok(StatusCode::WaitingToRetry) = result {
            match self.inner.store.get_info(id).await {
                Ok(Some(info)) => {
                    self.schedule_retry(id, Duration::from_millis(info.retry_after.max(0) as u64))
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(%id, "cannot schedule retry: {:#}", e),
            }
        }
        if let Err(e) = &result {
            tracing::warn!(%id, "download run ended with error: {}", e);
        }
        self.after_run().await;
        result
    }

    pub(crate) async fn load(&self, id: DownloadId) -> Result<DownloadInfo, EngineError> {
        self.inner
            .store
            .get_info(id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    /// Persist a new status for `info` and return it.
    pub(crate) async fn set_status(
        &self,
        mut info: DownloadInfo,
        status: StatusCode,
        message: Option<String>,
    ) -> Result<StatusCode, EngineError> {
        if info.status_code != status {
            tracing::info!(id = %info.id, from = %info.status_code, to = %status, "status change");
        }
        info.status_code = status;
        info.status_msg = message;
        self.inner.store.update_info(&info).await?;
        Ok(status)
    }

    /// Start queued downloads that now fit, or report that everything is done.
    async fn after_run(&self) {
        let max_active = self.settings().max_active_downloads;
        let next = self.inner.registry.take_startable(max_active);
        if !next.is_empty() {
            for id in next {
                self.spawn_run(id);
            }
            return;
        }
        if !self.inner.registry.is_idle() || self.has_pending_work().await {
            return;
        }
        for listener in self.listeners() {
            listener.on_downloads_completed();
        }
    }

    /// A stored download is still due to run: pending, or waiting on a retry timer.
    async fn has_pending_work(&self) -> bool {
        match self.inner.store.get_all_info().await {
            Ok(all) => all.iter().any(|info| {
                matches!(info.status_code, StatusCode::Pending | StatusCode::WaitingToRetry)
            }),
            Err(e) => {
                tracing::warn!("cannot check remaining downloads: {:#}", e);
                true
            }
        }
    }

    pub(crate) fn schedule_retry(&self, id: DownloadId, delay: Duration) {
        tracing::info!(%id, delay_ms = delay.as_millis() as u64, "retry scheduled");
        let tx = self.inner.dispatch.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Dispatch::Retry(id));
        });
    }

    /// Probe `url` on a blocking thread.
    pub(crate) async fn probe_url(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
    ) -> Result<ProbeResult, EngineError> {
        let url = url.to_string();
        let timeout = self.settings().timeout();
        tokio::task::spawn_blocking(move || http::probe(&url, &headers, timeout))
            .await
            .map_err(|e| anyhow::anyhow!("probe task failed: {}", e))?
            .map_err(EngineError::from)
    }

    async fn run_admitted(&self, mut info: DownloadInfo, run: &ActiveRun) -> Result<StatusCode, EngineError> {
        let id = info.id;
        let settings = self.settings();

        let network = self.inner.system.network_info();
        if !network.allows(info.unmetered_connections_only, &settings) {
            tracing::info!(%id, ?network, "network not usable for this download");
            return self
                .set_status(info, StatusCode::WaitingForNetwork, None)
                .await;
        }
        info.status_code = StatusCode::Running;
        info.status_msg = None;
        self.inner.store.update_info(&info).await?;

        if !info.has_metadata {
            let headers = self.inner.store.get_headers(id).await?;
            let ua = info.user_agent.clone().unwrap_or_else(|| settings.user_agent.clone());
            match self.probe_url(&info.url, probe_headers(&headers, &ua)).await {
                Ok(probe) => {
                    if run.stop.load(Ordering::Relaxed) {
                        return self.settle_interrupted(info).await;
                    }
                    self.store_metadata(&mut info, &probe, &settings).await?;
                }
                Err(EngineError::Probe(e)) => {
                    if run.stop.load(Ordering::Relaxed) {
                        return self.settle_interrupted(info).await;
                    }
                    let (status, retry_after) = probe_failure(&e);
                    tracing::warn!(%id, %status, "probe failed: {}", e);
                    return self
                        .settle_failure(info, status, e.to_string(), retry_after, &settings)
                        .await;
                }
                Err(e) => return Err(e),
            }
        }

        let mut pieces = self.inner.store.get_pieces(id).await?;
        if pieces.len() != info.num_pieces as usize {
            tracing::debug!(%id, stored = pieces.len(), planned = info.num_pieces, "re-planning pieces");
            pieces = info.make_pieces();
            self.inner.store.replace_pieces(id, &pieces).await?;
        }

        let path = match self.inner.files.resolve(&info.dir_path, &info.file_name) {
            Ok(path) => path,
            Err(e) => {
                return self
                    .settle_failure(info, StatusCode::FileError, e.to_string(), None, &settings)
                    .await
            }
        };

        if info.total_bytes > 0 {
            let required = (info.total_bytes - info.downloaded_bytes(&pieces)).max(0) as u64;
            match self.inner.files.free_space(&info.dir_path) {
                Ok(available) if available < required => {
                    let msg = format!("{} bytes needed, {} available", required, available);
                    self.set_status(info, StatusCode::InsufficientSpace, Some(msg))
                        .await?;
                    return Err(EngineError::InsufficientSpace { required, available });
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(%id, "free space check skipped: {}", e),
            }
        }

        let file = match self.inner.files.open_rw(&path) {
            Ok(file) => file,
            Err(e) => {
                return self
                    .settle_failure(info, StatusCode::FileError, e.to_string(), None, &settings)
                    .await
            }
        };
        if settings.preallocate_disk_space && info.total_bytes > 0 {
            let total = info.total_bytes as u64;
            if let Err(e) = file.preallocate(total) {
                if e.is_no_space() {
                    self.set_status(info, StatusCode::InsufficientSpace, Some(e.to_string()))
                        .await?;
                    return Err(EngineError::InsufficientSpace {
                        required: total,
                        available: 0,
                    });
                }
                tracing::warn!(%id, "preallocation failed: {}", e);
            }
        }

        let headers = self.inner.store.get_headers(id).await?;
        let todo: Vec<DownloadPiece> = pieces
            .into_iter()
            .filter(|p| !p.status_code.is_success())
            .collect();
        let options = WorkerOptions {
            timeout: settings.timeout(),
            max_recv_speed: settings.per_connection_speed_limit(todo.len()),
            user_agent: info.user_agent.clone().unwrap_or_else(|| settings.user_agent.clone()),
        };
        tracing::info!(
            %id,
            pieces = todo.len(),
            total = info.total_bytes,
            partial = info.partial_support,
            path = %path.display(),
            "starting pieces"
        );

        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let persist = tokio::spawn(persist_progress(
            self.inner.store.clone(),
            Arc::clone(&self.inner.speeds),
            rx,
        ));
        let mut handles = Vec::with_capacity(todo.len());
        for piece in todo {
            let index = piece.index;
            let job = PieceJob {
                info: info.clone(),
                piece,
                headers: headers.clone(),
                file: Arc::clone(&file),
                stop: Arc::clone(&run.stop),
                progress: tx.clone(),
                options: options.clone(),
            };
            handles.push((index, tokio::task::spawn_blocking(move || worker::run_piece(job))));
        }
        drop(tx);

        let mut server_retry_after: Option<Duration> = None;
        let mut crashed = Vec::new();
        for (index, handle) in handles {
            match handle.await {
                Ok((_, PieceOutcome::Failed { retry_after: Some(d), .. })) => {
                    server_retry_after = Some(server_retry_after.map_or(d, |r| r.max(d)));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(%id, piece = index, "piece worker crashed: {}", e);
                    crashed.push(index);
                }
            }
        }
        if let Err(e) = persist.await {
            tracing::warn!(%id, "progress writer ended abnormally: {}", e);
        }
        for index in crashed {
            if let Some(mut piece) = self.inner.store.get_piece(id, index).await? {
                piece.status_code = StatusCode::UnknownError;
                piece.status_msg = Some("piece worker crashed".into());
                piece.num_failed += 1;
                self.inner.store.update_piece(&piece).await?;
            }
        }

        // The row may have been deleted while pieces were winding down.
        let Some(info) = self.inner.store.get_info(id).await? else {
            return Ok(StatusCode::Stopped);
        };
        let reason = self.inner.registry.stop_reason(id);
        if reason == Some(StopReason::Delete) {
            return Ok(StatusCode::Stopped);
        }
        let pieces = self.inner.store.get_pieces(id).await?;
        match aggregate(&pieces, reason) {
            Verdict::Success => self.finish_success(info, &pieces, &path).await,
            Verdict::Failed { status, message } | Verdict::Retryable { status, message } => {
                let message = message.unwrap_or_else(|| status.label());
                self.settle_failure(info, status, message, server_retry_after, &settings)
                    .await
            }
            Verdict::Paused => self.set_status(info, StatusCode::Paused, None).await,
            Verdict::Stopped => self.set_status(info, StatusCode::Stopped, None).await,
        }
    }

    async fn store_metadata(
        &self,
        info: &mut DownloadInfo,
        probe: &ProbeResult,
        settings: &Settings,
    ) -> Result<(), EngineError> {
        apply_metadata(info, probe, settings);
        match &probe.etag {
            Some(tag) => self.inner.store.set_header(info.id, "ETag", tag).await?,
            None => self.inner.store.remove_header(info.id, "ETag").await?,
        }
        let pieces = info.make_pieces();
        self.inner
            .store
            .update_info_and_replace_pieces(info, &pieces)
            .await?;
        tracing::info!(
            id = %info.id,
            total = info.total_bytes,
            partial = info.partial_support,
            pieces = info.num_pieces,
            "metadata stored"
        );
        Ok(())
    }

    /// Record a stop that arrived before any piece started.
    async fn settle_interrupted(&self, info: DownloadInfo) -> Result<StatusCode, EngineError> {
        match self.inner.registry.stop_reason(info.id) {
            Some(StopReason::Delete) => Ok(StatusCode::Stopped),
            Some(StopReason::Stop) => self.set_status(info, StatusCode::Stopped, None).await,
            _ => self.set_status(info, StatusCode::Paused, None).await,
        }
    }

    /// Count a failed attempt and decide between another attempt and failing for good.
    async fn settle_failure(
        &self,
        mut info: DownloadInfo,
        status: StatusCode,
        message: String,
        server_retry_after: Option<Duration>,
        settings: &Settings,
    ) -> Result<StatusCode, EngineError> {
        info.num_failed += 1;
        let policy = RetryPolicy::from_settings(settings);
        if status.is_retryable_failure() && info.retry && policy.should_retry(info.num_failed) {
            let network = self.inner.system.network_info();
            if !network.allows(info.unmetered_connections_only, settings) {
                return self
                    .set_status(info, StatusCode::WaitingForNetwork, Some(message))
                    .await;
            }
            let delay = policy.delay(info.num_failed, server_retry_after);
            info.retry_after = delay.as_millis().min(i64::MAX as u128) as i64;
            tracing::info!(
                id = %info.id,
                %status,
                attempt = info.num_failed,
                delay_ms = info.retry_after,
                "attempt failed, will retry"
            );
            return self
                .set_status(info, StatusCode::WaitingToRetry, Some(message))
                .await;
        }
        tracing::warn!(id = %info.id, %status, attempts = info.num_failed, "download failed: {}", message);
        self.set_status(info, status, Some(message)).await
    }

    async fn finish_success(
        &self,
        mut info: DownloadInfo,
        pieces: &[DownloadPiece],
        path: &Path,
    ) -> Result<StatusCode, EngineError> {
        if info.total_bytes < 0 || !info.partial_support {
            info.total_bytes = info.downloaded_bytes(pieces);
        }
        if let Some(expected) = info.checksum.clone() {
            let target = path.to_path_buf();
            let verified =
                tokio::task::spawn_blocking(move || checksum::verify_path(&target, &expected)).await;
            match verified {
                Ok(Ok(true)) => tracing::debug!(id = %info.id, "checksum verified"),
                Ok(Ok(false)) => {
                    let msg = "downloaded file does not match the expected checksum".to_string();
                    return self
                        .set_status(info, StatusCode::ChecksumMismatch, Some(msg))
                        .await;
                }
                Ok(Err(e)) => {
                    return self
                        .set_status(info, StatusCode::FileError, Some(format!("{:#}", e)))
                        .await;
                }
                Err(e) => {
                    return self
                        .set_status(info, StatusCode::UnknownError, Some(e.to_string()))
                        .await;
                }
            }
        }
        info.retry_after = 0;
        tracing::info!(id = %info.id, bytes = info.total_bytes, "download complete");
        self.set_status(info, StatusCode::Success, None).await
    }
}
