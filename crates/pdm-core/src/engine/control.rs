//! User controls: pause, resume, stop, delete, and the bulk variants.

use std::time::Duration;

use super::registry::{wait_done, StopReason};
use super::{Engine, EngineError};
use crate::status::StatusCode;
use crate::store::{DownloadId, DownloadInfo};

/// States `resume_download` restarts from.
fn resumable(status: StatusCode) -> bool {
    !status.is_success() && status != StatusCode::Running
}

impl Engine {
    /// Ask a running download to stop and wait until its workers are gone.
    /// Returns false when it was not running.
    async fn stop_running(&self, id: DownloadId, reason: StopReason) -> bool {
        match self.inner.registry.request_stop(id, reason) {
            Some(done) => {
                tracing::debug!(%id, ?reason, "stop requested");
                wait_done(done).await;
                true
            }
            None => false,
        }
    }

    /// Pause a download. Running pieces keep their progress; queued or
    /// waiting downloads are parked as paused. Completed downloads are unchanged.
    pub async fn pause_download(&self, id: DownloadId) -> Result<(), EngineError> {
        if self.stop_running(id, StopReason::Pause).await {
            return Ok(());
        }
        self.inner.registry.dequeue(id);
        let info = self.load(id).await?;
        if info.status_code.is_in_progress() && info.status_code != StatusCode::Paused {
            self.set_status(info, StatusCode::Paused, None).await?;
        }
        Ok(())
    }

    /// Resume a paused, stopped, waiting or failed download and run it.
    /// A failed download gets a fresh retry budget. Equivalent to
    /// `run_download` once the status is reset.
    pub async fn resume_download(&self, id: DownloadId) -> Result<StatusCode, EngineError> {
        let info = self.prepare_resume(id).await?;
        if info.status_code.is_success() {
            return Ok(info.status_code);
        }
        self.run_download(id).await
    }

    /// Reset a download to pending so the next run picks it up.
    async fn prepare_resume(&self, id: DownloadId) -> Result<DownloadInfo, EngineError> {
        let mut info = self.load(id).await?;
        if self.inner.registry.is_active(id) || !resumable(info.status_code) {
            return Ok(info);
        }
        if info.status_code.is_failure() {
            info.num_failed = 0;
        }
        info.retry_after = 0;
        info.status_code = StatusCode::Pending;
        info.status_msg = None;
        self.inner.store.update_info(&info).await?;
        Ok(info)
    }

    /// Stop a download for good without deleting it. It can still be
    /// resumed explicitly.
    pub async fn stop_download(&self, id: DownloadId) -> Result<(), EngineError> {
        if self.stop_running(id, StopReason::Stop).await {
            return Ok(());
        }
        self.inner.registry.dequeue(id);
        let info = self.load(id).await?;
        if info.status_code.is_in_progress() {
            self.set_status(info, StatusCode::Stopped, None).await?;
        }
        Ok(())
    }

    /// Stop a download, then remove its row, pieces and headers; with
    /// `with_file` the destination file is deleted too.
    pub async fn delete_download(&self, id: DownloadId, with_file: bool) -> Result<(), EngineError> {
        self.stop_running(id, StopReason::Delete).await;
        self.inner.registry.dequeue(id);
        let info = self.load(id).await?;
        self.inner.store.delete_info(id).await?;
        if with_file {
            let path = self.inner.files.resolve(&info.dir_path, &info.file_name)?;
            self.inner.files.delete(&path)?;
        }
        tracing::info!(%id, with_file, "download deleted");
        Ok(())
    }

    /// Delete a download together with its file.
    pub async fn cancel_download(&self, id: DownloadId) -> Result<(), EngineError> {
        self.delete_download(id, true).await
    }

    /// Pause every download that is running, queued or waiting.
    pub async fn pause_all_downloads(&self) -> Result<(), EngineError> {
        for info in self.inner.store.get_all_info().await? {
            if info.status_code.is_in_progress() && info.status_code != StatusCode::Paused {
                self.pause_download(info.id).await?;
            }
        }
        Ok(())
    }

    /// Resume every paused download in the background.
    pub async fn resume_all_downloads(&self) -> Result<(), EngineError> {
        for info in self.inner.store.get_all_info().await? {
            if info.status_code == StatusCode::Paused {
                self.prepare_resume(info.id).await?;
                self.spawn_run(info.id);
            }
        }
        Ok(())
    }

    /// After a restart: re-run downloads left running, pending or waiting
    /// for the network, and re-arm retry timers. Returns how many were picked up.
    pub async fn restore_downloads(&self) -> Result<usize, EngineError> {
        let mut restored = 0;
        for mut info in self.inner.store.get_all_info().await? {
            let id = info.id;
            match info.status_code {
                StatusCode::Running => {
                    info.status_code = StatusCode::Pending;
                    self.inner.store.update_info(&info).await?;
                    self.spawn_run(id);
                }
                StatusCode::Pending | StatusCode::WaitingForNetwork => self.spawn_run(id),
                StatusCode::WaitingToRetry => {
                    self.schedule_retry(id, Duration::from_millis(info.retry_after.max(0) as u64))
                }
                _ => continue,
            }
            restored += 1;
        }
        tracing::info!(restored, "downloads restored");
        Ok(restored)
    }

    /// Connectivity changed: retry downloads parked on the network.
    pub async fn network_changed(&self) -> Result<(), EngineError> {
        for info in self.inner.store.get_all_info().await? {
            if info.status_code == StatusCode::WaitingForNetwork {
                self.spawn_run(info.id);
            }
        }
        Ok(())
    }

    /// Pause everything running and forget the queue. Queued downloads stay
    /// pending in the store for `restore_downloads`.
    pub async fn shutdown(&self) {
        let cleared = self.inner.registry.clear_queue();
        let active = self.inner.registry.active_ids();
        tracing::info!(active = active.len(), queued = cleared.len(), "engine shutting down");
        for id in active {
            self.stop_running(id, StopReason::Pause).await;
        }
    }
}
