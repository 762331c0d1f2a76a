use super::EngineError;
use crate::store::DownloadId;

/// Notifications for the host (UI, CLI). Callbacks run on engine tasks and
/// must not block.
pub trait EngineListener: Send + Sync {
    /// No download is running, queued, pending or waiting to retry.
    fn on_downloads_completed(&self) {}

    /// A `change_params` call finished; `error` is set when it was rejected.
    fn on_params_applied(&self, _id: DownloadId, _name: &str, _error: Option<&EngineError>) {}
}
