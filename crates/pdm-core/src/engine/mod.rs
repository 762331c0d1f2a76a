//! Download engine: admission, piece scheduling, aggregation, retries and
//! user controls.
//!
//! `Engine` is a cheap handle. Each `run_download` call drives one download
//! to a resting state (success, failure, pause, stop, waiting). Queued starts
//! and retry timers go through a dispatcher task, so `Engine::new` must be
//! called inside a Tokio runtime.

mod add;
mod aggregate;
mod control;
mod error;
mod listener;
mod params;
mod progress;
mod registry;
mod run;


use std::sync::{Arc, RwLock, Weak};

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::files::FileSystemFacade;
use crate::store::{DownloadId, DownloadStore};
use crate::system::SystemFacade;

pub use add::AddDownloadRequest;
pub use error::EngineError;
pub use listener::EngineListener;
pub use params::ChangeableParams;
pub use progress::DownloadProgress;

use progress::SpeedTable;
use registry::Registry;

/// Work handed to the dispatcher task.
#[derive(Debug, Clone, Copy)]
enum Dispatch {
    /// Start (or queue) a download.
    Run(DownloadId),
    /// Retry timer fired; start only if the download is still waiting for it.
    Retry(DownloadId),
}

struct Inner {
    store: DownloadStore,
    files: Arc<dyn FileSystemFacade>,
    system: Arc<dyn SystemFacade>,
    settings: RwLock<Settings>,
    registry: Registry,
    listeners: RwLock<Vec<Arc<dyn EngineListener>>>,
    speeds: SpeedTable,
    dispatch: mpsc::UnboundedSender<Dispatch>,
}

/// Handle to the download engine. Clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(
        store: DownloadStore,
        files: Arc<dyn FileSystemFacade>,
        system: Arc<dyn SystemFacade>,
        settings: Settings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            store,
            files,
            system,
            settings: RwLock::new(settings),
            registry: Registry::default(),
            listeners: RwLock::new(Vec::new()),
            speeds: SpeedTable::default(),
            dispatch: tx,
        });
        tokio::spawn(dispatch_loop(Arc::downgrade(&inner), rx));
        Self { inner }
    }

    pub fn store(&self) -> &DownloadStore {
        &self.inner.store
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.inner
            .settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace settings. Running pieces keep the values they started with.
    pub fn update_settings(&self, settings: Settings) {
        *self.inner.settings.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    pub fn add_listener(&self, listener: Arc<dyn EngineListener>) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn EngineListener>> {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Ids of downloads with workers running right now.
    pub fn active_downloads(&self) -> Vec<DownloadId> {
        self.inner.registry.active_ids()
    }

    /// Progress from the store plus live speed.
    pub async fn progress(&self, id: DownloadId) -> Result<Option<DownloadProgress>, EngineError> {
        let Some(entry) = self.inner.store.get_info_and_pieces(id).await? else {
            return Ok(None);
        };
        Ok(Some(DownloadProgress {
            id,
            status: entry.info.status_code,
            downloaded_bytes: entry.downloaded_bytes(),
            total_bytes: entry.info.total_bytes,
            speed: progress::total_speed(&self.inner.speeds, id),
        }))
    }

    /// Start `id` in the background.
    fn spawn_run(&self, id: DownloadId) {
        if self.inner.dispatch.send(Dispatch::Run(id)).is_err() {
            tracing::warn!(%id, "dispatcher gone, download not started");
        }
    }

    async fn handle_dispatch(&self, msg: Dispatch) {
        let id = match msg {
            Dispatch::Run(id) => id,
            Dispatch::Retry(id) => {
                match self.inner.store.get_info(id).await {
                    Ok(Some(info)) if info.status_code == crate::status::StatusCode::WaitingToRetry => id,
                    Ok(_) => return,
                    Err(e) => {
                        tracing::warn!(%id, "retry lookup failed: {:#}", e);
                        return;
                    }
                }
            }
        };
        if let Err(e) = self.run_download(id).await {
            tracing::warn!(%id, "background run failed: {}", e);
        }
    }
}

async fn dispatch_loop(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<Dispatch>) {
    while let Some(msg) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let engine = Engine { inner };
        tokio::spawn(async move { engine.handle_dispatch(msg).await });
    }
}
