//! Active-download registry: stop tokens, stop reasons and the admission queue.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::store::DownloadId;
use crate::worker::StopToken;

/// Why a running download was asked to stop. Later, stronger requests win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum StopReason {
    Pause,
    Stop,
    Delete,
}

/// Held by the task running a download; dropping it wakes waiters.
pub(crate) struct ActiveRun {
    pub(crate) stop: StopToken,
    done: watch::Sender<bool>,
}

pub(crate) enum Admission {
    Admitted(ActiveRun),
    AlreadyActive,
    Queued,
}

struct Entry {
    stop: StopToken,
    reason: Option<StopReason>,
    done: watch::Receiver<bool>,
}

#[derive(Default)]
struct State {
    active: HashMap<DownloadId, Entry>,
    queue: VecDeque<DownloadId>,
}

#[derive(Default)]
pub(crate) struct Registry {
    state: Mutex<State>,
}

/// Wait until the run behind `done` has finished.
pub(crate) async fn wait_done(mut done: watch::Receiver<bool>) {
    // A dropped sender means the run is gone too.
    let _ = done.wait_for(|d| *d).await;
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit `id` if fewer than `max_active` downloads run, else queue it (FIFO).
    pub(crate) fn admit(&self, id: DownloadId, max_active: usize) -> Admission {
        let mut state = self.lock();
        if state.active.contains_key(&id) {
            return Admission::AlreadyActive;
        }
        if state.active.len() >= max_active.max(1) {
            if !state.queue.contains(&id) {
                state.queue.push_back(id);
            }
            return Admission::Queued;
        }
        state.queue.retain(|q| *q != id);
        let stop: StopToken = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(false);
        state.active.insert(
            id,
            Entry {
                stop: Arc::clone(&stop),
                reason: None,
                done: rx,
            },
        );
        Admission::Admitted(ActiveRun { stop, done: tx })
    }

    /// Signal a running download to stop. Returns a handle to await its end,
    /// or `None` when it is not running.
    pub(crate) fn request_stop(&self, id: DownloadId, reason: StopReason) -> Option<watch::Receiver<bool>> {
        let mut state = self.lock();
        let entry = state.active.get_mut(&id)?;
        entry.reason = Some(entry.reason.map_or(reason, |r| r.max(reason)));
        entry.stop.store(true, Ordering::Relaxed);
        Some(entry.done.clone())
    }

    pub(crate) fn stop_reason(&self, id: DownloadId) -> Option<StopReason> {
        self.lock().active.get(&id).and_then(|e| e.reason)
    }

    /// Remove a finished run and wake everyone waiting on it.
    pub(crate) fn finish(&self, id: DownloadId, run: ActiveRun) {
        self.lock().active.remove(&id);
        let _ = run.done.send(true);
    }

    /// Drop `id` from the admission queue. True if it was queued.
    pub(crate) fn dequeue(&self, id: DownloadId) -> bool {
        let mut state = self.lock();
        let before = state.queue.len();
        state.queue.retain(|q| *q != id);
        state.queue.len() != before
    }

    /// Pop queued ids that fit in the free slots.
    pub(crate) fn take_startable(&self, max_active: usize) -> Vec<DownloadId> {
        let mut state = self.lock();
        let free = max_active.max(1).saturating_sub(state.active.len());
        let n = free.min(state.queue.len());
        state.queue.drain(..n).collect()
    }

    pub(crate) fn is_active(&self, id: DownloadId) -> bool {
        self.lock().active.contains_key(&id)
    }

    pub(crate) fn is_queued(&self, id: DownloadId) -> bool {
        self.lock().queue.contains(&id)
    }

    pub(crate) fn is_idle(&self) -> bool {
        let state = self.lock();
        state.active.is_empty() && state.queue.is_empty()
    }

    pub(crate) fn active_ids(&self) -> Vec<DownloadId> {
        self.lock().active.keys().copied().collect()
    }

    pub(crate) fn clear_queue(&self) -> Vec<DownloadId> {
        self.lock().queue.drain(..).collect()
    }
}
