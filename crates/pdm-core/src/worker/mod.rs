//! Piece worker: downloads one piece's byte range into its region of the
//! destination file.
//!
//! A worker makes exactly one attempt. It never touches the download row;
//! it only reports piece snapshots on the progress channel and returns an
//! outcome. Retry decisions belong to the engine.

mod request;
mod sink;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::files::FileHandle;
use crate::http;
use crate::status::StatusCode;
use crate::store::{DownloadInfo, DownloadPiece, Header};

pub(crate) use request::{build_request, PiecePlan};
use sink::PieceSink;
pub use sink::{PROGRESS_BYTES, PROGRESS_INTERVAL};

/// Cooperative cancellation flag shared by the engine and every worker of a download.
pub type StopToken = Arc<AtomicBool>;

/// Per-request settings handed to a worker.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub timeout: Duration,
    /// Receive cap for this connection in bytes per second.
    pub max_recv_speed: Option<u64>,
    /// `User-Agent` when neither the download nor its headers set one.
    pub user_agent: String,
}

/// Everything one attempt at one piece needs. Snapshots are loaded fresh
/// by the engine right before launch.
pub struct PieceJob {
    pub info: DownloadInfo,
    pub piece: DownloadPiece,
    pub headers: Vec<Header>,
    pub file: Arc<dyn FileHandle>,
    pub stop: StopToken,
    pub progress: mpsc::Sender<DownloadPiece>,
    pub options: WorkerOptions,
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PieceOutcome {
    Success,
    /// Stop signal observed; not a failure.
    Stopped,
    Failed {
        status: StatusCode,
        message: String,
        /// Delay requested by the server, if any.
        retry_after: Option<Duration>,
    },
}

/// Run one attempt. Blocks; call from `spawn_blocking`.
///
/// Returns the final piece snapshot (also sent on the progress channel).
pub fn run_piece(job: PieceJob) -> (DownloadPiece, PieceOutcome) {
    let PieceJob {
        info,
        mut piece,
        headers,
        file,
        stop,
        progress,
        options,
    } = job;

    if piece.size == 0 {
        tracing::debug!(id = %info.id, piece = piece.index, "empty piece");
        piece.status_code = StatusCode::Success;
        piece.status_msg = None;
        let _ = progress.blocking_send(piece.clone());
        return (piece, PieceOutcome::Success);
    }

    let plan = PiecePlan::new(&info, &piece);
    piece.cur_bytes = plan.from;
    piece.status_code = StatusCode::Running;
    piece.status_msg = None;
    let mut sink = PieceSink::new(file, piece, plan.clone(), stop.clone(), progress);

    if plan.is_complete() {
        tracing::debug!(id = %info.id, piece = sink.piece.index, "piece already on disk");
        return sink.finish(PieceOutcome::Success);
    }
    if stop.load(Ordering::Relaxed) {
        return sink.finish(PieceOutcome::Stopped);
    }

    let req = build_request(
        &info,
        &headers,
        &plan,
        options.timeout,
        options.max_recv_speed,
        &options.user_agent,
    );
    tracing::debug!(
        id = %info.id,
        piece = sink.piece.index,
        from = plan.from,
        range = plan.range.as_deref().unwrap_or("-"),
        "piece request"
    );
    let result = http::execute_following(&req, &mut sink);
    let outcome = sink.outcome(result);
    let restarted = sink.restarted;
    let (piece, outcome) = sink.finish(outcome);
    tracing::debug!(
        id = %info.id,
        piece = piece.index,
        cur_bytes = piece.cur_bytes,
        restarted,
        outcome = ?outcome,
        "piece attempt finished"
    );
    (piece, outcome)
}
