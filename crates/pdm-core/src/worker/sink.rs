//! Body sink that lands one piece's bytes at their file offsets and reports
//! coalesced, durable progress.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::request::PiecePlan;
use super::{PieceOutcome, StopToken};
use crate::files::{FileHandle, FilesError};
use crate::http::{BodySink, HttpError, Response, ResponseHead};
use crate::retry::{classify_http_error, classify_http_status};
use crate::status::StatusCode;
use crate::store::DownloadPiece;

/// Persist progress at least this often while bytes flow.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
/// ...or after this many bytes, whichever comes first.
pub const PROGRESS_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Failure {
    pub status: StatusCode,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl Failure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    fn file(e: &FilesError) -> Self {
        let status = if e.is_no_space() {
            StatusCode::InsufficientSpace
        } else {
            StatusCode::FileError
        };
        Self::new(status, e.to_string())
    }
}

pub(crate) struct PieceSink {
    file: Arc<dyn FileHandle>,
    pub(crate) piece: DownloadPiece,
    plan: PiecePlan,
    stop: StopToken,
    progress: mpsc::Sender<DownloadPiece>,
    /// Body bytes to drop before the piece starts (200 to a ranged request).
    skip: u64,
    /// One past the last byte this transfer must deliver, when known.
    expected_end: Option<i64>,
    pub(crate) failure: Option<Failure>,
    /// The server ignored the range and the piece restarted from its start.
    pub(crate) restarted: bool,
    last_tick: Instant,
    bytes_since_tick: u64,
}

impl PieceSink {
    pub(crate) fn new(
        file: Arc<dyn FileHandle>,
        piece: DownloadPiece,
        plan: PiecePlan,
        stop: StopToken,
        progress: mpsc::Sender<DownloadPiece>,
    ) -> Self {
        Self {
            file,
            piece,
            plan,
            stop,
            progress,
            skip: 0,
            expected_end: None,
            failure: None,
            restarted: false,
            last_tick: Instant::now(),
            bytes_since_tick: 0,
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn fail(&mut self, failure: Failure) -> bool {
        tracing::debug!(
            id = %self.piece.info_id,
            piece = self.piece.index,
            status = %failure.status,
            message = %failure.message,
            "piece transfer rejected"
        );
        self.failure = Some(failure);
        false
    }

    fn accept_partial(&mut self, head: &ResponseHead) -> bool {
        let Some(cr) = head.content_range() else {
            return self.fail(Failure::new(StatusCode::HttpDataError, "206 without Content-Range"));
        };
        let end_ok = self.plan.end_exclusive.map_or(true, |end| cr.end == end - 1);
        if cr.start != self.plan.from || !end_ok {
            return self.fail(Failure::new(
                StatusCode::HttpDataError,
                format!(
                    "Content-Range {}-{} does not match requested offset {}",
                    cr.start, cr.end, self.plan.from
                ),
            ));
        }
        self.expected_end = self.plan.end_exclusive.or(Some(cr.end + 1));
        true
    }

    fn accept_full(&mut self, head: &ResponseHead) -> bool {
        let start = self.plan.start;
        if self.plan.range.is_some() {
            // Range ignored: the body starts at file offset 0.
            tracing::info!(
                id = %self.piece.info_id,
                piece = self.piece.index,
                "server ignored Range, restarting piece"
            );
            self.restarted = true;
            self.skip = start as u64;
            if self.plan.end_exclusive.is_none() {
                if let Err(e) = self.file.truncate(0) {
                    return self.fail(Failure::file(&e));
                }
            }
        }
        self.piece.cur_bytes = start;
        self.expected_end = self
            .plan
            .end_exclusive
            .or_else(|| head.content_length().map(|len| start + len));
        true
    }

    /// Sync written data and hand a snapshot to the persistence loop.
    fn report(&mut self, force: bool) -> Result<(), FilesError> {
        let elapsed = self.last_tick.elapsed();
        if !force && elapsed < PROGRESS_INTERVAL && self.bytes_since_tick < PROGRESS_BYTES {
            return Ok(());
        }
        if self.bytes_since_tick > 0 {
            self.file.sync_data()?;
        }
        let secs = elapsed.as_secs_f64();
        self.piece.speed = if secs > 0.0 {
            (self.bytes_since_tick as f64 / secs) as u64
        } else {
            0
        };
        self.last_tick = Instant::now();
        self.bytes_since_tick = 0;
        // The loop only goes away when the engine gave up on this run.
        let _ = self.progress.blocking_send(self.piece.clone());
        Ok(())
    }

    /// Turn the transfer result into the piece outcome.
    pub(crate) fn outcome(&mut self, result: Result<Response, HttpError>) -> PieceOutcome {
        if let Some(f) = self.failure.take() {
            return PieceOutcome::Failed {
                status: f.status,
                message: f.message,
                retry_after: f.retry_after,
            };
        }
        let resp = match result {
            Ok(resp) => resp,
            Err(_) if self.stopped() => return PieceOutcome::Stopped,
            Err(e) => {
                return PieceOutcome::Failed {
                    status: classify_http_error(&e),
                    message: e.to_string(),
                    retry_after: None,
                }
            }
        };
        if !resp.head.is_success() {
            return PieceOutcome::Failed {
                status: classify_http_status(resp.head.status),
                message: format!("HTTP {}", resp.head.status),
                retry_after: resp.head.retry_after(),
            };
        }
        match self.expected_end {
            Some(end) if self.piece.cur_bytes == end => PieceOutcome::Success,
            _ if self.stopped() => PieceOutcome::Stopped,
            Some(end) => PieceOutcome::Failed {
                status: StatusCode::HttpDataError,
                message: format!(
                    "received {} of {} bytes",
                    self.piece.cur_bytes - self.plan.start,
                    end - self.plan.start
                ),
                retry_after: None,
            },
            None => PieceOutcome::Success,
        }
    }

    /// Apply the outcome to the piece row, make data durable and send the
    /// final snapshot.
    pub(crate) fn finish(mut self, mut outcome: PieceOutcome) -> (DownloadPiece, PieceOutcome) {
        if outcome == PieceOutcome::Success && self.plan.range.is_none() && self.plan.end_exclusive.is_none() {
            // Streamed to EOF: the piece is exactly what arrived.
            let len = self.piece.cur_bytes;
            if let Err(e) = self.file.truncate(len as u64) {
                outcome = failed(Failure::file(&e));
            }
            self.piece.size = len - self.plan.start;
        }
        if let Err(e) = self.file.sync_data() {
            if outcome == PieceOutcome::Success {
                outcome = failed(Failure::file(&e));
            }
        }
        match &outcome {
            PieceOutcome::Success => {
                self.piece.status_code = StatusCode::Success;
                self.piece.status_msg = None;
            }
            PieceOutcome::Stopped => {
                self.piece.status_code = StatusCode::Paused;
                self.piece.status_msg = None;
            }
            PieceOutcome::Failed { status, message, .. } => {
                self.piece.status_code = *status;
                self.piece.status_msg = Some(message.clone());
                self.piece.num_failed += 1;
            }
        }
        self.piece.speed = 0;
        let _ = self.progress.blocking_send(self.piece.clone());
        (self.piece, outcome)
    }
}

fn failed(f: Failure) -> PieceOutcome {
    PieceOutcome::Failed {
        status: f.status,
        message: f.message,
        retry_after: f.retry_after,
    }
}

impl BodySink for PieceSink {
    fn on_head(&mut self, head: &ResponseHead) -> bool {
        if !head.is_success() {
            let mut f = Failure::new(classify_http_status(head.status), format!("HTTP {}", head.status));
            f.retry_after = head.retry_after();
            return self.fail(f);
        }
        match head.status {
            206 if self.plan.range.is_some() => self.accept_partial(head),
            200 => self.accept_full(head),
            other => self.fail(Failure::new(
                StatusCode::UnhandledHttpCode,
                format!("unexpected HTTP {}", other),
            )),
        }
    }

    fn on_data(&mut self, data: &[u8]) -> bool {
        if self.stopped() {
            return false;
        }
        let mut data = data;
        if self.skip > 0 {
            let n = (self.skip as usize).min(data.len());
            self.skip -= n as u64;
            data = &data[n..];
            if data.is_empty() {
                return true;
            }
        }
        let mut overflow = false;
        if let Some(end) = self.expected_end {
            let remaining = (end - self.piece.cur_bytes).max(0) as usize;
            if remaining == 0 {
                return false;
            }
            if data.len() > remaining {
                data = &data[..remaining];
                overflow = true;
            }
        }
        if let Err(e) = self.file.write_at(self.piece.cur_bytes as u64, data) {
            return self.fail(Failure::file(&e));
        }
        self.piece.cur_bytes += data.len() as i64;
        self.bytes_since_tick += data.len() as u64;
        if let Err(e) = self.report(false) {
            return self.fail(Failure::file(&e));
        }
        // Everything the piece needs has arrived; drop the rest.
        !overflow
    }

    fn should_stop(&self) -> bool {
        self.stopped()
    }
}
