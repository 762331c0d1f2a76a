//! Fold piece results into one download verdict.

use super::registry::StopReason;
use crate::status::StatusCode;
use crate::store::DownloadPiece;

/// Download-level result of one run, before retry policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Success,
    /// A piece failed in a way another attempt cannot fix.
    Failed { status: StatusCode, message: Option<String> },
    /// A piece failed transiently; retry policy decides what happens next.
    Retryable { status: StatusCode, message: Option<String> },
    Paused,
    Stopped,
}

/// Pure and idempotent: the same pieces always give the same verdict.
///
/// A permanent failure wins over a retryable one, and any failure wins over
/// pieces that were merely interrupted.
pub(crate) fn aggregate(pieces: &[DownloadPiece], stop: Option<StopReason>) -> Verdict {
    if !pieces.is_empty() && pieces.iter().all(|p| p.status_code.is_success()) {
        return Verdict::Success;
    }
    let failed = |retryable: bool| {
        pieces
            .iter()
            .find(|p| p.status_code.is_failure() && p.status_code.is_retryable_failure() == retryable)
    };
    if let Some(p) = failed(false) {
        return Verdict::Failed {
            status: p.status_code,
            message: p.status_msg.clone(),
        };
    }
    if let Some(p) = failed(true) {
        return Verdict::Retryable {
            status: p.status_code,
            message: p.status_msg.clone(),
        };
    }
    match stop {
        Some(StopReason::Stop) => Verdict::Stopped,
        _ => Verdict::Paused,
    }
}
