//! Request construction for one piece attempt.

use std::time::Duration;

use crate::http::Request;
use crate::planner::range_header_value;
use crate::store::{DownloadInfo, DownloadPiece, Header};

/// Header names that the worker owns; stored overrides with these names are ignored.
const RESERVED: [&str; 4] = ["range", "if-range", "etag", "accept-encoding"];

/// What the piece asks the server for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PiecePlan {
    /// Absolute offset where the piece starts.
    pub start: i64,
    /// Offset the transfer resumes from.
    pub from: i64,
    /// One past the last byte, when the size is known.
    pub end_exclusive: Option<i64>,
    /// `Range` header value, if the request is ranged.
    pub range: Option<String>,
    /// Progress made by an earlier attempt is being reused.
    pub resuming: bool,
}

impl PiecePlan {
    pub(crate) fn new(info: &DownloadInfo, piece: &DownloadPiece) -> Self {
        let start = info.piece_start_pos(piece.index);
        let end_exclusive = (piece.size >= 0).then(|| start + piece.size);
        let cur = piece.cur_bytes.max(start);
        let resuming = cur > start;

        if !info.partial_support {
            // No ranges: the whole resource from offset 0, streamed to EOF.
            return Self {
                start,
                from: start,
                end_exclusive: None,
                range: None,
                resuming: false,
            };
        }
        let range = match end_exclusive {
            Some(end) => Some(range_header_value(cur, end - 1)),
            None if resuming => Some(range_header_value(cur, -1)),
            None => None,
        };
        Self {
            start,
            from: cur,
            end_exclusive,
            range,
            resuming,
        }
    }

    /// Nothing left to fetch.
    pub(crate) fn is_complete(&self) -> bool {
        matches!(self.end_exclusive, Some(end) if self.from >= end)
    }
}

/// Validator for `If-Range`: a strong ETag, else the `Last-Modified` date.
pub(crate) fn if_range_value(headers: &[Header], last_modify: i64) -> Option<String> {
    let etag = headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("etag"))
        .map(|h| h.value.trim())
        .filter(|v| !v.is_empty() && !v.starts_with("W/"));
    if let Some(tag) = etag {
        return Some(tag.to_string());
    }
    if last_modify > 0 {
        return chrono::DateTime::from_timestamp_millis(last_modify)
            .map(|d| d.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
    }
    None
}

pub(crate) fn build_request(
    info: &DownloadInfo,
    headers: &[Header],
    plan: &PiecePlan,
    timeout: Duration,
    max_recv_speed: Option<u64>,
    default_user_agent: &str,
) -> Request {
    let mut req = Request::get(&info.url, timeout);
    req.max_recv_speed = max_recv_speed;
    let mut has_user_agent = false;
    for h in headers {
        let lower = h.name.to_ascii_lowercase();
        if RESERVED.contains(&lower.as_str()) {
            continue;
        }
        has_user_agent |= lower == "user-agent";
        req.headers.push((h.name.clone(), h.value.clone()));
    }
    if !has_user_agent {
        let ua = info.user_agent.as_deref().unwrap_or(default_user_agent);
        req.headers.push(("User-Agent".into(), ua.into()));
    }
    if let Some(range) = &plan.range {
        req.headers.push(("Range".into(), range.clone()));
        if plan.resuming {
            if let Some(validator) = if_range_value(headers, info.last_modify) {
                req.headers.push(("If-Range".into(), validator));
            }
        }
    }
    req
}
