//! Metadata probe: learn size, range support, type and validators before
//! committing to a piece plan.

use std::time::Duration;

use super::{execute_following, BodySink, HttpError, Request, ResponseHead};
use crate::store::UNKNOWN_SIZE;

/// Metadata learned about a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// URL after redirects.
    pub final_url: String,
    /// Total length, or `UNKNOWN_SIZE`.
    pub total_bytes: i64,
    /// Server honours byte ranges.
    pub partial_support: bool,
    pub mime_type: Option<String>,
    pub etag: Option<String>,
    /// `Last-Modified`, ms since the Unix epoch.
    pub last_modified: Option<i64>,
    pub content_disposition: Option<String>,
    pub content_location: Option<String>,
}

impl ProbeResult {
    fn from_head(final_url: String, head: &ResponseHead) -> Self {
        let (total_bytes, partial_support) = match (head.status, head.content_range()) {
            (206, Some(range)) => (range.total.unwrap_or(UNKNOWN_SIZE), true),
            _ => (
                head.content_length().unwrap_or(UNKNOWN_SIZE),
                head.accepts_ranges(),
            ),
        };
        Self {
            final_url,
            total_bytes,
            partial_support,
            mime_type: head.content_type(),
            etag: head.etag().map(str::to_string),
            last_modified: head.last_modified(),
            content_disposition: head.content_disposition().map(str::to_string),
            content_location: head.content_location().map(str::to_string),
        }
    }

    /// Safe local file name suggested by the response.
    pub fn file_name(&self) -> String {
        crate::url_model::derive_filename(
            &self.final_url,
            self.content_disposition.as_deref(),
            self.content_location.as_deref(),
        )
    }
}

/// Why a probe produced no metadata.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Http(#[from] HttpError),
    /// Final response was not 2xx.
    #[error("HTTP {status}")]
    Status { status: u32, retry_after: Option<Duration> },
}

/// Keeps the head, refuses the body.
struct HeadOnly;

impl BodySink for HeadOnly {
    fn on_head(&mut self, _head: &ResponseHead) -> bool {
        false
    }

    fn on_data(&mut self, _data: &[u8]) -> bool {
        false
    }
}

/// HEAD the resource; when the server rejects HEAD, GET `bytes=0-` and drop
/// the connection once the head arrives. Blocks.
pub fn probe(
    url: &str,
    headers: &[(String, String)],
    timeout: Duration,
) -> Result<ProbeResult, ProbeError> {
    let mut req = Request::head(url, timeout);
    req.headers = headers.to_vec();
    let head_err = match execute_following(&req, &mut HeadOnly) {
        Ok(resp) if resp.head.is_success() => {
            tracing::debug!(url, status = resp.head.status, "probe via HEAD");
            return Ok(ProbeResult::from_head(resp.url, &resp.head));
        }
        Ok(resp) => ProbeError::Status {
            status: resp.head.status,
            retry_after: resp.head.retry_after(),
        },
        Err(e) => return Err(e.into()),
    };
    tracing::debug!(url, error = %head_err, "HEAD rejected, probing with GET");

    let mut req = Request::get(url, timeout).header("Range", "bytes=0-");
    req.headers.extend(headers.iter().cloned());
    let resp = execute_following(&req, &mut HeadOnly)?;
    if !resp.head.is_success() {
        return Err(ProbeError::Status {
            status: resp.head.status,
            retry_after: resp.head.retry_after(),
        });
    }
    Ok(ProbeResult::from_head(resp.url, &resp.head))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(lines: &[&str]) -> ResponseHead {
        let lines: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
        ResponseHead::from_lines(&lines).unwrap()
    }

    #[test]
    fn from_full_response() {
        let h = head(&[
            "HTTP/1.1 200 OK",
            "Content-Length: 1259161",
            "Accept-Ranges: bytes",
            "Content-Type: application/zip",
            "ETag: \"v1\"",
            "Content-Disposition: attachment; filename=\"data.zip\"",
        ]);
        let r = ProbeResult::from_head("http://h/get?id=1".into(), &h);
        assert_eq!(r.total_bytes, 1_259_161);
        assert!(r.partial_support);
        assert_eq!(r.mime_type.as_deref(), Some("application/zip"));
        assert_eq!(r.etag.as_deref(), Some("\"v1\""));
        assert_eq!(r.file_name(), "data.zip");
    }

    #[test]
    fn from_partial_response() {
        let h = head(&["HTTP/1.1 206 Partial Content", "Content-Range: bytes 0-99/5000"]);
        let r = ProbeResult::from_head("http://h/f.bin".into(), &h);
        assert_eq!(r.total_bytes, 5000);
        assert!(r.partial_support);
        assert_eq!(r.file_name(), "f.bin");
    }

    #[test]
    fn unknown_length() {
        let h = head(&["HTTP/1.1 200 OK"]);
        let r = ProbeResult::from_head("http://h/f".into(), &h);
        assert_eq!(r.total_bytes, UNKNOWN_SIZE);
        assert!(!r.partial_support);
    }
}
