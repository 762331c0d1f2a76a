//! HTTP connection: one request per call over libcurl.
//!
//! `execute` performs exactly one request and reports either the final
//! response head (the body having been streamed into a `BodySink`) or a
//! redirect for the caller to follow. `execute_following` follows up to
//! `MAX_REDIRECTS` hops. Both block; call them from `spawn_blocking` in
//! async code.

mod handler;
mod head;
mod probe;

use std::time::Duration;

use curl::easy::{Easy2, List};

use handler::Collector;
pub use head::{parse_content_range, parse_http_date, ContentRange, ResponseHead};
pub use probe::{probe, ProbeError, ProbeResult};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// One outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub method: Method,
    /// Extra header fields (User-Agent, Range, If-Range...).
    pub headers: Vec<(String, String)>,
    /// Connect timeout, and the longest stretch without any received data.
    pub timeout: Duration,
    /// Receive rate cap in bytes per second.
    pub max_recv_speed: Option<u64>,
}

impl Request {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: Vec::new(),
            timeout,
            max_recv_speed: None,
        }
    }

    pub fn head(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Head,
            ..Self::get(url, timeout)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// Receives the final response of a request.
pub trait BodySink {
    /// Head of the final response. Returning `false` aborts before the body.
    fn on_head(&mut self, head: &ResponseHead) -> bool;

    /// A chunk of the body. Returning `false` aborts the transfer.
    fn on_data(&mut self, data: &[u8]) -> bool;

    /// Polled while the transfer runs; `true` aborts it.
    fn should_stop(&self) -> bool {
        false
    }
}

/// Sink that discards the body.
#[derive(Debug, Default)]
pub struct Discard;

impl BodySink for Discard {
    fn on_head(&mut self, _head: &ResponseHead) -> bool {
        true
    }

    fn on_data(&mut self, _data: &[u8]) -> bool {
        true
    }
}

/// Result of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    /// Final response; the body (if any) went to the sink.
    Complete(ResponseHead),
    /// 3xx with a `Location`, not followed.
    Redirect { status: u32, location: String },
}

/// Final response after following redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL that produced the final response.
    pub url: String,
    pub head: ResponseHead,
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("malformed url: {0}")]
    MalformedUrl(String),
    #[error("{0}")]
    Io(#[from] curl::Error),
    #[error("too many redirects")]
    TooManyRedirects,
    /// The sink asked to stop before a final response arrived.
    #[error("transfer aborted")]
    Aborted,
}

/// Parse `url` and require an http(s) scheme with a host.
pub fn validate_url(url: &str) -> Result<url::Url, HttpError> {
    let parsed = url::Url::parse(url).map_err(|_| HttpError::MalformedUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(HttpError::MalformedUrl(url.to_string())),
    }
}

fn configure<S: BodySink>(easy: &mut Easy2<Collector<S>>, req: &Request) -> Result<(), curl::Error> {
    easy.url(&req.url)?;
    match req.method {
        Method::Get => easy.get(true)?,
        Method::Head => easy.nobody(true)?,
    }
    easy.follow_location(false)?;
    easy.progress(true)?;
    easy.connect_timeout(req.timeout)?;
    // Read timeout: abort when nothing arrives for `timeout`.
    easy.low_speed_limit(1)?;
    easy.low_speed_time(req.timeout)?;
    if let Some(speed) = req.max_recv_speed {
        easy.max_recv_speed(speed)?;
    }
    let mut list = List::new();
    for (name, value) in &req.headers {
        list.append(&format!("{}: {}", name.trim(), value.trim()))?;
    }
    if !req.has_header("accept-encoding") {
        // Byte offsets must refer to the stored representation.
        list.append("Accept-Encoding: identity")?;
    }
    easy.http_headers(list)?;
    Ok(())
}

/// Perform one request, streaming the final response body into `sink`.
///
/// When the sink refuses data or asks to stop after the final head arrived,
/// the outcome is still `Complete`; only the sink knows how much it took.
pub fn execute<S: BodySink>(req: &Request, sink: &mut S) -> Result<HttpOutcome, HttpError> {
    validate_url(&req.url)?;
    let mut easy = Easy2::new(Collector::new(sink));
    let performed = configure(&mut easy, req).and_then(|_| easy.perform());

    let collector = easy.get_mut();
    match performed {
        // The sink cut the transfer short on purpose and knows why.
        Err(_) if collector.aborted => match collector.head.take() {
            Some(head) => Ok(HttpOutcome::Complete(head)),
            None => Err(HttpError::Aborted),
        },
        Err(e) => Err(HttpError::Io(e)),
        Ok(()) => match (collector.redirect.take(), collector.head.take()) {
            (Some((status, location)), _) => Ok(HttpOutcome::Redirect { status, location }),
            (None, Some(head)) => Ok(HttpOutcome::Complete(head)),
            // Some servers send a bare status line with no header block.
            (None, None) => match easy.response_code() {
                Ok(code) if code > 0 => Ok(HttpOutcome::Complete(ResponseHead {
                    status: code,
                    headers: Vec::new(),
                })),
                Ok(_) => Err(HttpError::Aborted),
                Err(e) => Err(HttpError::Io(e)),
            },
        },
    }
}

/// Perform `req`, following redirects up to `MAX_REDIRECTS` hops.
/// Relative `Location` values resolve against the current URL.
pub fn execute_following<S: BodySink>(req: &Request, sink: &mut S) -> Result<Response, HttpError> {
    let mut current = req.clone();
    let mut hops = 0u32;
    loop {
        match execute(&current, sink)? {
            HttpOutcome::Complete(head) => {
                return Ok(Response {
                    url: current.url,
                    head,
                })
            }
            HttpOutcome::Redirect { status, location } => {
                hops += 1;
                if hops > MAX_REDIRECTS {
                    return Err(HttpError::TooManyRedirects);
                }
                let next = resolve_location(&current.url, &location)?;
                tracing::debug!(status, from = %current.url, to = %next, "following redirect");
                // 303 turns any method into GET.
                if status == 303 {
                    current.method = Method::Get;
                }
                current.url = next;
            }
        }
    }
}

fn resolve_location(base: &str, location: &str) -> Result<String, HttpError> {
    let base = url::Url::parse(base).map_err(|_| HttpError::MalformedUrl(base.to_string()))?;
    base.join(location.trim())
        .map(|u| u.to_string())
        .map_err(|_| HttpError::MalformedUrl(location.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_urls() {
        let t = Duration::from_secs(1);
        for bad in ["not a url", "ftp://example.com/x", "http://"] {
            let r = execute(&Request::get(bad, t), &mut Discard);
            assert!(matches!(r, Err(HttpError::MalformedUrl(_))), "{}", bad);
        }
    }

    #[test]
    fn resolves_relative_locations() {
        assert_eq!(
            resolve_location("http://h/a/b/c", "../d").unwrap(),
            "http://h/a/d"
        );
        assert_eq!(
            resolve_location("http://h/a", "https://o/x").unwrap(),
            "https://o/x"
        );
    }
}
