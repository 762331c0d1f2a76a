//! Parsed response head and typed accessors for the headers the engine uses.

use std::time::Duration;

/// Status line plus header fields of the final response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u32,
    /// Header fields in arrival order; names as sent by the server.
    pub headers: Vec<(String, String)>,
}

/// Parsed `Content-Range: bytes start-end/total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: i64,
    /// Inclusive.
    pub end: i64,
    /// `None` for `*`.
    pub total: Option<i64>,
}

impl ResponseHead {
    /// Build from raw header lines of one response (status line first).
    pub fn from_lines(lines: &[String]) -> Option<Self> {
        let status = lines.first().and_then(|l| parse_status_line(l))?;
        let headers = lines[1..]
            .iter()
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();
        Some(Self { status, headers })
    }

    /// First value of `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    pub fn content_length(&self) -> Option<i64> {
        self.header("content-length")?.parse::<i64>().ok().filter(|n| *n >= 0)
    }

    /// True when the server sent `Accept-Ranges: bytes`.
    pub fn accepts_ranges(&self) -> bool {
        self.header("accept-ranges")
            .map(|v| v.split(',').any(|u| u.trim().eq_ignore_ascii_case("bytes")))
            .unwrap_or(false)
    }

    pub fn content_range(&self) -> Option<ContentRange> {
        parse_content_range(self.header("content-range")?)
    }

    pub fn content_disposition(&self) -> Option<&str> {
        self.header("content-disposition")
    }

    pub fn content_location(&self) -> Option<&str> {
        self.header("content-location")
    }

    /// MIME type without parameters, lowercased.
    pub fn content_type(&self) -> Option<String> {
        let raw = self.header("content-type")?;
        let mime = raw.split(';').next().unwrap_or("").trim();
        if mime.is_empty() {
            None
        } else {
            Some(mime.to_ascii_lowercase())
        }
    }

    /// Entity tag exactly as sent (quotes kept, usable for `If-Range`).
    pub fn etag(&self) -> Option<&str> {
        self.header("etag").filter(|v| !v.is_empty())
    }

    /// `Last-Modified` as milliseconds since the Unix epoch.
    pub fn last_modified(&self) -> Option<i64> {
        parse_http_date(self.header("last-modified")?)
    }

    /// `Retry-After` as a delay from now (delta seconds or an HTTP date).
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(self.header("retry-after")?, chrono::Utc::now().timestamp_millis())
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }
}

/// Status code from `HTTP/1.1 206 Partial Content` or `HTTP/2 200`.
pub fn parse_status_line(line: &str) -> Option<u32> {
    let line = line.trim();
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Parse `bytes start-end/total` (total may be `*`).
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.trim().split_once('-')?;
    let start: i64 = start.trim().parse().ok()?;
    let end: i64 = end.trim().parse().ok()?;
    if end < start {
        return None;
    }
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };
    Some(ContentRange { start, end, total })
}

/// RFC 7231 IMF-fixdate (and RFC 2822 variants) to Unix milliseconds.
pub fn parse_http_date(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.timestamp_millis())
}

pub(crate) fn parse_retry_after(value: &str, now_ms: i64) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = parse_http_date(value)?;
    Some(Duration::from_millis((at - now_ms).max(0) as u64))
}
