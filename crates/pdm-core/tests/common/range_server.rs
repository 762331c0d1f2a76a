//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a single static body on any path. HEAD answers with the length and
//! validators; GET honours `Range: bytes=X-Y` with 206 unless ranges are
//! switched off. Counters let tests see what the client actually asked for.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const CHUNK: usize = 16 * 1024;
pub const ETAG: &str = "\"v1\"";

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Send `Accept-Ranges: bytes` on HEAD and GET responses.
    pub advertise_ranges: bool,
    /// Pause between body chunks, to keep transfers in flight.
    pub chunk_delay: Option<Duration>,
    /// Answer the first N GET requests with `503` and `Retry-After: 0`.
    pub fail_first: u32,
    /// `Content-Length` announced on HEAD instead of the real body length.
    pub head_length: Option<u64>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            chunk_delay: None,
            fail_first: 0,
            head_length: None,
        }
    }
}

#[derive(Default)]
struct Counters {
    gets: AtomicU32,
    served: AtomicU64,
    ranges: Mutex<Vec<(u64, u64)>>,
}

/// Handle to a running server. The server lives until the process exits.
#[derive(Clone)]
pub struct RangeServer {
    pub url: String,
    counters: Arc<Counters>,
}

impl RangeServer {
    /// URL of a file called `name` on this server.
    pub fn file_url(&self, name: &str) -> String {
        format!("{}{}", self.url, name)
    }

    /// Body bytes written to sockets so far.
    pub fn served_bytes(&self) -> u64 {
        self.counters.served.load(Ordering::SeqCst)
    }

    /// Number of GET requests received.
    pub fn gets(&self) -> u32 {
        self.counters.gets.load(Ordering::SeqCst)
    }

    /// `(start, end_inclusive)` of every ranged GET, in arrival order.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.counters.ranges.lock().unwrap().clone()
    }
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let counters = Arc::new(Counters::default());
    let shared = Arc::clone(&counters);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let counters = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &body, opts, &counters));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/", port),
        counters,
    }
}

fn handle(mut stream: std::net::TcpStream, body: &[u8], opts: RangeServerOptions, counters: &Counters) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;
    let accept_ranges = if opts.advertise_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
            return;
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nETag: {}\r\n{}\r\n",
            opts.head_length.unwrap_or(total),
            ETAG,
            accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let nth = counters.gets.fetch_add(1, Ordering::SeqCst);
    if nth < opts.fail_first {
        let _ = stream.write_all(
            b"HTTP/1.1 503 Service Unavailable\r\nRetry-After: 0\r\nContent-Length: 0\r\n\r\n",
        );
        return;
    }

    let (status, content_range, slice) = match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            counters.ranges.lock().unwrap().push((start, end_incl));
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start >= total || start > end_incl {
                ("416 Range Not Satisfiable", format!("bytes */{}", total), &body[0..0])
            } else {
                let slice = &body[start as usize..=end_incl as usize];
                (
                    "206 Partial Content",
                    format!("bytes {}-{}/{}", start, end_incl, total),
                    slice,
                )
            }
        }
        None => ("200 OK", String::new(), body),
    };
    let content_range = if content_range.is_empty() {
        String::new()
    } else {
        format!("Content-Range: {}\r\n", content_range)
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nETag: {}\r\n{}{}\r\n",
        status,
        slice.len(),
        ETAG,
        content_range,
        accept_ranges
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    for chunk in slice.chunks(CHUNK) {
        if stream.write_all(chunk).is_err() {
            return;
        }
        counters.served.fetch_add(chunk.len() as u64, Ordering::SeqCst);
        if let Some(delay) = opts.chunk_delay {
            thread::sleep(delay);
        }
    }
}

/// Returns (method, optional (start, end_inclusive) for Range: bytes=X-Y).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if !name.trim().eq_ignore_ascii_case("range") {
                continue;
            }
            let value = value.trim();
            if let Some(spec) = value.strip_prefix("bytes=") {
                if let Some((a, b)) = spec.split_once('-') {
                    let start = a.trim().parse::<u64>().unwrap_or(0);
                    let end = b.trim();
                    let end_incl = if end.is_empty() {
                        u64::MAX
                    } else {
                        end.parse::<u64>().unwrap_or(0)
                    };
                    range = Some((start, end_incl));
                }
            }
        }
    }
    (method, range)
}
