//! Easy2 handler: splits the header stream into responses, reports redirects
//! and forwards the final response to a `BodySink`.

use std::str;

use super::head::{parse_status_line, ResponseHead};
use super::BodySink;

/// Per-request curl handler state.
pub(super) struct Collector<'a, S> {
    sink: &'a mut S,
    lines: Vec<String>,
    /// Head of the final (non-1xx, non-redirect) response.
    pub(super) head: Option<ResponseHead>,
    /// `(status, Location)` when the response was a redirect.
    pub(super) redirect: Option<(u32, String)>,
    /// Set when the sink refused the head, the data or asked to stop.
    pub(super) aborted: bool,
}

impl<'a, S: BodySink> Collector<'a, S> {
    pub(super) fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            lines: Vec::new(),
            head: None,
            redirect: None,
            aborted: false,
        }
    }

    fn finish_head(&mut self) -> bool {
        let Some(head) = ResponseHead::from_lines(&self.lines) else {
            return true;
        };
        self.lines.clear();
        if (100..200).contains(&head.status) {
            return true;
        }
        if head.is_redirect() {
            if let Some(location) = head.location() {
                self.redirect = Some((head.status, location.to_string()));
                return true;
            }
        }
        let accepted = self.sink.on_head(&head);
        self.head = Some(head);
        if !accepted {
            self.aborted = true;
        }
        accepted
    }
}

impl<S: BodySink> curl::easy::Handler for Collector<'_, S> {
    fn header(&mut self, data: &[u8]) -> bool {
        let Ok(s) = str::from_utf8(data) else {
            return true;
        };
        let line = s.trim_end();
        if line.is_empty() {
            return self.finish_head();
        }
        if parse_status_line(line).is_some() {
            self.lines.clear();
        }
        self.lines.push(line.to_string());
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        // Redirect bodies and anything before the final head are dropped.
        if self.redirect.is_some() || self.head.is_none() {
            return Ok(data.len());
        }
        if self.sink.on_data(data) {
            Ok(data.len())
        } else {
            self.aborted = true;
            Ok(0)
        }
    }

    fn progress(&mut self, _dltotal: f64, _dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        let stop = self.sink.should_stop();
        if stop {
            self.aborted = true;
        }
        !stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curl::easy::Handler;

    #[derive(Default)]
    struct Recorder {
        heads: Vec<u32>,
        body: Vec<u8>,
        refuse_body: bool,
    }

    impl BodySink for Recorder {
        fn on_head(&mut self, head: &ResponseHead) -> bool {
            self.heads.push(head.status);
            true
        }

        fn on_data(&mut self, data: &[u8]) -> bool {
            if self.refuse_body {
                return false;
            }
            self.body.extend_from_slice(data);
            true
        }
    }

    #[test]
    fn skips_informational_responses() {
        let mut rec = Recorder::default();
        let mut c = Collector::new(&mut rec);
        c.header(b"HTTP/1.1 100 Continue\r\n");
        c.header(b"\r\n");
        assert!(c.head.is_none());
        c.header(b"HTTP/1.1 206 Partial Content\r\n");
        c.header(b"Content-Range: bytes 0-3/10\r\n");
        c.header(b"\r\n");
        assert_eq!(c.head.as_ref().map(|h| h.status), Some(206));
        assert_eq!(c.write(b"abcd").unwrap(), 4);
        assert_eq!(rec.heads, vec![206]);
        assert_eq!(rec.body, b"abcd");
    }

    #[test]
    fn redirect_is_reported_not_forwarded() {
        let mut rec = Recorder::default();
        let mut c = Collector::new(&mut rec);
        c.header(b"HTTP/1.1 302 Found\r\n");
        c.header(b"Location: /elsewhere\r\n");
        c.header(b"\r\n");
        assert_eq!(c.write(b"moved").unwrap(), 5);
        assert_eq!(c.redirect, Some((302, "/elsewhere".to_string())));
        assert!(c.head.is_none());
        assert!(rec.heads.is_empty());
    }

    #[test]
    fn refused_body_aborts() {
        let mut rec = Recorder {
            refuse_body: true,
            ..Default::default()
        };
        let mut c = Collector::new(&mut rec);
        c.header(b"HTTP/1.1 200 OK\r\n");
        c.header(b"\r\n");
        assert_eq!(c.write(b"data").unwrap(), 0);
        assert!(c.aborted);
    }
}
