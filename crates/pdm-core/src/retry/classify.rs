//! Map curl errors and HTTP statuses onto status codes.

use crate::http::HttpError;
use crate::status::StatusCode;

/// Status for a final HTTP status the transfer could not use.
pub fn classify_http_status(code: u32) -> StatusCode {
    StatusCode::from_http(code)
}

/// Status for a curl transport failure.
pub fn classify_curl_error(e: &curl::Error) -> StatusCode {
    if e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        return StatusCode::CannotResolveHost;
    }
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_ssl_connect_error()
    {
        return StatusCode::ConnectionError;
    }
    if e.is_partial_file() || e.is_bad_content_encoding() {
        return StatusCode::HttpDataError;
    }
    if e.is_url_malformed() || e.is_unsupported_protocol() {
        return StatusCode::HttpError(400);
    }
    if e.is_too_many_redirects() {
        return StatusCode::TooManyRedirects;
    }
    if e.is_write_error() {
        return StatusCode::FileError;
    }
    StatusCode::UnknownError
}

/// Status for any `HttpError`.
pub fn classify_http_error(e: &HttpError) -> StatusCode {
    match e {
        HttpError::MalformedUrl(_) => StatusCode::HttpError(400),
        HttpError::Io(ce) => classify_curl_error(ce),
        HttpError::TooManyRedirects => StatusCode::TooManyRedirects,
        // Requested stops never reach here; the connection ended without a response.
        HttpError::Aborted => StatusCode::ConnectionError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrequested_abort_is_retryable() {
        let status = classify_http_error(&HttpError::Aborted);
        assert_eq!(status, StatusCode::ConnectionError);
        assert!(status.is_retryable_failure());
    }

    #[test]
    fn http_statuses() {
        assert_eq!(classify_http_status(503), StatusCode::HttpError(503));
        assert!(classify_http_status(503).is_retryable_failure());
        assert!(classify_http_status(429).is_retryable_failure());
        assert!(!classify_http_status(404).is_retryable_failure());
        assert_eq!(classify_http_status(302), StatusCode::UnhandledHttpCode);
    }

    #[test]
    fn curl_errors() {
        // CURLE_COULDNT_RESOLVE_HOST = 6, CURLE_OPERATION_TIMEDOUT = 28,
        // CURLE_PARTIAL_FILE = 18, CURLE_URL_MALFORMAT = 3.
        assert_eq!(
            classify_curl_error(&curl::Error::new(6)),
            StatusCode::CannotResolveHost
        );
        assert_eq!(
            classify_curl_error(&curl::Error::new(28)),
            StatusCode::ConnectionError
        );
        assert_eq!(
            classify_curl_error(&curl::Error::new(18)),
            StatusCode::HttpDataError
        );
        assert_eq!(
            classify_curl_error(&curl::Error::new(3)),
            StatusCode::HttpError(400)
        );
    }

    #[test]
    fn http_error_variants() {
        assert_eq!(
            classify_http_error(&HttpError::TooManyRedirects),
            StatusCode::TooManyRedirects
        );
        assert!(!classify_http_error(&HttpError::MalformedUrl("x".into())).is_retryable_failure());
    }
}
