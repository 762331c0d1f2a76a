//! Status codes shared by downloads and pieces.
//!
//! Codes are persisted as integers. The numbering follows the HTTP-like
//! scheme used by platform download managers: 1xx in progress, 2xx success,
//! 4xx/5xx failures, with a handful of reserved values in the 48x/49x range
//! for engine-level failure reasons.

use std::fmt;

/// Closed set of download/piece states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Pending,
    Running,
    Paused,
    WaitingToRetry,
    WaitingForNetwork,
    Success,
    /// Stopped by the user without deleting the download.
    Stopped,
    CannotResolveHost,
    ConnectionError,
    HttpDataError,
    /// Final HTTP status the engine could not turn into data (e.g. 404, 503).
    HttpError(u16),
    FileError,
    InsufficientSpace,
    ChecksumMismatch,
    UnhandledHttpCode,
    TooManyRedirects,
    UnknownError,
}

const PENDING: i32 = 190;
const RUNNING: i32 = 192;
const PAUSED: i32 = 193;
const WAITING_TO_RETRY: i32 = 194;
const WAITING_FOR_NETWORK: i32 = 195;
const INSUFFICIENT_SPACE: i32 = 198;
const SUCCESS: i32 = 200;
const CHECKSUM_MISMATCH: i32 = 489;
const STOPPED: i32 = 490;
const UNKNOWN_ERROR: i32 = 491;
const FILE_ERROR: i32 = 492;
const CANNOT_RESOLVE_HOST: i32 = 493;
const UNHANDLED_HTTP_CODE: i32 = 494;
const HTTP_DATA_ERROR: i32 = 495;
const CONNECTION_ERROR: i32 = 496;
const TOO_MANY_REDIRECTS: i32 = 497;

impl StatusCode {
    /// Integer representation stored in the database.
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Pending => PENDING,
            StatusCode::Running => RUNNING,
            StatusCode::Paused => PAUSED,
            StatusCode::WaitingToRetry => WAITING_TO_RETRY,
            StatusCode::WaitingForNetwork => WAITING_FOR_NETWORK,
            StatusCode::Success => SUCCESS,
            StatusCode::Stopped => STOPPED,
            StatusCode::CannotResolveHost => CANNOT_RESOLVE_HOST,
            StatusCode::ConnectionError => CONNECTION_ERROR,
            StatusCode::HttpDataError => HTTP_DATA_ERROR,
            StatusCode::HttpError(code) => code as i32,
            StatusCode::FileError => FILE_ERROR,
            StatusCode::InsufficientSpace => INSUFFICIENT_SPACE,
            StatusCode::ChecksumMismatch => CHECKSUM_MISMATCH,
            StatusCode::UnhandledHttpCode => UNHANDLED_HTTP_CODE,
            StatusCode::TooManyRedirects => TOO_MANY_REDIRECTS,
            StatusCode::UnknownError => UNKNOWN_ERROR,
        }
    }

    /// Decode a stored integer. Unknown values map to `UnknownError`.
    pub fn from_code(code: i32) -> Self {
        match code {
            PENDING => StatusCode::Pending,
            RUNNING => StatusCode::Running,
            PAUSED => StatusCode::Paused,
            WAITING_TO_RETRY => StatusCode::WaitingToRetry,
            WAITING_FOR_NETWORK => StatusCode::WaitingForNetwork,
            INSUFFICIENT_SPACE => StatusCode::InsufficientSpace,
            SUCCESS => StatusCode::Success,
            CHECKSUM_MISMATCH => StatusCode::ChecksumMismatch,
            STOPPED => StatusCode::Stopped,
            UNKNOWN_ERROR => StatusCode::UnknownError,
            FILE_ERROR => StatusCode::FileError,
            CANNOT_RESOLVE_HOST => StatusCode::CannotResolveHost,
            UNHANDLED_HTTP_CODE => StatusCode::UnhandledHttpCode,
            HTTP_DATA_ERROR => StatusCode::HttpDataError,
            CONNECTION_ERROR => StatusCode::ConnectionError,
            TOO_MANY_REDIRECTS => StatusCode::TooManyRedirects,
            400..=599 => StatusCode::HttpError(code as u16),
            _ => StatusCode::UnknownError,
        }
    }

    /// Map a final HTTP status the transfer did not accept.
    pub fn from_http(code: u32) -> Self {
        match code {
            400..=599 => match StatusCode::from_code(code as i32) {
                // Reserved engine values collide with a few 4xx numbers; keep
                // the HTTP meaning for those.
                StatusCode::HttpError(c) => StatusCode::HttpError(c),
                _ => StatusCode::UnhandledHttpCode,
            },
            _ => StatusCode::UnhandledHttpCode,
        }
    }

    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            StatusCode::CannotResolveHost
                | StatusCode::ConnectionError
                | StatusCode::HttpDataError
                | StatusCode::HttpError(_)
                | StatusCode::FileError
                | StatusCode::InsufficientSpace
                | StatusCode::ChecksumMismatch
                | StatusCode::UnhandledHttpCode
                | StatusCode::TooManyRedirects
                | StatusCode::UnknownError
        )
    }

    /// Terminal: success, failure, or stopped by the user.
    pub fn is_completed(self) -> bool {
        self.is_success() || self.is_failure() || self == StatusCode::Stopped
    }

    /// Queued, running, paused or waiting; anything a list of active
    /// downloads should show.
    pub fn is_in_progress(self) -> bool {
        !self.is_completed()
    }

    /// Failures worth another attempt: transient network trouble, 5xx,
    /// throttling and range/data mismatches.
    pub fn is_retryable_failure(self) -> bool {
        match self {
            StatusCode::CannotResolveHost
            | StatusCode::ConnectionError
            | StatusCode::HttpDataError => true,
            StatusCode::HttpError(code) => code == 429 || (500..=599).contains(&code),
            _ => false,
        }
    }

    /// Short human-readable label.
    pub fn label(self) -> String {
        match self {
            StatusCode::Pending => "pending".into(),
            StatusCode::Running => "running".into(),
            StatusCode::Paused => "paused".into(),
            StatusCode::WaitingToRetry => "waiting to retry".into(),
            StatusCode::WaitingForNetwork => "waiting for network".into(),
            StatusCode::Success => "success".into(),
            StatusCode::Stopped => "stopped".into(),
            StatusCode::CannotResolveHost => "cannot resolve host".into(),
            StatusCode::ConnectionError => "connection error".into(),
            StatusCode::HttpDataError => "http data error".into(),
            StatusCode::HttpError(code) => format!("http error {}", code),
            StatusCode::FileError => "file error".into(),
            StatusCode::InsufficientSpace => "insufficient space".into(),
            StatusCode::ChecksumMismatch => "checksum mismatch".into(),
            StatusCode::UnhandledHttpCode => "unhandled http code".into(),
            StatusCode::TooManyRedirects => "too many redirects".into(),
            StatusCode::UnknownError => "unknown error".into(),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip_for_fixed_states() {
        let all = [
            StatusCode::Pending,
            StatusCode::Running,
            StatusCode::Paused,
            StatusCode::WaitingToRetry,
            StatusCode::WaitingForNetwork,
            StatusCode::Success,
            StatusCode::Stopped,
            StatusCode::CannotResolveHost,
            StatusCode::ConnectionError,
            StatusCode::HttpDataError,
            StatusCode::FileError,
            StatusCode::InsufficientSpace,
            StatusCode::ChecksumMismatch,
            StatusCode::UnhandledHttpCode,
            StatusCode::TooManyRedirects,
            StatusCode::UnknownError,
            StatusCode::HttpError(404),
            StatusCode::HttpError(503),
        ];
        for s in all {
            assert_eq!(StatusCode::from_code(s.code()), s, "{:?}", s);
        }
    }

    #[test]
    fn completed_vs_in_progress() {
        assert!(StatusCode::Success.is_completed());
        assert!(StatusCode::Stopped.is_completed());
        assert!(StatusCode::HttpError(404).is_completed());
        assert!(StatusCode::ChecksumMismatch.is_completed());
        assert!(StatusCode::Pending.is_in_progress());
        assert!(StatusCode::Running.is_in_progress());
        assert!(StatusCode::Paused.is_in_progress());
        assert!(StatusCode::WaitingForNetwork.is_in_progress());
        assert!(StatusCode::WaitingToRetry.is_in_progress());
    }

    #[test]
    fn retryable_classification() {
        assert!(StatusCode::ConnectionError.is_retryable_failure());
        assert!(StatusCode::HttpError(503).is_retryable_failure());
        assert!(StatusCode::HttpError(429).is_retryable_failure());
        assert!(!StatusCode::HttpError(404).is_retryable_failure());
        assert!(!StatusCode::ChecksumMismatch.is_retryable_failure());
        assert!(!StatusCode::InsufficientSpace.is_retryable_failure());
        assert!(!StatusCode::Stopped.is_retryable_failure());
    }

    #[test]
    fn reserved_http_numbers_map_to_unhandled() {
        assert_eq!(StatusCode::from_http(404), StatusCode::HttpError(404));
        assert_eq!(StatusCode::from_http(495), StatusCode::UnhandledHttpCode);
        assert_eq!(StatusCode::from_http(302), StatusCode::UnhandledHttpCode);
    }
}
