//! Failure classification and retry delay policy.
//!
//! Piece workers are single-attempt; this module maps their transport and
//! HTTP failures onto status codes and tells the engine how long to wait
//! before the next automatic attempt.

mod classify;
mod policy;

pub use classify::{classify_curl_error, classify_http_error, classify_http_status};
pub use policy::RetryPolicy;
