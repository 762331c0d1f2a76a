//! Persistent download store (SQLite via sqlx).
//!
//! Holds downloads, their pieces and request headers. Pieces and headers
//! cascade-delete with their download. Every write publishes a `StoreEvent`
//! so observers can reload fresh rows.

pub mod db;
mod observe;
mod read;
pub mod types;
mod write;

#[cfg(test)]
mod tests;

pub use db::DownloadStore;
pub use observe::{AllInfoObserver, InfoObserver, StoreEvent};
pub use types::*;
