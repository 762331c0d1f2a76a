pub mod config;
pub mod logging;

pub mod checksum;
pub mod engine;
pub mod files;
pub mod http;
pub mod planner;
pub mod retry;
pub mod status;
pub mod store;
pub mod system;
pub mod url_model;
pub mod worker;

pub use engine::{AddDownloadRequest, ChangeableParams, DownloadProgress, Engine, EngineError, EngineListener};
pub use status::StatusCode;
