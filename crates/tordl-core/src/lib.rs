pub mod config;
pub mod logging;

// Engine, leaves first.
pub mod control;
pub mod coordinator;
pub mod downloader;
pub mod events;
pub mod job;
pub mod links;
pub mod planner;
pub mod retry;
pub mod session;
pub mod storage;
pub mod transport;
pub mod url_model;

pub use coordinator::{BatchReport, Coordinator};
pub use downloader::FileDownloader;
pub use job::{DownloadJob, DownloadResult, EngineConfig};
