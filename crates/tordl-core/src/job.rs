//! Job, result, and engine configuration values shared by the downloader and
//! the coordinator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::config::TordlConfig;
use crate::retry::{FailureKind, RetryPolicy};
use crate::transport::TransportOptions;

/// One URL to fetch into a directory. A requeue produces a new value with
/// `requeues` incremented; the original is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub target_dir: PathBuf,
    /// Overrides the name derived from the URL or redirect.
    pub filename: Option<String>,
    pub chunk_size: usize,
    /// How often this URL was already handed back because the proxy was unavailable.
    pub requeues: u32,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, target_dir: impl AsRef<Path>, chunk_size: usize) -> Self {
        Self {
            url: url.into(),
            target_dir: target_dir.as_ref().to_path_buf(),
            filename: None,
            chunk_size,
            requeues: 0,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Same URL and target, one more requeue on the counter.
    pub fn requeued(&self) -> Self {
        Self {
            requeues: self.requeues + 1,
            ..self.clone()
        }
    }
}

/// Final outcome for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadResult {
    Completed { path: PathBuf },
    Failed {
        url: String,
        kind: FailureKind,
        detail: String,
    },
}

impl DownloadResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, DownloadResult::Completed { .. })
    }
}

/// Immutable settings for one engine run, resolved from [`TordlConfig`] and CLI overrides.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads (concurrent downloads).
    pub worker_limit: usize,
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    pub transport: TransportOptions,
    pub max_session_requeues: u32,
    pub max_batch_restarts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(&TordlConfig::default())
    }
}

impl EngineConfig {
    pub fn from_config(cfg: &TordlConfig) -> Self {
        Self {
            worker_limit: cfg.max_downloads.max(1),
            chunk_size: cfg.chunk_size.max(1),
            retry: cfg.retry_config().to_policy(),
            transport: TransportOptions {
                connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
                low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
                accept_invalid_certs: cfg.accept_invalid_certs,
            },
            max_session_requeues: cfg.max_session_requeues,
            max_batch_restarts: cfg.max_batch_restarts,
        }
    }

    /// A job for `url` into `target_dir` with this engine's chunk size.
    pub fn job(&self, url: impl Into<String>, target_dir: impl AsRef<Path>) -> DownloadJob {
        DownloadJob::new(url, target_dir, self.chunk_size)
    }
}
