//! Download error types.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Failure of the HTTP exchange itself: curl could not complete the request,
/// or the server's answer is worth another try on a new circuit.
#[derive(Debug)]
pub enum TransportError {
    /// Curl reported an error (timeout, connection reset, short body, etc.).
    Curl(curl::Error),
    /// HTTP response had a retryable non-2xx status.
    Http(u32),
    /// A 206 answered a different range than the one requested.
    UnexpectedRange { requested: u64, served: u64 },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Curl(e) => write!(f, "{}", e),
            TransportError::Http(code) => write!(f, "HTTP {}", code),
            TransportError::UnexpectedRange { requested, served } => write!(
                f,
                "asked for range from {}, server sent from {}",
                requested, served
            ),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Curl(e) => Some(e),
            TransportError::Http(_) | TransportError::UnexpectedRange { .. } => None,
        }
    }
}

impl From<curl::Error> for TransportError {
    fn from(e: curl::Error) -> Self {
        TransportError::Curl(e)
    }
}

/// Everything that can end or interrupt a download attempt.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Destination directory is unusable (a regular file, or cannot be created).
    #[error("invalid target {}: {reason}", .path.display())]
    InvalidTarget { path: PathBuf, reason: String },

    /// Malformed URL, 404, missing Content-Length or another permanent HTTP answer.
    #[error("bad link {url}: {reason}")]
    Link { url: String, reason: String },

    /// The session provider could not hand out a working proxy session.
    #[error("proxy unavailable: {0}")]
    ProxyUnavailable(String),

    /// Connection, timeout, short body or retryable status.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// On-disk size after streaming differs from what the attempt requested.
    #[error("size mismatch: expected {expected} bytes on disk, found {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Writing the destination failed (disk full, permissions). Not retried.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Retry budget used up; `last` is the error of the final attempt.
    #[error("retries exceeded after {attempts} attempt(s): {last}")]
    RetriesExceeded {
        attempts: u32,
        last: Box<DownloadError>,
    },

    /// Stopped by a cancellation request; partial output is left resumable.
    #[error("interrupted")]
    Interrupted,
}

impl DownloadError {
    pub fn link(url: &str, reason: impl Into<String>) -> Self {
        DownloadError::Link {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable classification used in final results.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            DownloadError::InvalidTarget { .. } => FailureKind::InvalidTarget,
            DownloadError::Link { .. } => FailureKind::Link,
            DownloadError::ProxyUnavailable(_) => FailureKind::ProxyUnavailable,
            DownloadError::Transport(_) => FailureKind::TransientTransport,
            DownloadError::SizeMismatch { .. } => FailureKind::SizeMismatch,
            DownloadError::Storage(_) => FailureKind::Storage,
            DownloadError::RetriesExceeded { .. } => FailureKind::RetriesExceeded,
            DownloadError::Interrupted => FailureKind::Interrupted,
        }
    }
}

/// Failure reason reported per URL in the batch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidTarget,
    Link,
    ProxyUnavailable,
    TransientTransport,
    RetriesExceeded,
    SizeMismatch,
    Storage,
    Interrupted,
    /// A worker died (panic) and batch restarts were exhausted.
    Unexpected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::InvalidTarget => "invalid target",
            FailureKind::Link => "bad link",
            FailureKind::ProxyUnavailable => "proxy unavailable",
            FailureKind::TransientTransport => "transport error",
            FailureKind::RetriesExceeded => "retries exceeded",
            FailureKind::SizeMismatch => "size mismatch",
            FailureKind::Storage => "storage error",
            FailureKind::Interrupted => "interrupted",
            FailureKind::Unexpected => "unexpected error",
        };
        f.write_str(s)
    }
}
