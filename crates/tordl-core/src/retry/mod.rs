//! Error taxonomy, classification, and backoff policy.
//!
//! Every failure of a download attempt is a [`DownloadError`]. [`classify`]
//! maps it to an [`ErrorKind`] and [`RetryPolicy::decide`] turns the kind and
//! the attempt number into a retry decision, so the downloader and the
//! coordinator share one notion of what is transient.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::{DownloadError, FailureKind, TransportError};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
