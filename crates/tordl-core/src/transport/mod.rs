//! HTTP over libcurl through a [`WorkerSession`].
//!
//! `head` probes a URL without following redirects (filename discovery),
//! `get` streams a (possibly ranged) body into a [`BodyHandler`], and
//! `fetch_text` reads a small page into memory (link scraping, Tor check).
//! Everything runs on the calling thread.

mod get;
mod head;
mod parse;

pub use get::{fetch_text, stream_get, BodyFlow, BodyHandler, GetOutcome};
pub use head::head;
pub use parse::{content_range_start, HeaderCollector, ResponseHead};

use std::time::Duration;

use crate::session::WorkerSession;

/// Per-request knobs shared by every attempt of an engine.
#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    /// Abort when no byte arrives for this long.
    pub low_speed_time: Duration,
    /// Skip certificate and host name verification.
    pub accept_invalid_certs: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(60),
            low_speed_time: Duration::from_secs(120),
            accept_invalid_certs: true,
        }
    }
}

/// Fresh easy handle for `url`, bound to the session's proxy.
pub(crate) fn new_easy(
    session: &WorkerSession,
    url: &str,
    opts: &TransportOptions,
) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    if let Some(proxy) = session.proxy() {
        easy.proxy(proxy)?;
    }
    easy.connect_timeout(opts.connect_timeout)?;
    // Tor links stall rather than fail; a stall longer than this is treated as a timeout.
    easy.low_speed_limit(1)?;
    easy.low_speed_time(opts.low_speed_time)?;
    if opts.accept_invalid_certs {
        easy.ssl_verify_peer(false)?;
        easy.ssl_verify_host(false)?;
    }
    Ok(easy)
}
