use crate::retry::TransportError;
use crate::transport::{fetch_text, TransportOptions};

use super::WorkerSession;

/// Page that tells whether the request arrived through Tor.
pub const TOR_CHECK_URL: &str = "https://check.torproject.org";

const SUCCESS_BANNER: &str = "Congratulations. This browser is configured to use Tor.";

/// True if `body` is the check page's success variant.
pub fn is_tor_confirmed(body: &str) -> bool {
    body.contains(SUCCESS_BANNER)
}

/// Fetch [`TOR_CHECK_URL`] through `session` and report whether Tor is in use.
pub fn check_tor(session: &WorkerSession, opts: &TransportOptions) -> Result<bool, TransportError> {
    let body = fetch_text(session, TOR_CHECK_URL, opts)?;
    let ok = is_tor_confirmed(&body);
    tracing::debug!(session_id = session.id(), ok, "tor check");
    Ok(ok)
}
