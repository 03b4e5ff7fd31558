//! HEAD probe without redirect following.

use super::parse::{HeaderCollector, ResponseHead};
use super::{new_easy, TransportOptions};
use crate::retry::TransportError;
use crate::session::WorkerSession;

/// Performs a HEAD request and returns the parsed head of the first response.
///
/// Redirects are not followed, so a `Location` header is visible to the caller.
pub fn head(
    session: &WorkerSession,
    url: &str,
    opts: &TransportOptions,
) -> Result<ResponseHead, TransportError> {
    let mut collector = HeaderCollector::new();

    let mut easy = new_easy(session, url, opts)?;
    easy.nobody(true)?;
    easy.follow_location(false)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            collector.push_line(data);
            true
        })?;
        transfer.perform()?;
    }

    let mut head = collector.into_head();
    if head.status == 0 {
        head.status = easy.response_code()?;
    }
    Ok(head)
}
