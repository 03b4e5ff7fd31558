use crate::retry::DownloadError;
use crate::session::WorkerSession;
use crate::transport::{self, TransportOptions};
use crate::url_model::{filename_from_location, filename_from_url_path, finalize_filename, has_extension};

/// Local filename for `url`.
///
/// An explicit override wins. Otherwise the last URL path segment is used
/// when it has an extension; if not, a HEAD request (redirects not followed)
/// may reveal the real name through `Location`.
pub(super) fn resolve_filename(
    url: &str,
    override_name: Option<&str>,
    session: &WorkerSession,
    opts: &TransportOptions,
) -> Result<String, DownloadError> {
    if let Some(name) = override_name {
        return Ok(finalize_filename(Some(name)));
    }
    let from_path = filename_from_url_path(url);
    if from_path.as_deref().is_some_and(has_extension) {
        return Ok(finalize_filename(from_path.as_deref()));
    }

    let head = transport::head(session, url, opts)?;
    if head.status == 404 {
        return Err(DownloadError::link(url, "HTTP 404"));
    }
    let from_location = head
        .location
        .as_deref()
        .and_then(|loc| filename_from_location(loc, url));
    if let Some(name) = &from_location {
        tracing::debug!(%url, %name, "filename from redirect");
    }
    Ok(finalize_filename(from_location.or(from_path).as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Neither case reaches the network: an unroutable proxy would make any
    // request fail.
    fn offline_session() -> WorkerSession {
        WorkerSession::new(1, Some("socks5h://127.0.0.1:1".into()))
    }

    #[test]
    fn override_wins_and_is_sanitized() {
        let name = resolve_filename(
            "http://x.onion/dl?id=1",
            Some("../evil.zip"),
            &offline_session(),
            &TransportOptions::default(),
        )
        .unwrap();
        assert!(!name.contains('/'));
        assert!(name.ends_with("evil.zip"));
    }

    #[test]
    fn name_with_extension_skips_head() {
        let name = resolve_filename(
            "http://x.onion/files/report%20v2.pdf",
            None,
            &offline_session(),
            &TransportOptions::default(),
        )
        .unwrap();
        assert_eq!(name, "report v2.pdf");
    }
}
