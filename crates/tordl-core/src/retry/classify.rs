//! Classify HTTP status and curl errors into retry policy error kinds.

use super::error::{DownloadError, TransportError};
use super::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
///
/// Over Tor almost every request-level failure is worth another try on a new
/// circuit, so anything that is not a local problem (write callback refused
/// data, transfer aborted on purpose, bad option) counts as transient.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_write_error() || e.is_aborted_by_callback() || e.is_url_malformed() {
        return ErrorKind::Other;
    }
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_partial_file() {
        return ErrorKind::Incomplete;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_ssl_connect_error()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Request
}

/// Classify a download error into an ErrorKind.
pub fn classify(e: &DownloadError) -> ErrorKind {
    match e {
        DownloadError::Transport(TransportError::Curl(ce)) => classify_curl_error(ce),
        DownloadError::Transport(TransportError::Http(code)) => classify_http_status(*code),
        DownloadError::Transport(TransportError::UnexpectedRange { .. }) => ErrorKind::Request,
        DownloadError::SizeMismatch { .. } => ErrorKind::Incomplete,
        DownloadError::InvalidTarget { .. }
        | DownloadError::Link { .. }
        | DownloadError::ProxyUnavailable(_)
        | DownloadError::Storage(_)
        | DownloadError::RetriesExceeded { .. }
        | DownloadError::Interrupted => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(matches!(classify_http_status(500), ErrorKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), ErrorKind::Http5xx(502)));
    }

    #[test]
    fn http_4xx_other() {
        assert_eq!(classify_http_status(404), ErrorKind::Other);
        assert_eq!(classify_http_status(403), ErrorKind::Other);
    }

    #[test]
    fn curl_errors() {
        // CURLE_COULDNT_CONNECT, CURLE_OPERATION_TIMEDOUT, CURLE_PARTIAL_FILE, CURLE_WRITE_ERROR
        assert_eq!(classify_curl_error(&curl::Error::new(7)), ErrorKind::Connection);
        assert_eq!(classify_curl_error(&curl::Error::new(28)), ErrorKind::Timeout);
        assert_eq!(classify_curl_error(&curl::Error::new(18)), ErrorKind::Incomplete);
        assert_eq!(classify_curl_error(&curl::Error::new(23)), ErrorKind::Other);
        assert_eq!(classify_curl_error(&curl::Error::new(42)), ErrorKind::Other);
        // CURLE_PROXY: handshake with the SOCKS proxy failed.
        assert_eq!(classify_curl_error(&curl::Error::new(97)), ErrorKind::Request);
    }

    #[test]
    fn misplaced_partial_content_is_retryable() {
        let e = DownloadError::Transport(TransportError::UnexpectedRange {
            requested: 1024,
            served: 512,
        });
        assert_eq!(classify(&e), ErrorKind::Request);
        assert!(e.to_string().contains("server sent from 512"));
    }

    #[test]
    fn permanent_errors_are_other() {
        assert_eq!(classify(&DownloadError::link("u", "404")), ErrorKind::Other);
        assert_eq!(classify(&DownloadError::Interrupted), ErrorKind::Other);
        assert_eq!(
            classify(&DownloadError::ProxyUnavailable("down".into())),
            ErrorKind::Other
        );
        assert_eq!(
            classify(&DownloadError::SizeMismatch {
                expected: 10,
                actual: 5
            }),
            ErrorKind::Incomplete
        );
    }
}
