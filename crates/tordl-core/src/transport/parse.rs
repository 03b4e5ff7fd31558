//! Parse HTTP response header lines into ResponseHead.

/// Status and the headers the engine cares about, from the last response
/// block curl delivered (redirect and interim blocks are discarded).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u32,
    pub content_length: Option<u64>,
    pub location: Option<String>,
    /// `Content-Range` value, e.g. `bytes 1024-2499/2500`.
    pub content_range: Option<String>,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Accumulates raw header lines as curl reports them.
#[derive(Debug, Default)]
pub struct HeaderCollector {
    current: ResponseHead,
}

impl HeaderCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw header line (with or without trailing CRLF).
    pub fn push_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with("HTTP/") {
            // New response block (redirect hop, 100-continue, proxy CONNECT).
            self.current = ResponseHead {
                status: parse_status_line(line).unwrap_or(0),
                ..ResponseHead::default()
            };
            return;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                self.current.content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("location") {
                self.current.location = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-range") {
                self.current.content_range = Some(value.to_string());
            }
        }
    }

    pub fn head(&self) -> &ResponseHead {
        &self.current
    }

    pub fn into_head(self) -> ResponseHead {
        self.current
    }
}

fn parse_status_line(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Start offset of a `Content-Range: bytes START-END/TOTAL` value.
pub fn content_range_start(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim();
    let (start, _) = rest.split_once('-')?;
    start.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(lines: &[&str]) -> ResponseHead {
        let mut c = HeaderCollector::new();
        for l in lines {
            c.push_line(format!("{}\r\n", l).as_bytes());
        }
        c.into_head()
    }

    #[test]
    fn status_and_length() {
        let h = collect(&["HTTP/1.1 206 Partial Content", "Content-Length: 1476", ""]);
        assert_eq!(h.status, 206);
        assert_eq!(h.content_length, Some(1476));
        assert!(h.is_success());
    }

    #[test]
    fn http2_status_line() {
        let h = collect(&["HTTP/2 404", "content-length: 9"]);
        assert_eq!(h.status, 404);
        assert!(!h.is_success());
    }

    #[test]
    fn redirect_block_is_replaced_by_final_block() {
        let h = collect(&[
            "HTTP/1.1 302 Found",
            "Location: /real/file.zip",
            "Content-Length: 0",
            "",
            "HTTP/1.1 200 OK",
            "Content-Length: 2500",
        ]);
        assert_eq!(h.status, 200);
        assert_eq!(h.content_length, Some(2500));
        assert_eq!(h.location, None);
    }

    #[test]
    fn location_and_missing_length() {
        let h = collect(&["HTTP/1.1 301 Moved Permanently", "Location: http://a.onion/x.7z"]);
        assert_eq!(h.location.as_deref(), Some("http://a.onion/x.7z"));
        assert_eq!(h.content_length, None);
    }

    #[test]
    fn content_range_offsets() {
        let h = collect(&["HTTP/1.1 206 Partial Content", "Content-Range: bytes 1024-2499/2500"]);
        assert_eq!(
            h.content_range.as_deref().and_then(content_range_start),
            Some(1024)
        );
        assert_eq!(content_range_start("bytes */2500"), None);
    }
}
