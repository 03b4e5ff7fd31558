//! Filename extraction from URL paths and redirect targets.

/// Extracts the last path segment from a URL for use as a filename hint.
///
/// Percent-escapes are decoded. Returns `None` if the URL cannot be parsed or
/// the path is empty/root.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    last_segment(&parsed)
}

/// Filename from a `Location` header value, which may be relative to `base`.
pub fn filename_from_location(location: &str, base: &str) -> Option<String> {
    let base = url::Url::parse(base).ok()?;
    let target = base.join(location.trim()).ok()?;
    last_segment(&target)
}

/// True if `name` has a non-empty extension (`file.zip`, not `file` or `.hidden`).
pub fn has_extension(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .map(|e| !e.is_empty())
        .unwrap_or(false)
}

fn last_segment(url: &url::Url) -> Option<String> {
    let segment = url.path().split('/').filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(segment);
    if decoded.is_empty() || decoded == "." || decoded == ".." {
        return None;
    }
    Some(decoded)
}

/// Simple percent-decode; malformed escapes are kept verbatim.
pub(super) fn percent_decode(input: &str) -> String {
    let mut out = Vec::new();
    let mut bytes = input.as_bytes().iter().cloned();
    while let Some(b) = bytes.next() {
        if b == b'%' {
            let h = bytes.next();
            let l = bytes.next();
            match (h.and_then(hex_digit), l.and_then(hex_digit)) {
                (Some(high), Some(low)) => out.push(high << 4 | low),
                _ => {
                    out.push(b'%');
                    out.extend(h);
                    out.extend(l);
                }
            }
        } else {
            out.push(b);
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
