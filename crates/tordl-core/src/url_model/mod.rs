//! URL validation and filename derivation.
//!
//! Derives safe local filenames from the URL path or a redirect `Location`,
//! sanitized so a remote name can never escape the output directory.

mod path;
mod sanitize;

pub use path::{filename_from_location, filename_from_url_path, has_extension};
pub use sanitize::sanitize_filename;

/// Default filename when neither the URL nor a redirect yields anything usable.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Basic syntactic check: absolute http(s) URL with a host.
pub fn validate_url(raw: &str) -> Result<url::Url, String> {
    let parsed = url::Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}'", other)),
    }
    match parsed.host_str() {
        Some(h) if !h.is_empty() => Ok(parsed),
        _ => Err("missing host".to_string()),
    }
}

/// Sanitize `candidate` and fall back to [`DEFAULT_FILENAME`] when nothing usable remains.
pub fn finalize_filename(candidate: Option<&str>) -> String {
    let sanitized = candidate.map(sanitize_filename).unwrap_or_default();
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}
