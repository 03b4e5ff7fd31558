//! Job sources: URL lists from a file or scraped from a page.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::session::WorkerSession;
use crate::transport::{fetch_text, TransportOptions};

/// Read URLs from `path`.
///
/// A file whose content starts with `[` must be a JSON array of strings.
/// Anything else is read as one URL per line; blank lines and lines starting
/// with `#` are skipped. An empty list is an error.
pub fn load_links_file(path: &Path) -> Result<Vec<String>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read links file {}", path.display()))?;
    let links = parse_links(&data)
        .with_context(|| format!("invalid links file {}", path.display()))?;
    if links.is_empty() {
        bail!("links file {} contains no URLs", path.display());
    }
    tracing::info!(count = links.len(), file = %path.display(), "loaded links");
    tracing::debug!("links: {}", links.join(", "));
    Ok(links)
}

fn parse_links(data: &str) -> Result<Vec<String>> {
    if data.trim_start().starts_with('[') {
        let links: Vec<String> = serde_json::from_str(data).context("expected a JSON array of strings")?;
        return Ok(links
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect());
    }
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// GET `page_url` through `session` and collect every match of `pattern`.
///
/// With a capture group the first group is taken, otherwise the whole match.
/// Relative links are resolved against the page URL; duplicates are dropped
/// keeping first-seen order.
pub fn scrape_links(
    session: &WorkerSession,
    page_url: &str,
    pattern: &str,
    opts: &TransportOptions,
) -> Result<Vec<String>> {
    let re = Regex::new(pattern).with_context(|| format!("invalid link pattern '{}'", pattern))?;
    let page = fetch_text(session, page_url, opts)
        .with_context(|| format!("failed to fetch {}", page_url))?;
    let links = extract_links(&page, &re, page_url);
    tracing::info!(count = links.len(), url = %page_url, "found links");
    tracing::debug!("links: {}", links.join(", "));
    Ok(links)
}

fn extract_links(page: &str, re: &Regex, page_url: &str) -> Vec<String> {
    let base = url::Url::parse(page_url).ok();
    let mut out: Vec<String> = Vec::new();
    for caps in re.captures_iter(page) {
        let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
            continue;
        };
        let raw = m.as_str().trim();
        if raw.is_empty() {
            continue;
        }
        let link = match &base {
            Some(b) => b.join(raw).map(|u| u.to_string()).unwrap_or_else(|_| raw.to_string()),
            None => raw.to_string(),
        };
        if !out.contains(&link) {
            out.push(link);
        }
    }
    out
}
