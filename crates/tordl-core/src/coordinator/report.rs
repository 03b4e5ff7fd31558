use std::collections::HashMap;
use std::path::PathBuf;

use crate::job::DownloadResult;

/// Outcome of a batch: one result per distinct URL, in submission order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    entries: Vec<(String, Option<DownloadResult>)>,
    /// URL to its position in `entries`.
    index: HashMap<String, usize>,
    settled: usize,
    /// Jobs handed back to the queue because no session could be obtained.
    pub requeues: u32,
    /// Times the unresolved part of the batch was restarted after a worker panic.
    pub batch_restarts: u32,
}

impl BatchReport {
    pub(super) fn new(urls: impl IntoIterator<Item = String>) -> Self {
        let mut report = Self::default();
        for url in urls {
            if report.index.contains_key(&url) {
                continue;
            }
            report.index.insert(url.clone(), report.entries.len());
            report.entries.push((url, None));
        }
        report
    }

    /// Record the result for `url`. Each URL is settled once; later results are ignored.
    pub(super) fn settle(&mut self, url: &str, result: DownloadResult) -> bool {
        match self.index.get(url).map(|&i| &mut self.entries[i]) {
            Some((_, slot @ None)) => {
                *slot = Some(result);
                self.settled += 1;
                true
            }
            Some(_) => {
                tracing::warn!(%url, "result for already settled URL ignored");
                false
            }
            None => {
                tracing::warn!(%url, "result for unknown URL ignored");
                false
            }
        }
    }

    pub fn get(&self, url: &str) -> Option<&DownloadResult> {
        self.index
            .get(url)
            .and_then(|&i| self.entries[i].1.as_ref())
    }

    /// `(url, result)` pairs in submission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DownloadResult)> {
        self.entries
            .iter()
            .filter_map(|(u, r)| r.as_ref().map(|r| (u.as_str(), r)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of URLs that have a result.
    pub fn settled(&self) -> usize {
        self.settled
    }

    pub fn completed(&self) -> usize {
        self.iter().filter(|(_, r)| r.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.iter().filter(|(_, r)| !r.is_completed()).count()
    }

    /// Paths of every completed download, in submission order.
    pub fn completed_paths(&self) -> Vec<PathBuf> {
        self.iter()
            .filter_map(|(_, r)| match r {
                DownloadResult::Completed { path } => Some(path.clone()),
                DownloadResult::Failed { .. } => None,
            })
            .collect()
    }

    pub(super) fn unsettled(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, r)| r.is_none())
            .map(|(u, _)| u.as_str())
    }
}
