//! Console output for engine events.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tordl_core::events::{DownloadEvent, EventSink};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Prints lifecycle events as lines on stdout; per-file progress is throttled.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    last_print: Mutex<HashMap<String, Instant>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn progress_due(&self, url: &str, done: bool) -> bool {
        let Ok(mut last) = self.last_print.lock() else {
            return false;
        };
        let now = Instant::now();
        let due = done
            || last
                .get(url)
                .map_or(true, |t| now.duration_since(*t) >= PROGRESS_INTERVAL);
        if due {
            last.insert(url.to_string(), now);
        }
        due
    }
}

impl EventSink for ConsoleProgress {
    fn emit(&self, event: &DownloadEvent) {
        if let Some(line) = self.render(event) {
            println!("{}", line);
        }
    }
}

impl ConsoleProgress {
    fn render(&self, event: &DownloadEvent) -> Option<String> {
        match event {
            DownloadEvent::Started {
                url,
                session_id,
                attempt,
            } => (*attempt == 1).then(|| format!("start    {} (session #{})", url, session_id)),
            DownloadEvent::Planned {
                url,
                bytes_present,
                ..
            } => (*bytes_present > 0)
                .then(|| format!("resume   {} from {}", url, human_bytes(*bytes_present))),
            DownloadEvent::Progress {
                url,
                chunks_done,
                chunks_total,
                bytes_written,
            } => {
                let done = chunks_total.is_some_and(|t| *chunks_done >= t);
                if !self.progress_due(url, done) {
                    return None;
                }
                let pct = match chunks_total {
                    Some(t) if *t > 0 => format!(" {:>3}%", chunks_done * 100 / t),
                    _ => String::new(),
                };
                Some(format!(
                    "  {}{} ({} this attempt)",
                    url,
                    pct,
                    human_bytes(*bytes_written)
                ))
            }
            DownloadEvent::Retrying {
                url,
                attempt,
                reason,
            } => Some(format!("retry    {} after attempt {}: {}", url, attempt, reason)),
            DownloadEvent::Requeued { url, requeues } => {
                Some(format!("requeue  {} (proxy unavailable, #{})", url, requeues))
            }
            DownloadEvent::Completed { path, .. } => Some(format!("done     {}", path.display())),
            DownloadEvent::Failed { url, kind, detail } => {
                Some(format!("FAILED   {}: {} ({})", url, kind, detail))
            }
            DownloadEvent::Tally {
                completed,
                finished,
                total,
            } => Some(format!(
                "[{}/{} finished, {} completed]",
                finished, total, completed
            )),
        }
    }
}

pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
