//! Structured progress and lifecycle events.
//!
//! The engine never prints. Everything a user might want to see is emitted as
//! a [`DownloadEvent`] into an [`EventSink`] supplied by the caller. `emit`
//! cannot fail, so a slow or broken consumer can never abort a transfer.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Mutex;

use crate::retry::FailureKind;

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// A job was handed to a worker with a fresh session.
    Started {
        url: String,
        session_id: u64,
        attempt: u32,
    },
    /// Destination resolved and resume state planned.
    Planned {
        url: String,
        destination: PathBuf,
        bytes_present: u64,
    },
    /// Chunks written so far for the current attempt.
    Progress {
        url: String,
        chunks_done: u64,
        chunks_total: Option<u64>,
        bytes_written: u64,
    },
    /// A transient failure; another attempt follows.
    Retrying {
        url: String,
        attempt: u32,
        reason: String,
    },
    /// The proxy was unavailable; the job goes back into the queue.
    Requeued { url: String, requeues: u32 },
    Completed { url: String, path: PathBuf },
    Failed {
        url: String,
        kind: FailureKind,
        detail: String,
    },
    /// Running completion tally of the batch.
    Tally {
        completed: usize,
        finished: usize,
        total: usize,
    },
}

/// Consumer of engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DownloadEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &DownloadEvent) {}
}

/// Writes lifecycle events to the `tracing` log. Progress is logged at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Started {
                url,
                session_id,
                attempt,
            } => tracing::info!(%url, session_id, attempt, "download started"),
            DownloadEvent::Planned {
                url,
                destination,
                bytes_present,
            } => {
                if *bytes_present > 0 {
                    tracing::info!(%url, path = %destination.display(), bytes_present, "resuming partial file");
                } else {
                    tracing::debug!(%url, path = %destination.display(), "fresh download");
                }
            }
            DownloadEvent::Progress {
                url,
                chunks_done,
                chunks_total,
                bytes_written,
            } => tracing::trace!(%url, chunks_done, ?chunks_total, bytes_written, "progress"),
            DownloadEvent::Retrying {
                url,
                attempt,
                reason,
            } => tracing::warn!(%url, attempt, "retrying: {}", reason),
            DownloadEvent::Requeued { url, requeues } => {
                tracing::error!(%url, requeues, "could not reach proxy, requeueing with a new session")
            }
            DownloadEvent::Completed { url, path } => {
                tracing::info!(%url, path = %path.display(), "download finished")
            }
            DownloadEvent::Failed { url, kind, detail } => {
                tracing::error!(%url, %kind, "download failed: {}", detail)
            }
            DownloadEvent::Tally {
                completed,
                finished,
                total,
            } => tracing::info!("{} of {} finished ({} completed)", finished, total, completed),
        }
    }
}

/// Forwards events into a channel; a closed receiver is ignored.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Mutex<mpsc::Sender<DownloadEvent>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<DownloadEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &DownloadEvent) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(event.clone());
        }
    }
}

/// Sends every event to each inner sink in order.
pub struct FanoutSink(pub Vec<Box<dyn EventSink>>);

impl EventSink for FanoutSink {
    fn emit(&self, event: &DownloadEvent) {
        for sink in &self.0 {
            sink.emit(event);
        }
    }
}
