use crate::events::{DownloadEvent, EventSink};

/// Per-chunk progress for one transfer, forwarded to an [`EventSink`].
pub struct ProgressReporter<'a> {
    url: &'a str,
    sink: &'a dyn EventSink,
    chunks_done: u64,
    chunks_total: Option<u64>,
}

impl<'a> ProgressReporter<'a> {
    /// `chunks_done` starts at the chunks already on disk when resuming.
    pub fn new(
        url: &'a str,
        sink: &'a dyn EventSink,
        chunks_done: u64,
        chunks_total: Option<u64>,
    ) -> Self {
        Self {
            url,
            sink,
            chunks_done,
            chunks_total,
        }
    }

    pub(super) fn chunk_written(&mut self, bytes_written: u64) {
        self.chunks_done += 1;
        self.sink.emit(&DownloadEvent::Progress {
            url: self.url.to_string(),
            chunks_done: self.chunks_done,
            chunks_total: self.chunks_total,
            bytes_written,
        });
    }
}
