//! Response handling for one attempt: decide from the status line and
//! headers what the attempt means, then stream the body into the destination.

use std::path::Path;

use crate::control::CancelToken;
use crate::events::EventSink;
use crate::planner::ResumePlan;
use crate::retry::{DownloadError, TransportError};
use crate::storage::{ProgressReporter, StreamWriter, WriteMode};
use crate::transport::{content_range_start, BodyFlow, BodyHandler, ResponseHead};

/// What the response head told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Verdict {
    /// 416 on a resumed request: the file is already whole.
    AlreadyComplete,
    /// Body streamed; the file should now hold `expected_total` bytes.
    Streamed { expected_total: u64 },
}

/// [`BodyHandler`] for one GET attempt.
pub(super) struct AttemptBody<'a> {
    url: &'a str,
    destination: &'a Path,
    plan: ResumePlan,
    chunk_size: usize,
    events: &'a dyn EventSink,
    cancel: &'a CancelToken,
    writer: Option<StreamWriter<'a>>,
    verdict: Option<Verdict>,
    error: Option<DownloadError>,
}

impl<'a> AttemptBody<'a> {
    pub(super) fn new(
        url: &'a str,
        destination: &'a Path,
        plan: ResumePlan,
        chunk_size: usize,
        events: &'a dyn EventSink,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            url,
            destination,
            plan,
            chunk_size: chunk_size.max(1),
            events,
            cancel,
            writer: None,
            verdict: None,
            error: None,
        }
    }

    /// Close out the attempt after the transfer ended, successfully or not.
    ///
    /// Bytes received before a transport failure are a valid prefix, so the
    /// writer's tail is still flushed; the next attempt resumes after it.
    pub(super) fn finish(
        mut self,
        transfer: Result<(), TransportError>,
    ) -> Result<Verdict, DownloadError> {
        let flushed = match self.writer.take() {
            Some(w) if !matches!(self.error, Some(DownloadError::Storage(_))) => w.finish().map(|_| ()),
            _ => Ok(()),
        };
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if let Err(e) = transfer {
            if let TransportError::Curl(ce) = &e {
                if ce.is_aborted_by_callback() && self.cancel.is_cancelled() {
                    return Err(DownloadError::Interrupted);
                }
            }
            return Err(DownloadError::Transport(e));
        }
        flushed?;
        self.verdict
            .ok_or_else(|| DownloadError::link(self.url, "no response received"))
    }

    fn fail(&mut self, err: DownloadError) -> BodyFlow {
        self.error = Some(err);
        BodyFlow::Stop
    }

    fn decide(&mut self, head: &ResponseHead) -> BodyFlow {
        let status = head.status;
        if status == 416 && self.plan.is_resume() {
            tracing::info!(url = %self.url, offset = self.plan.offset, "range not satisfiable, already complete");
            self.verdict = Some(Verdict::AlreadyComplete);
            return BodyFlow::Stop;
        }
        if status == 404 {
            return self.fail(DownloadError::link(self.url, "HTTP 404"));
        }
        if status == 429 || (500..600).contains(&status) {
            return self.fail(DownloadError::Transport(TransportError::Http(status)));
        }
        if !head.is_success() {
            return self.fail(DownloadError::link(self.url, format!("HTTP {}", status)));
        }
        let Some(content_length) = head.content_length else {
            return self.fail(DownloadError::link(self.url, "missing Content-Length"));
        };

        let (start, mode) = if !self.plan.is_resume() {
            (0, WriteMode::Truncate)
        } else if status == 206 {
            match head.content_range.as_deref().and_then(content_range_start) {
                Some(0) => {
                    tracing::warn!(url = %self.url, "server sent the whole file as 206, restarting from zero");
                    (0, WriteMode::Truncate)
                }
                Some(served) if served != self.plan.offset => {
                    // Appending would misplace every byte; retry on a new circuit.
                    return self.fail(DownloadError::Transport(TransportError::UnexpectedRange {
                        requested: self.plan.offset,
                        served,
                    }));
                }
                _ => (self.plan.offset, WriteMode::Append),
            }
        } else {
            tracing::warn!(url = %self.url, status, "server ignored Range, restarting from zero");
            (0, WriteMode::Truncate)
        };

        self.verdict = Some(Verdict::Streamed {
            expected_total: start + content_length,
        });
        if content_length == 0 && start > 0 {
            return BodyFlow::Continue;
        }

        let chunk = self.chunk_size as u64;
        let chunks_done = start / chunk;
        let chunks_total = chunks_done + content_length.div_ceil(chunk);
        let progress = ProgressReporter::new(self.url, self.events, chunks_done, Some(chunks_total));
        match StreamWriter::open(self.destination, mode, self.chunk_size, progress) {
            Ok(w) => {
                self.writer = Some(w);
                BodyFlow::Continue
            }
            Err(e) => self.fail(DownloadError::Storage(e)),
        }
    }
}

impl BodyHandler for AttemptBody<'_> {
    fn on_head(&mut self, head: &ResponseHead) -> BodyFlow {
        self.decide(head)
    }

    fn on_data(&mut self, data: &[u8]) -> BodyFlow {
        if self.cancel.is_cancelled() {
            return self.fail(DownloadError::Interrupted);
        }
        let Some(writer) = self.writer.as_mut() else {
            // Zero-length resume or stray body after a stop decision.
            return BodyFlow::Continue;
        };
        match writer.push(data) {
            Ok(()) => BodyFlow::Continue,
            Err(e) => self.fail(DownloadError::Storage(e)),
        }
    }
}
