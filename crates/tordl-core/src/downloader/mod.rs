//! Single-file downloader.
//!
//! Drives one URL to one file: target directory checks, filename
//! resolution, resume planning, a streaming (possibly ranged) GET, and a
//! size check of the result. Attempts run in a bounded loop; each attempt
//! checks out a fresh session so a retry also rotates the Tor circuit.
//! Failure to get a session at all is not retried here: it is returned as
//! [`DownloadError::ProxyUnavailable`] for the coordinator to requeue.

mod body;
mod resolve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::control::{CancelToken, DestinationGuard, DestinationLocks, LockError};
use crate::events::{DownloadEvent, EventSink};
use crate::job::{DownloadJob, EngineConfig};
use crate::planner;
use crate::retry::{classify, DownloadError, RetryDecision, RetryPolicy};
use crate::session::{SessionError, SessionProvider, WorkerSession};
use crate::storage::{file_len, truncate_to};
use crate::transport::{self, TransportOptions};
use crate::url_model::validate_url;

use body::{AttemptBody, Verdict};

/// Per-job state, alive only while the job runs.
#[derive(Debug, Clone, Default)]
pub struct DownloadState {
    pub resolved_filename: Option<String>,
    pub destination: Option<PathBuf>,
    /// Size on disk when the current attempt started.
    pub bytes_already_present: u64,
    /// Whole-file size the current attempt expects.
    pub expected_total_bytes: Option<u64>,
    pub attempt_count: u32,
}

/// Downloads single files. Cheap to clone; clones share sessions, events,
/// cancellation, and destination locks.
#[derive(Clone)]
pub struct FileDownloader {
    provider: Arc<dyn SessionProvider>,
    events: Arc<dyn EventSink>,
    cancel: CancelToken,
    locks: Arc<DestinationLocks>,
    retry: RetryPolicy,
    transport: TransportOptions,
}

impl FileDownloader {
    pub fn new(
        config: &EngineConfig,
        provider: Arc<dyn SessionProvider>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            provider,
            events,
            cancel: CancelToken::new(),
            locks: Arc::new(DestinationLocks::new()),
            retry: config.retry,
            transport: config.transport,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Share a lock registry with other downloaders writing into the same tree.
    pub fn with_locks(mut self, locks: Arc<DestinationLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Fetch `job.url` into `job.target_dir`, resuming from any bytes already
    /// there. Returns the path of the complete file.
    pub fn download(&self, job: &DownloadJob) -> Result<PathBuf, DownloadError> {
        let url = validate_url(&job.url)
            .map_err(|reason| DownloadError::link(&job.url, reason))?
            .to_string();
        prepare_target_dir(&job.target_dir)?;

        let mut state = DownloadState::default();
        // Held from the first attempt that resolves the destination until the
        // job ends, backoff sleeps included.
        let mut guard: Option<DestinationGuard<'_>> = None;
        loop {
            if self.cancel.is_cancelled() {
                return Err(DownloadError::Interrupted);
            }
            state.attempt_count += 1;
            let attempt = state.attempt_count;

            let session = self
                .provider
                .get_session()
                .map_err(|SessionError::ProxyUnavailable(msg)| DownloadError::ProxyUnavailable(msg))?;
            self.events.emit(&DownloadEvent::Started {
                url: job.url.clone(),
                session_id: session.id(),
                attempt,
            });
            let result = self
                .claim_destination(&url, job, &session, &mut state, &mut guard)
                .and_then(|destination| self.attempt(&url, job, &session, &destination, &mut state));
            self.provider.release(session);

            let err = match result {
                Ok(path) => return Ok(path),
                Err(e @ (DownloadError::Interrupted | DownloadError::ProxyUnavailable(_))) => {
                    return Err(e)
                }
                Err(e) => e,
            };
            let kind = classify(&err);
            match self.retry.decide(attempt, kind) {
                RetryDecision::NoRetry if RetryPolicy::is_retryable(kind) => {
                    tracing::warn!(url = %job.url, attempt, "giving up: {}", err);
                    return Err(DownloadError::RetriesExceeded {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                RetryDecision::NoRetry => return Err(err),
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(url = %job.url, attempt, ?delay, "attempt failed, retrying: {}", err);
                    self.events.emit(&DownloadEvent::Retrying {
                        url: job.url.clone(),
                        attempt,
                        reason: err.to_string(),
                    });
                    if self.cancel.sleep(delay) {
                        return Err(DownloadError::Interrupted);
                    }
                }
            }
        }
    }

    /// Resolve the destination once per job and take its lock, or return the
    /// one already held.
    fn claim_destination<'s>(
        &'s self,
        url: &str,
        job: &DownloadJob,
        session: &WorkerSession,
        state: &mut DownloadState,
        guard: &mut Option<DestinationGuard<'s>>,
    ) -> Result<PathBuf, DownloadError> {
        if let Some(held) = guard {
            return Ok(held.path().to_path_buf());
        }
        let destination = match &state.destination {
            Some(d) => d.clone(),
            None => {
                let name =
                    resolve::resolve_filename(url, job.filename.as_deref(), session, &self.transport)?;
                let d = job.target_dir.join(&name);
                state.resolved_filename = Some(name);
                state.destination = Some(d.clone());
                d
            }
        };
        let held = self
            .locks
            .acquire(&destination, &job.url, &self.cancel)
            .map_err(|e| match e {
                LockError::Cancelled => DownloadError::Interrupted,
                LockError::Claimed { owner } => {
                    tracing::warn!(url = %job.url, %owner, path = %destination.display(), "destination taken by another URL");
                    DownloadError::InvalidTarget {
                        path: destination.clone(),
                        reason: format!("already the destination of {}", owner),
                    }
                }
            })?;
        *guard = Some(held);
        Ok(destination)
    }

    /// One request against `destination`, which the caller holds locked.
    fn attempt(
        &self,
        url: &str,
        job: &DownloadJob,
        session: &WorkerSession,
        destination: &Path,
        state: &mut DownloadState,
    ) -> Result<PathBuf, DownloadError> {
        let plan = planner::plan(destination, job.chunk_size).map_err(|e| {
            DownloadError::InvalidTarget {
                path: destination.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        state.bytes_already_present = plan.offset;
        state.expected_total_bytes = None;
        self.events.emit(&DownloadEvent::Planned {
            url: job.url.clone(),
            destination: destination.to_path_buf(),
            bytes_present: plan.offset,
        });
        tracing::debug!(%url, attempt = state.attempt_count, offset = plan.offset, "requesting");

        let range = plan.curl_range();
        let mut body = AttemptBody::new(
            &job.url,
            destination,
            plan,
            job.chunk_size,
            &*self.events,
            &self.cancel,
        );
        let transfer = transport::stream_get(
            session,
            url,
            range.as_deref(),
            &self.transport,
            &self.cancel,
            &mut body,
        )
        .map(|_| ());

        match body.finish(transfer)? {
            Verdict::AlreadyComplete => Ok(destination.to_path_buf()),
            Verdict::Streamed { expected_total } => {
                state.expected_total_bytes = Some(expected_total);
                let actual = file_len(destination)?;
                if actual > expected_total {
                    // Bytes past the end came from somewhere else; a resume
                    // from here would get 416 and keep them. Start over.
                    tracing::warn!(%url, expected_total, actual, "file longer than expected, discarding it");
                    truncate_to(destination, 0)?;
                }
                if actual != expected_total {
                    return Err(DownloadError::SizeMismatch {
                        expected: expected_total,
                        actual,
                    });
                }
                Ok(destination.to_path_buf())
            }
        }
    }
}

/// Create the target directory if needed; it must end up a directory.
fn prepare_target_dir(dir: &Path) -> Result<(), DownloadError> {
    if dir.is_file() {
        return Err(DownloadError::InvalidTarget {
            path: dir.to_path_buf(),
            reason: "is a regular file".to_string(),
        });
    }
    std::fs::create_dir_all(dir).map_err(|e| DownloadError::InvalidTarget {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}
