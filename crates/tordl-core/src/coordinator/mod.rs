//! Download coordinator: runs a batch of jobs on a bounded worker pool.
//!
//! Workers pull jobs from a shared channel and send one report per job back
//! to the coordinator thread, the only consumer, which owns the batch report
//! and the completion tally. A job whose session could not be obtained is
//! put back into the queue as a new job value; its retry budget starts over.
//! A worker panic leaves the job unresolved; once the round has drained, the
//! unresolved jobs get a bounded number of fresh rounds.

mod pool;
mod report;

pub use report::BatchReport;

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::control::{CancelToken, DestinationLocks};
use crate::downloader::FileDownloader;
use crate::events::{DownloadEvent, EventSink};
use crate::job::{DownloadJob, DownloadResult, EngineConfig};
use crate::retry::{DownloadError, FailureKind};
use crate::session::SessionProvider;

use pool::Outcome;

pub struct Coordinator {
    config: EngineConfig,
    events: Arc<dyn EventSink>,
    cancel: CancelToken,
    downloader: FileDownloader,
}

impl Coordinator {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn SessionProvider>,
        events: Arc<dyn EventSink>,
        cancel: CancelToken,
    ) -> Self {
        let downloader =
            FileDownloader::new(&config, provider, Arc::clone(&events)).with_cancel(cancel.clone());
        Self {
            config,
            events,
            cancel,
            downloader,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every job to a final result. Duplicate URLs are collapsed to their
    /// first occurrence, and a destination is written by one URL only: a later
    /// URL resolving to the same path fails as an invalid target. Blocks until
    /// the batch is done or cancelled; every URL has a result either way.
    pub fn run(&self, jobs: Vec<DownloadJob>) -> BatchReport {
        let jobs = dedupe(jobs);
        // Destination claims last for this batch, across restarts.
        let downloader = self
            .downloader
            .clone()
            .with_locks(Arc::new(DestinationLocks::new()));
        let mut report = BatchReport::new(jobs.iter().map(|j| j.url.clone()));
        let total = jobs.len();
        tracing::info!(total, workers = self.config.worker_limit, "batch started");

        let mut pending = jobs;
        loop {
            let unresolved = self.run_round(&downloader, pending, &mut report, total);
            if unresolved.is_empty() {
                break;
            }
            if report.batch_restarts >= self.config.max_batch_restarts || self.cancel.is_cancelled() {
                for job in &unresolved {
                    self.settle(
                        &mut report,
                        total,
                        &job.url,
                        failed(&job.url, FailureKind::Unexpected, "worker failed; restarts exhausted"),
                    );
                }
                break;
            }
            report.batch_restarts += 1;
            tracing::warn!(
                unresolved = unresolved.len(),
                restart = report.batch_restarts,
                "restarting unresolved jobs after worker failure"
            );
            pending = unresolved;
        }

        // Anything still open (e.g. all workers failed to spawn) is reported, never dropped.
        let open: Vec<String> = report.unsettled().map(str::to_string).collect();
        for url in open {
            self.settle(&mut report, total, &url, failed(&url, FailureKind::Unexpected, "never ran"));
        }

        tracing::info!(
            completed = report.completed(),
            failed = report.failed(),
            requeues = report.requeues,
            batch_restarts = report.batch_restarts,
            "batch finished"
        );
        report
    }

    /// One pass over `jobs`. Returns the jobs left unresolved by a worker panic.
    fn run_round(
        &self,
        downloader: &FileDownloader,
        jobs: Vec<DownloadJob>,
        report: &mut BatchReport,
        total: usize,
    ) -> Vec<DownloadJob> {
        let mut unresolved = Vec::new();
        if jobs.is_empty() {
            return unresolved;
        }

        let (job_tx, job_rx) = mpsc::channel::<DownloadJob>();
        let (result_tx, result_rx) = mpsc::channel::<pool::Report>();
        let mut outstanding = jobs.len();
        let workers = self.config.worker_limit.clamp(1, jobs.len());
        for job in jobs {
            // The receiver is alive until the workers are joined below.
            let _ = job_tx.send(job);
        }
        let handles = pool::spawn_workers(
            workers,
            downloader,
            self.config.retry,
            &self.cancel,
            Arc::new(Mutex::new(job_rx)),
            &result_tx,
        );
        drop(result_tx);

        while outstanding > 0 {
            let Ok((job, outcome)) = result_rx.recv() else {
                tracing::error!(outstanding, "all workers gone with jobs outstanding");
                break;
            };
            match outcome {
                Outcome::Finished(Ok(path)) => {
                    outstanding -= 1;
                    self.settle(report, total, &job.url, DownloadResult::Completed { path });
                }
                Outcome::Finished(Err(DownloadError::ProxyUnavailable(msg)))
                    if job.requeues < self.config.max_session_requeues
                        && !self.cancel.is_cancelled() =>
                {
                    let again = job.requeued();
                    report.requeues += 1;
                    tracing::warn!(url = %job.url, requeues = again.requeues, "proxy unavailable, requeueing: {}", msg);
                    self.events.emit(&DownloadEvent::Requeued {
                        url: job.url.clone(),
                        requeues: again.requeues,
                    });
                    if job_tx.send(again).is_err() {
                        outstanding -= 1;
                        self.settle(report, total, &job.url, failed(&job.url, FailureKind::ProxyUnavailable, msg));
                    }
                }
                Outcome::Finished(Err(e)) => {
                    outstanding -= 1;
                    self.settle(report, total, &job.url, failed(&job.url, e.failure_kind(), e.to_string()));
                }
                Outcome::NotStarted => {
                    outstanding -= 1;
                    self.settle(
                        report,
                        total,
                        &job.url,
                        failed(&job.url, FailureKind::Interrupted, "cancelled before start"),
                    );
                }
                Outcome::Panicked(msg) => {
                    outstanding -= 1;
                    tracing::error!(url = %job.url, "worker panicked: {}", msg);
                    unresolved.push(job);
                }
            }
        }

        drop(job_tx);
        for h in handles {
            if h.join().is_err() {
                tracing::error!("worker thread exited abnormally");
            }
        }
        // A job lost with a dead worker counts as unresolved.
        if outstanding > 0 {
            tracing::error!(outstanding, "jobs lost in this round");
        }
        unresolved
    }

    fn settle(&self, report: &mut BatchReport, total: usize, url: &str, result: DownloadResult) {
        let event = match &result {
            DownloadResult::Completed { path } => DownloadEvent::Completed {
                url: url.to_string(),
                path: path.clone(),
            },
            DownloadResult::Failed { kind, detail, .. } => DownloadEvent::Failed {
                url: url.to_string(),
                kind: *kind,
                detail: detail.clone(),
            },
        };
        if report.settle(url, result) {
            self.events.emit(&event);
            self.events.emit(&DownloadEvent::Tally {
                completed: report.completed(),
                finished: report.settled(),
                total,
            });
        }
    }
}

fn failed(url: &str, kind: FailureKind, detail: impl Into<String>) -> DownloadResult {
    DownloadResult::Failed {
        url: url.to_string(),
        kind,
        detail: detail.into(),
    }
}

/// Keep the first job for each URL.
fn dedupe(jobs: Vec<DownloadJob>) -> Vec<DownloadJob> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|j| {
            let fresh = seen.insert(j.url.clone());
            if !fresh {
                tracing::debug!(url = %j.url, "duplicate URL dropped");
            }
            fresh
        })
        .collect()
}
