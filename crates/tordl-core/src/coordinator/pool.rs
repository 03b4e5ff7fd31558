//! Worker threads of one round.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::control::CancelToken;
use crate::downloader::FileDownloader;
use crate::job::DownloadJob;
use crate::retry::{DownloadError, RetryPolicy};

/// What a worker reports for one job.
pub(super) enum Outcome {
    Finished(Result<PathBuf, DownloadError>),
    /// Cancellation was requested before the job started.
    NotStarted,
    /// The downloader panicked; carries the panic message.
    Panicked(String),
}

pub(super) type Report = (DownloadJob, Outcome);

/// Spawn `count` workers pulling from `jobs` until the channel closes.
pub(super) fn spawn_workers(
    count: usize,
    downloader: &FileDownloader,
    retry: RetryPolicy,
    cancel: &CancelToken,
    jobs: Arc<Mutex<Receiver<DownloadJob>>>,
    results: &Sender<Report>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|n| {
            let downloader = downloader.clone();
            let cancel = cancel.clone();
            let jobs = Arc::clone(&jobs);
            let results = results.clone();
            std::thread::Builder::new()
                .name(format!("tordl-worker-{}", n))
                .spawn(move || worker_loop(&downloader, retry, &cancel, &jobs, &results))
        })
        .filter_map(|spawned| match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("failed to spawn worker thread: {}", e);
                None
            }
        })
        .collect()
}

fn worker_loop(
    downloader: &FileDownloader,
    retry: RetryPolicy,
    cancel: &CancelToken,
    jobs: &Mutex<Receiver<DownloadJob>>,
    results: &Sender<Report>,
) {
    loop {
        // Hold the lock only for the receive.
        let next = jobs.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let Ok(job) = next else {
            break;
        };
        let outcome = if cancel.is_cancelled() {
            Outcome::NotStarted
        } else if job.requeues > 0 && cancel.sleep(retry.backoff(job.requeues)) {
            Outcome::NotStarted
        } else {
            match panic::catch_unwind(AssertUnwindSafe(|| downloader.download(&job))) {
                Ok(result) => Outcome::Finished(result),
                Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
            }
        };
        if results.send((job, outcome)).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
