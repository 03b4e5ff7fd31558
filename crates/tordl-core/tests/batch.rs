//! Batches through the coordinator against a local server.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use common::range_server::{self, RangeServerOptions};
use tempfile::tempdir;
use tordl_core::control::CancelToken;
use tordl_core::events::{ChannelSink, DownloadEvent, NullSink};
use tordl_core::retry::{FailureKind, RetryPolicy};
use tordl_core::session::{DirectSessionProvider, SessionError, SessionProvider, WorkerSession};
use tordl_core::{Coordinator, DownloadJob, DownloadResult, EngineConfig};

fn engine() -> EngineConfig {
    EngineConfig {
        worker_limit: 4,
        retry: RetryPolicy::immediate(3),
        ..EngineConfig::default()
    }
}

/// Refuses the first `failures` sessions, then hands out direct ones.
struct FlakyProxy {
    failures: u32,
    calls: AtomicU32,
    inner: DirectSessionProvider,
}

impl FlakyProxy {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            inner: DirectSessionProvider::new(),
        }
    }
}

impl SessionProvider for FlakyProxy {
    fn get_session(&self) -> Result<WorkerSession, SessionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(SessionError::ProxyUnavailable("circuit failed".into()));
        }
        self.inner.get_session()
    }
}

#[test]
fn batch_downloads_every_url() {
    let a: Vec<u8> = vec![1u8; 3000];
    let b: Vec<u8> = vec![2u8; 1500];
    let sa = range_server::start(a.clone());
    let sb = range_server::start(b.clone());
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let (tx, rx) = mpsc::channel();
    let c = Coordinator::new(
        engine(),
        Arc::new(DirectSessionProvider::new()),
        Arc::new(ChannelSink::new(tx)),
        CancelToken::new(),
    );

    let report = c.run(vec![
        DownloadJob::new(sa.url("/a.bin"), dir.path(), 1024),
        DownloadJob::new(sb.url("/b.bin"), dir.path(), 1024),
        DownloadJob::new(sb.url("/c.bin"), &blocker, 1024),
    ]);

    assert_eq!(report.len(), 3);
    assert_eq!(report.completed(), 2);
    assert_eq!(std::fs::read(dir.path().join("a.bin")).unwrap(), a);
    assert_eq!(std::fs::read(dir.path().join("b.bin")).unwrap(), b);
    assert!(matches!(
        report.get(&sb.url("/c.bin")),
        Some(DownloadResult::Failed {
            kind: FailureKind::InvalidTarget,
            ..
        })
    ));

    let last_tally = rx
        .try_iter()
        .filter(|e| matches!(e, DownloadEvent::Tally { .. }))
        .last();
    assert_eq!(
        last_tally,
        Some(DownloadEvent::Tally {
            completed: 2,
            finished: 3,
            total: 3
        })
    );
}

#[test]
fn two_sources_never_share_a_destination() {
    let a = vec![b'A'; 4000];
    let b = vec![b'B'; 4000];
    let cut_short = RangeServerOptions {
        truncate_first: 1,
        truncate_at: 1500,
        ..RangeServerOptions::default()
    };
    let sa = range_server::start_with_options(a.clone(), cut_short.clone());
    let sb = range_server::start_with_options(b.clone(), cut_short);
    let dir = tempdir().unwrap();
    let c = Coordinator::new(
        EngineConfig {
            worker_limit: 2,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(500),
                max_delay: Duration::from_millis(500),
            },
            ..EngineConfig::default()
        },
        Arc::new(DirectSessionProvider::new()),
        Arc::new(NullSink),
        CancelToken::new(),
    );

    let url_a = sa.url("/mirror1/data.zip");
    let url_b = sb.url("/mirror2/data.zip");
    let report = c.run(vec![
        DownloadJob::new(url_a.clone(), dir.path(), 1024),
        DownloadJob::new(url_b.clone(), dir.path(), 1024),
    ]);

    assert_eq!(report.completed(), 1);
    assert_eq!(report.failed(), 1);
    let (winner, loser, winner_data, loser_server) = match report.get(&url_a) {
        Some(DownloadResult::Completed { .. }) => (&url_a, &url_b, &a, &sb),
        _ => (&url_b, &url_a, &b, &sa),
    };
    assert_eq!(std::fs::read(dir.path().join("data.zip")).unwrap(), *winner_data);
    match report.get(loser) {
        Some(DownloadResult::Failed { kind, detail, .. }) => {
            assert_eq!(*kind, FailureKind::InvalidTarget);
            assert!(detail.contains(winner.as_str()), "{detail}");
        }
        other => panic!("expected the second source to fail, got {other:?}"),
    }
    assert_eq!(loser_server.get_count(), 0);
}

#[test]
fn proxy_failure_requeues_without_spending_retries() {
    let data = vec![7u8; 1200];
    let server = range_server::start(data.clone());
    let dir = tempdir().unwrap();
    let proxy = Arc::new(FlakyProxy::new(2));
    let (tx, rx) = mpsc::channel();
    let c = Coordinator::new(
        EngineConfig {
            retry: RetryPolicy::immediate(1),
            max_session_requeues: 5,
            ..engine()
        },
        proxy.clone(),
        Arc::new(ChannelSink::new(tx)),
        CancelToken::new(),
    );

    let url = server.url("/p.bin");
    let report = c.run(vec![DownloadJob::new(url.clone(), dir.path(), 1024)]);

    assert_eq!(
        report.get(&url),
        Some(&DownloadResult::Completed {
            path: dir.path().join("p.bin")
        })
    );
    assert_eq!(report.requeues, 2);
    assert_eq!(proxy.calls.load(Ordering::SeqCst), 3);
    assert_eq!(server.get_count(), 1);
    let requeues: Vec<u32> = rx
        .try_iter()
        .filter_map(|e| match e {
            DownloadEvent::Requeued { requeues, .. } => Some(requeues),
            _ => None,
        })
        .collect();
    assert_eq!(requeues, vec![1, 2]);
}
