//! Cancellation and exclusive access to destination files.
//!
//! A [`CancelToken`] is shared by the CLI's signal handler, the coordinator,
//! and every transfer; once set, no new job starts and running transfers stop
//! at the next chunk boundary. [`DestinationLocks`] guarantees a single writer
//! and a single source URL per destination path across all workers of one
//! batch.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Shared cancellation flag. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `dur`, waking early if cancelled. Returns true if cancelled.
    pub fn sleep(&self, dur: Duration) -> bool {
        const STEP: Duration = Duration::from_millis(100);
        let deadline = Instant::now() + dur;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(STEP.min(deadline - now));
        }
    }
}

/// Why [`DestinationLocks::acquire`] gave up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("cancelled while waiting for the destination")]
    Cancelled,
    /// Another URL claimed this destination first.
    #[error("destination already belongs to {owner}")]
    Claimed { owner: String },
}

#[derive(Debug, Default)]
struct LockTable {
    held: HashSet<PathBuf>,
    /// First URL to ask for each destination. Claims outlive the guards.
    owners: HashMap<PathBuf, String>,
}

/// Registry of destination paths: who owns each one, and whether a writer
/// holds it right now.
///
/// A destination belongs to the first URL that asks for it; any other URL
/// is refused for as long as the registry lives, so two sources never end
/// up in one file.
#[derive(Debug, Default)]
pub struct DestinationLocks {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl DestinationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` for `owner`, block until no other writer holds it, then
    /// hold it until the guard drops.
    pub fn acquire(
        &self,
        path: &Path,
        owner: &str,
        cancel: &CancelToken,
    ) -> Result<DestinationGuard<'_>, LockError> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        match table.owners.get(path) {
            Some(first) if first != owner => {
                return Err(LockError::Claimed {
                    owner: first.clone(),
                })
            }
            Some(_) => {}
            None => {
                table.owners.insert(path.to_path_buf(), owner.to_string());
            }
        }
        loop {
            if cancel.is_cancelled() {
                return Err(LockError::Cancelled);
            }
            if !table.held.contains(path) {
                table.held.insert(path.to_path_buf());
                return Ok(DestinationGuard {
                    locks: self,
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!(path = %path.display(), "destination busy, waiting for current writer");
            // Timed wait so a cancellation is noticed even without a release.
            table = self
                .released
                .wait_timeout(table, Duration::from_millis(200))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// True if some writer currently holds `path`.
    pub fn is_held(&self, path: &Path) -> bool {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .held
            .contains(path)
    }

    fn release(&self, path: &Path) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .held
            .remove(path);
        self.released.notify_all();
    }
}

/// Releases the destination when dropped.
#[derive(Debug)]
pub struct DestinationGuard<'a> {
    locks: &'a DestinationLocks,
    path: PathBuf,
}

impl DestinationGuard<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DestinationGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.path);
    }
}
