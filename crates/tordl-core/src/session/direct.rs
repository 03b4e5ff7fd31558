use std::sync::atomic::{AtomicU64, Ordering};

use super::{SessionError, SessionProvider, WorkerSession};

/// Sessions without a proxy. Used for clearnet URLs and by tests.
#[derive(Debug, Default)]
pub struct DirectSessionProvider {
    next_id: AtomicU64,
}

impl DirectSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionProvider for DirectSessionProvider {
    fn get_session(&self) -> Result<WorkerSession, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(WorkerSession::new(id, None))
    }
}
