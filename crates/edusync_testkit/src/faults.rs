//! Fault injection for remote clients and synchronizers.

use edusync_sync_engine::{
    EntitySyncReport, RemoteClient, RemoteError, SyncError, SyncResult, Synchronizer,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Kind of injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A retryable failure.
    Transient,
    /// A non-retryable failure.
    Fatal,
}

impl FaultKind {
    fn error(self, what: &str) -> RemoteError {
        match self {
            FaultKind::Transient => RemoteError::transient(format!("injected {what} failure")),
            FaultKind::Fatal => RemoteError::fatal(format!("injected {what} failure")),
        }
    }
}

#[derive(Debug, Default)]
struct Fault {
    remaining: AtomicU32,
    fatal: AtomicBool,
}

impl Fault {
    fn arm(&self, times: u32, kind: FaultKind) {
        self.fatal.store(kind == FaultKind::Fatal, Ordering::SeqCst);
        self.remaining.store(times, Ordering::SeqCst);
    }

    fn take(&self, what: &str) -> Option<RemoteError> {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()?;
        let kind = if self.fatal.load(Ordering::SeqCst) {
            FaultKind::Fatal
        } else {
            FaultKind::Transient
        };
        Some(kind.error(what))
    }
}

/// A [`RemoteClient`] that fails a configured number of times before
/// delegating to an inner client.
#[derive(Debug)]
pub struct FlakyRemoteClient<C> {
    inner: Arc<C>,
    reads: Fault,
    writes: Fault,
    fetch_calls: AtomicU32,
    upsert_calls: AtomicU32,
}

impl<C: RemoteClient> FlakyRemoteClient<C> {
    /// Wraps `inner` with no failures armed.
    pub fn wrap(inner: Arc<C>) -> Self {
        Self {
            inner,
            reads: Fault::default(),
            writes: Fault::default(),
            fetch_calls: AtomicU32::new(0),
            upsert_calls: AtomicU32::new(0),
        }
    }

    /// Makes the next `times` reads fail.
    pub fn fail_reads(&self, times: u32, kind: FaultKind) {
        self.reads.arm(times, kind);
    }

    /// Makes the next `times` writes fail.
    pub fn fail_writes(&self, times: u32, kind: FaultKind) {
        self.writes.arm(times, kind);
    }

    /// Returns how many reads were attempted.
    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Returns how many writes were attempted.
    pub fn upsert_calls(&self) -> u32 {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

impl<C: RemoteClient> RemoteClient for FlakyRemoteClient<C> {
    fn fetch_all(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<String>>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.reads.take("read") {
            Some(err) => Err(err),
            None => self.inner.fetch_all(table, columns),
        }
    }

    fn upsert_all(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<String>],
    ) -> Result<(), RemoteError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        match self.writes.take("write") {
            Some(err) => Err(err),
            None => self.inner.upsert_all(table, columns, rows),
        }
    }
}

/// A [`Synchronizer`] that always fails, counting its calls.
#[derive(Debug)]
pub struct FailingSynchronizer {
    entity: &'static str,
    calls: Arc<AtomicU32>,
}

impl FailingSynchronizer {
    /// Creates a failing synchronizer for `entity`.
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Returns a shared counter of calls.
    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

impl Synchronizer for FailingSynchronizer {
    fn entity_type(&self) -> &str {
        self.entity
    }

    fn synchronize(&self) -> SyncResult<EntitySyncReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SyncError::entity(
            self.entity,
            SyncError::Remote(FaultKind::Fatal.error("synchronize")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edusync_sync_engine::MemoryRemoteClient;

    #[test]
    fn fails_then_delegates() {
        let flaky = FlakyRemoteClient::wrap(Arc::new(MemoryRemoteClient::new()));
        flaky.fail_writes(2, FaultKind::Transient);

        let rows = vec![vec!["1".to_string()]];
        assert!(flaky.upsert_all("t", &["id"], &rows).unwrap_err().is_transient());
        assert!(flaky.upsert_all("t", &["id"], &rows).is_err());
        assert!(flaky.upsert_all("t", &["id"], &rows).is_ok());
        assert_eq!(flaky.upsert_calls(), 3);
        assert_eq!(flaky.fetch_all("t", &["id"]).unwrap(), rows);
    }

    #[test]
    fn failing_synchronizer_counts_calls() {
        let sync = FailingSynchronizer::new("Project");
        let calls = sync.calls();
        assert!(sync.synchronize().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
