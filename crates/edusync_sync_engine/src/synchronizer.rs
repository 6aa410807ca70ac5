//! Reconciliation of one entity type between its local and remote ports.

use crate::config::{RetryConfig, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::local::{CsvLocalPort, LocalDataPort};
use crate::remote::{RelationalRemotePort, RemoteClient, RemoteDataPort};
use crate::retry::{run_with_retry, RetryError};
use edusync_core::{merge, ConflictPolicy, Entity, EntityBinding};
use edusync_storage::TransactionalFileStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// What one successful synchronization of an entity type did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySyncReport {
    /// The entity type name.
    pub entity: String,
    /// Records read locally.
    pub local_count: usize,
    /// Records read remotely.
    pub remote_count: usize,
    /// Records written to both sides.
    pub merged_count: usize,
    /// Records that differed between the sides.
    pub conflicts: usize,
    /// Records that existed only locally.
    pub local_only: usize,
    /// Records that existed only remotely.
    pub remote_only: usize,
    /// Wall-clock time spent.
    pub duration: Duration,
}

/// Synchronizes one entity type.
///
/// The orchestrator holds synchronizers for different entity types behind
/// this trait.
pub trait Synchronizer: Send + Sync {
    /// The entity type name.
    fn entity_type(&self) -> &str;

    /// Runs one synchronization.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EntitySync`] wrapping the cause.
    fn synchronize(&self) -> SyncResult<EntitySyncReport>;
}

/// Reads both sides of `T`, merges them, and writes the result back.
///
/// The local side is written first. A local write that hits a lock
/// conflict is retried per `lock_retry`. If either write fails the whole
/// call fails, and each side stays internally consistent through its own
/// transactional write.
pub struct EntitySynchronizer<T: Entity> {
    local: Arc<dyn LocalDataPort<T>>,
    remote: Arc<dyn RemoteDataPort<T>>,
    policy: ConflictPolicy,
    lock_retry: RetryConfig,
}

impl<T: Entity> EntitySynchronizer<T> {
    /// Creates a synchronizer over the given ports.
    pub fn new(local: Arc<dyn LocalDataPort<T>>, remote: Arc<dyn RemoteDataPort<T>>) -> Self {
        Self {
            local,
            remote,
            policy: ConflictPolicy::default(),
            lock_retry: SyncConfig::default().lock_retry,
        }
    }

    /// Creates a synchronizer for a registered binding, using a CSV file
    /// through `store` and a table through `client`.
    pub fn for_binding(
        binding: &EntityBinding,
        store: &TransactionalFileStore,
        client: Arc<dyn RemoteClient>,
        config: &SyncConfig,
    ) -> Self {
        let local = CsvLocalPort::<T>::new(store.clone(), binding.local_path.clone());
        let remote =
            RelationalRemotePort::<T>::new(client, binding.remote_table.clone(), config.retry.clone());
        Self::new(Arc::new(local), Arc::new(remote))
            .with_policy(config.conflict_policy)
            .with_lock_retry(config.lock_retry.clone())
    }

    /// Sets the conflict policy.
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the lock-conflict retry policy.
    pub fn with_lock_retry(mut self, lock_retry: RetryConfig) -> Self {
        self.lock_retry = lock_retry;
        self
    }

    fn run(&self) -> SyncResult<EntitySyncReport> {
        let start = Instant::now();

        let local = self.local.read_all()?;
        let remote = self.remote.read_all()?;
        let outcome = merge(&local, &remote, self.policy);

        debug!(
            entity = T::TYPE_NAME,
            local = local.len(),
            remote = remote.len(),
            conflicts = outcome.conflicts.len(),
            policy = %self.policy,
            "merged records"
        );

        run_with_retry(
            &self.lock_retry,
            "local write",
            |e: &SyncError| matches!(e, SyncError::Store(s) if s.is_lock_conflict()),
            || self.local.write_all(&outcome.records),
        )
        .map_err(|e| match e {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        })?;

        self.remote.write_all(&outcome.records)?;

        Ok(EntitySyncReport {
            entity: T::TYPE_NAME.to_string(),
            local_count: local.len(),
            remote_count: remote.len(),
            merged_count: outcome.records.len(),
            conflicts: outcome.conflicts.len(),
            local_only: outcome.local_only,
            remote_only: outcome.remote_only,
            duration: start.elapsed(),
        })
    }
}

impl<T: Entity> Synchronizer for EntitySynchronizer<T> {
    fn entity_type(&self) -> &str {
        T::TYPE_NAME
    }

    fn synchronize(&self) -> SyncResult<EntitySyncReport> {
        self.run().map_err(|e| SyncError::entity(T::TYPE_NAME, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::remote::MemoryRemoteClient;
    use edusync_core::Task;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use uuid::Uuid;

    struct FixedRemote {
        records: Vec<Task>,
        written: Mutex<Option<Vec<Task>>>,
        fail_writes: bool,
    }

    impl RemoteDataPort<Task> for FixedRemote {
        fn read_all(&self) -> SyncResult<Vec<Task>> {
            Ok(self.records.clone())
        }

        fn write_all(&self, records: &[Task]) -> SyncResult<()> {
            if self.fail_writes {
                return Err(SyncError::Remote(RemoteError::fatal("constraint violated")));
            }
            *self.written.lock() = Some(records.to_vec());
            Ok(())
        }
    }

    fn fixed_remote(records: Vec<Task>, fail_writes: bool) -> Arc<FixedRemote> {
        Arc::new(FixedRemote {
            records,
            written: Mutex::new(None),
            fail_writes,
        })
    }

    fn task(n: u128, title: &str) -> Task {
        Task::new(title).with_id(Uuid::from_u128(n))
    }

    #[test]
    fn merges_and_writes_both_sides() {
        let dir = tempdir().unwrap();
        let local = Arc::new(CsvLocalPort::<Task>::new(
            TransactionalFileStore::new(),
            dir.path().join("tasks.csv"),
        ));
        local.write_all(&[task(1, "local one"), task(2, "local two")]).unwrap();

        let remote = fixed_remote(vec![task(2, "remote two"), task(3, "remote three")], false);
        let sync = EntitySynchronizer::<Task>::new(local.clone(), remote.clone());
        let report = sync.synchronize().unwrap();

        assert_eq!(report.entity, "Task");
        assert_eq!(report.merged_count, 3);
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.local_only, 1);
        assert_eq!(report.remote_only, 1);

        let titles: Vec<_> = local.read_all().unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["local one", "remote two", "remote three"]);
        assert_eq!(remote.written.lock().as_ref().unwrap().len(), 3);
    }

    #[test]
    fn remote_write_failure_fails_the_entity() {
        let dir = tempdir().unwrap();
        let local = Arc::new(CsvLocalPort::<Task>::new(
            TransactionalFileStore::new(),
            dir.path().join("tasks.csv"),
        ));
        let sync = EntitySynchronizer::<Task>::new(local, fixed_remote(vec![task(1, "r")], true));

        let err = sync.synchronize().unwrap_err();
        match err {
            SyncError::EntitySync { entity, source } => {
                assert_eq!(entity, "Task");
                assert!(matches!(*source, SyncError::Remote(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct ContendedLocal {
        conflicts_left: AtomicUsize,
    }

    impl LocalDataPort<Task> for ContendedLocal {
        fn read_all(&self) -> SyncResult<Vec<Task>> {
            Ok(Vec::new())
        }

        fn write_all(&self, _records: &[Task]) -> SyncResult<()> {
            let left = self.conflicts_left.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts_left.store(left - 1, Ordering::SeqCst);
                return Err(SyncError::Store(edusync_storage::StoreError::LockConflict {
                    path: "tasks.csv".into(),
                }));
            }
            Ok(())
        }
    }

    #[test]
    fn lock_conflicts_are_retried() {
        let local = Arc::new(ContendedLocal {
            conflicts_left: AtomicUsize::new(2),
        });
        let fast = RetryConfig::new(2)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false);
        let sync = EntitySynchronizer::<Task>::new(local.clone(), fixed_remote(Vec::new(), false))
            .with_lock_retry(fast);
        assert!(sync.synchronize().is_ok());

        local.conflicts_left.store(3, Ordering::SeqCst);
        let err = sync.synchronize().unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn binding_wires_csv_and_table() {
        let dir = tempdir().unwrap();
        let binding = EntityBinding::conventional::<Task>(dir.path());
        let client = Arc::new(MemoryRemoteClient::new());
        let sync = EntitySynchronizer::<Task>::for_binding(
            &binding,
            &TransactionalFileStore::new(),
            client.clone(),
            &SyncConfig::default(),
        );

        let remote = RelationalRemotePort::<Task>::new(client.clone(), "task", RetryConfig::new(1));
        remote.write_all(&[task(9, "from remote")]).unwrap();

        sync.synchronize().unwrap();
        assert!(binding.local_path.exists());
        assert_eq!(client.rows("task").unwrap().len(), 1);
    }
}
