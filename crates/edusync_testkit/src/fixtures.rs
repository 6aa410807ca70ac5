//! Test fixtures and workspace helpers.
//!
//! Provides a temporary data directory wired to a transactional store and
//! an in-memory remote, with helpers to seed and inspect both sides.

use chrono::{DateTime, TimeZone, Utc};
use edusync_core::{Entity, EntityRegistry, Project, Task};
use edusync_storage::TransactionalFileStore;
use edusync_sync_engine::{
    CsvLocalPort, EntitySynchronizer, LocalDataPort, MemoryRemoteClient, RelationalRemotePort,
    RemoteClient, RemoteDataPort, RetryConfig, SyncConfig,
};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// A temporary sync workspace with automatic cleanup.
///
/// `Task` and `Project` are registered with their conventional bindings
/// (`tasks.csv` / `task`, `projects.csv` / `project`).
pub struct SyncWorkspace {
    dir: TempDir,
    store: TransactionalFileStore,
    remote: Arc<MemoryRemoteClient>,
    registry: EntityRegistry,
}

impl SyncWorkspace {
    /// Creates a new workspace.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let mut registry = EntityRegistry::new();
        registry
            .register_conventional::<Task>(dir.path())
            .expect("Failed to register Task");
        registry
            .register_conventional::<Project>(dir.path())
            .expect("Failed to register Project");

        Self {
            dir,
            store: TransactionalFileStore::new(),
            remote: Arc::new(MemoryRemoteClient::new()),
            registry,
        }
    }

    /// Returns the data directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the shared transactional store.
    pub fn store(&self) -> &TransactionalFileStore {
        &self.store
    }

    /// Returns the in-memory remote.
    pub fn remote(&self) -> &Arc<MemoryRemoteClient> {
        &self.remote
    }

    /// Returns the entity registry.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Returns the local file path of `T`.
    pub fn local_path<T: Entity>(&self) -> PathBuf {
        self.registry
            .binding::<T>()
            .expect("Entity type not registered")
            .local_path
            .clone()
    }

    fn remote_table<T: Entity>(&self) -> String {
        self.registry
            .binding::<T>()
            .expect("Entity type not registered")
            .remote_table
            .clone()
    }

    /// Returns a CSV port for `T`.
    pub fn local_port<T: Entity>(&self) -> CsvLocalPort<T> {
        CsvLocalPort::new(self.store.clone(), self.local_path::<T>())
    }

    /// Returns a remote port for `T` over the in-memory remote.
    pub fn remote_port<T: Entity>(&self) -> RelationalRemotePort<T> {
        RelationalRemotePort::new(self.remote.clone(), self.remote_table::<T>(), fast_retry(1))
    }

    /// Replaces the local file of `T` with `records`.
    pub fn seed_local<T: Entity>(&self, records: &[T]) {
        self.local_port::<T>()
            .write_all(records)
            .expect("Failed to seed local records");
    }

    /// Upserts `records` into the remote table of `T`.
    pub fn seed_remote<T: Entity>(&self, records: &[T]) {
        self.remote_port::<T>()
            .write_all(records)
            .expect("Failed to seed remote records");
    }

    /// Reads the local records of `T`.
    pub fn read_local<T: Entity>(&self) -> Vec<T> {
        self.local_port::<T>()
            .read_all()
            .expect("Failed to read local records")
    }

    /// Reads the remote records of `T`.
    pub fn read_remote<T: Entity>(&self) -> Vec<T> {
        self.remote_port::<T>()
            .read_all()
            .expect("Failed to read remote records")
    }

    /// Returns a synchronizer for `T` over the in-memory remote.
    pub fn synchronizer<T: Entity>(&self, config: &SyncConfig) -> EntitySynchronizer<T> {
        self.synchronizer_with_client(self.remote.clone(), config)
    }

    /// Returns a synchronizer for `T` over another remote client.
    pub fn synchronizer_with_client<T: Entity>(
        &self,
        client: Arc<dyn RemoteClient>,
        config: &SyncConfig,
    ) -> EntitySynchronizer<T> {
        let binding = self
            .registry
            .binding::<T>()
            .expect("Entity type not registered");
        EntitySynchronizer::for_binding(binding, &self.store, client, config)
    }
}

impl Default for SyncWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed modification time used by generated records.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0)
        .single()
        .expect("Invalid fixed time")
}

/// Returns tasks whose ids are `Uuid::from_u128(n)` for each `n` in `ids`.
pub fn numbered_tasks(ids: RangeInclusive<u128>) -> Vec<Task> {
    ids.map(|n| {
        Task::new(format!("Task {n}"))
            .with_id(Uuid::from_u128(n))
            .with_updated_at(fixed_time())
    })
    .collect()
}

/// Returns a retry configuration with millisecond delays and no jitter.
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig::new(max_retries)
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(10))
        .with_jitter(false)
}

/// Returns a sync configuration suitable for tests.
pub fn test_config() -> SyncConfig {
    SyncConfig::new("127.0.0.1", 5432)
        .with_sync_interval(Duration::from_millis(20))
        .with_retry(fast_retry(3))
        .with_lock_retry(fast_retry(3))
}
