//! JSON configuration file.
//!
//! Relative paths are resolved against the directory holding the file.
//!
//! ```json
//! {
//!   "data_dir": "data",
//!   "remote_db": "remote.sqlite",
//!   "sync_interval_ms": 300000,
//!   "max_retries": 3,
//!   "conflict_policy": "remote_wins",
//!   "entities": [{ "type": "Task", "file": "tasks.csv", "table": "task" }]
//! }
//! ```

use crate::error::{CliError, CliResult};
use edusync_core::{ConflictPolicy, Entity, EntityBinding, EntityRegistry, Project, Task};
use edusync_sync_engine::{NetworkConfig, RetryConfig, SyncConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Directory holding the local CSV files.
    pub data_dir: PathBuf,
    /// SQLite database acting as the remote store.
    pub remote_db: PathBuf,
    /// Remote host probed before each cycle. No probe when absent.
    pub remote_host: Option<String>,
    /// Remote port probed before each cycle.
    pub remote_port: u16,
    /// Well-known host probed first. No probe when null.
    pub reachability_host: Option<String>,
    /// Timeout of each reachability probe.
    pub probe_timeout_ms: u64,
    /// Delay between cycles.
    pub sync_interval_ms: u64,
    /// Retries of transient remote failures.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub retry_initial_delay_ms: u64,
    /// Upper bound of the retry delay.
    pub retry_max_delay_ms: u64,
    /// Retries of local lock conflicts.
    pub lock_retries: u32,
    /// Conflict resolution rule.
    pub conflict_policy: ConflictPolicy,
    /// Synchronized entity types. Every known type when empty.
    pub entities: Vec<EntityEntry>,
}

/// One entity type in the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityEntry {
    /// Entity type name, e.g. `Task`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Local file, relative to `data_dir`.
    pub file: Option<PathBuf>,
    /// Remote table.
    pub table: Option<String>,
}

impl Default for FileConfig {
    fn default() -> Self {
        let sync = SyncConfig::default();
        Self {
            data_dir: PathBuf::from("data"),
            remote_db: PathBuf::from("remote.sqlite"),
            remote_host: None,
            remote_port: sync.network.remote_port,
            reachability_host: sync.network.reachability_host.clone(),
            probe_timeout_ms: millis(sync.network.probe_timeout),
            sync_interval_ms: millis(sync.sync_interval),
            max_retries: sync.retry.max_retries,
            retry_initial_delay_ms: millis(sync.retry.initial_delay),
            retry_max_delay_ms: millis(sync.retry.max_delay),
            lock_retries: sync.lock_retry.max_retries,
            conflict_policy: sync.conflict_policy,
            entities: Vec::new(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl FileConfig {
    /// Loads a configuration file and resolves its relative paths.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: FileConfig =
            serde_json::from_str(&text).map_err(|source| CliError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.data_dir = base.join(&config.data_dir);
        config.remote_db = base.join(&config.remote_db);
        Ok(config)
    }

    /// Builds the engine configuration.
    ///
    /// # Errors
    ///
    /// Fails if an option is out of range.
    pub fn sync_config(&self) -> CliResult<SyncConfig> {
        let host = self.remote_host.as_deref().unwrap_or("localhost");
        let network = NetworkConfig::new(host, self.remote_port)
            .with_probe_timeout(Duration::from_millis(self.probe_timeout_ms))
            .with_reachability_host(self.reachability_host.clone());
        let retry = RetryConfig::new(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms));
        let lock_retry = SyncConfig::default().lock_retry;

        let config = SyncConfig::new(host, self.remote_port)
            .with_sync_interval(Duration::from_millis(self.sync_interval_ms))
            .with_retry(retry)
            .with_lock_retry(RetryConfig {
                max_retries: self.lock_retries,
                ..lock_retry
            })
            .with_network(network)
            .with_conflict_policy(self.conflict_policy);
        config.validate()?;
        Ok(config)
    }

    /// Builds the entity registry.
    ///
    /// # Errors
    ///
    /// Fails on unknown types and on types sharing a file or table.
    pub fn registry(&self) -> CliResult<EntityRegistry> {
        let mut registry = EntityRegistry::new();
        if self.entities.is_empty() {
            registry.register_conventional::<Task>(&self.data_dir)?;
            registry.register_conventional::<Project>(&self.data_dir)?;
            return Ok(registry);
        }

        for entry in &self.entities {
            let binding = match entry.type_name.as_str() {
                Task::TYPE_NAME => self.binding::<Task>(entry),
                Project::TYPE_NAME => self.binding::<Project>(entry),
                other => return Err(CliError::UnsupportedEntity(other.to_string())),
            };
            registry.register(binding)?;
        }
        Ok(registry)
    }

    fn binding<T: Entity>(&self, entry: &EntityEntry) -> EntityBinding {
        let conventional = EntityBinding::conventional::<T>(&self.data_dir);
        EntityBinding::new::<T>(
            entry
                .file
                .as_ref()
                .map(|f| self.data_dir.join(f))
                .unwrap_or(conventional.local_path),
            entry.table.clone().unwrap_or(conventional.remote_table),
        )
    }
}
