//! CLI command implementations.

pub mod once;
pub mod recover;
pub mod run;

use crate::config::FileConfig;
use crate::error::{CliError, CliResult};
use edusync_core::{Entity, EntityBinding, EntityRegistry, Project, Task};
use edusync_storage::TransactionalFileStore;
use edusync_sync_engine::{
    EntitySynchronizer, NetworkProbe, RemoteClient, SqliteRemoteClient, StaticNetworkProbe,
    SyncConfig, SyncOrchestrator, SyncStatusTracker, Synchronizer, TcpNetworkChecker,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Everything built from the configuration file at startup.
pub struct App {
    /// File options.
    pub file: FileConfig,
    /// Engine options.
    pub sync: SyncConfig,
    /// Entity bindings.
    pub registry: EntityRegistry,
    /// Local transactional store.
    pub store: TransactionalFileStore,
}

impl App {
    /// Loads the configuration and creates the data directory.
    pub fn load(config_path: &Path) -> CliResult<Self> {
        let file = FileConfig::load(config_path)?;
        let app = Self {
            sync: file.sync_config()?,
            registry: file.registry()?,
            store: TransactionalFileStore::new(),
            file,
        };
        fs::create_dir_all(&app.file.data_dir)?;
        Ok(app)
    }

    /// Like [`App::load`], then restores any interrupted transaction.
    pub fn open(config_path: &Path) -> CliResult<Self> {
        let app = Self::load(config_path)?;
        app.recover()?;
        Ok(app)
    }

    /// Restores orphaned backups of every registered file.
    pub fn recover(&self) -> CliResult<Vec<PathBuf>> {
        let restored = self.store.recover(self.registry.local_paths())?;
        for path in &restored {
            info!(path = %path.display(), "restored interrupted transaction");
        }
        Ok(restored)
    }

    /// Builds an orchestrator over the configured remote database.
    pub fn orchestrator(&self) -> CliResult<SyncOrchestrator> {
        let client: Arc<dyn RemoteClient> =
            Arc::new(SqliteRemoteClient::open(&self.file.remote_db)?);
        let network: Arc<dyn NetworkProbe> = match self.file.remote_host {
            Some(_) => Arc::new(TcpNetworkChecker::new(self.sync.network.clone())),
            None => Arc::new(StaticNetworkProbe::new(true)),
        };

        let mut orchestrator = SyncOrchestrator::new(network, Arc::new(SyncStatusTracker::new()));
        for binding in self.registry.iter() {
            orchestrator.add_synchronizer(self.synchronizer(binding, Arc::clone(&client))?);
        }
        Ok(orchestrator)
    }

    fn synchronizer(
        &self,
        binding: &EntityBinding,
        client: Arc<dyn RemoteClient>,
    ) -> CliResult<Box<dyn Synchronizer>> {
        let store = &self.store;
        let sync = &self.sync;
        let synchronizer: Box<dyn Synchronizer> = match binding.type_name {
            Task::TYPE_NAME => Box::new(EntitySynchronizer::<Task>::for_binding(
                binding, store, client, sync,
            )),
            Project::TYPE_NAME => Box::new(EntitySynchronizer::<Project>::for_binding(
                binding, store, client, sync,
            )),
            other => return Err(CliError::UnsupportedEntity(other.to_string())),
        };
        Ok(synchronizer)
    }
}
