//! Run command implementation.

use super::App;
use crate::error::CliResult;
use edusync_sync_engine::SyncScheduler;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Runs sync cycles on the configured interval until interrupted.
pub fn run(config_path: &Path) -> CliResult<()> {
    let app = App::open(config_path)?;
    let orchestrator = Arc::new(app.orchestrator()?);
    let interval = app.sync.sync_interval;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let handle = SyncScheduler::spawn(Arc::clone(&orchestrator), interval);
        let signal = tokio::signal::ctrl_c().await;
        info!("shutting down, waiting for the current cycle");
        handle.shutdown().await;

        let status = orchestrator.tracker().current_status();
        info!(
            completed = status.cycles_completed,
            failed = status.cycles_failed,
            skipped = status.cycles_skipped,
            "sync scheduler finished"
        );
        signal
    })?;
    Ok(())
}
