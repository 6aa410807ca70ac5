//! Periodic background execution of sync cycles.

use crate::orchestrator::SyncOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Runs sync cycles on a fixed delay.
///
/// The first cycle starts immediately. Each following cycle starts
/// `interval` after the previous one finished, so cycles never overlap.
/// Cycles run on the blocking thread pool.
#[derive(Debug)]
pub struct SyncScheduler;

impl SyncScheduler {
    /// Spawns the scheduling loop on the current tokio runtime.
    pub fn spawn(orchestrator: Arc<SyncOrchestrator>, interval: Duration) -> SchedulerHandle {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(interval = ?interval, "sync scheduler started");
            loop {
                let cycle = Arc::clone(&orchestrator);
                match tokio::task::spawn_blocking(move || cycle.run_cycle()).await {
                    Ok(Ok(report)) => {
                        debug!(entities = report.entities.len(), "scheduled cycle finished");
                    }
                    Ok(Err(e)) if e.is_skip() => debug!(reason = %e, "scheduled cycle skipped"),
                    Ok(Err(e)) => warn!(error = %e, "scheduled cycle failed"),
                    Err(e) => error!(error = %e, "scheduled cycle aborted"),
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop.changed() => break,
                }
            }
            info!("sync scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }
}

/// Handle to a running [`SyncScheduler`] loop.
///
/// Dropping the handle also stops the loop after the current cycle.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop and waits for it to exit.
    ///
    /// A cycle in progress runs to completion first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync scheduler task ended abnormally");
        }
    }

    /// Returns true if the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StaticNetworkProbe;
    use crate::status::SyncStatusTracker;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_repeatedly_until_shutdown() {
        let probe = Arc::new(StaticNetworkProbe::new(false));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            probe.clone(),
            Arc::new(SyncStatusTracker::new()),
        ));

        let handle = SyncScheduler::spawn(Arc::clone(&orchestrator), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;

        let checks = probe.checks();
        assert!(checks >= 2, "only {checks} cycles ran");
        assert_eq!(
            orchestrator.tracker().current_status().cycles_skipped,
            checks
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(probe.checks(), checks);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_interrupts_the_delay() {
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(StaticNetworkProbe::new(true)),
            Arc::new(SyncStatusTracker::new()),
        ));

        let handle = SyncScheduler::spawn(orchestrator, Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown should not wait for the interval");
    }
}
