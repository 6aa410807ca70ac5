//! Sync cycles across every registered entity type.

use crate::error::{EntityFailure, SyncError, SyncResult, SynchronizationFailure};
use crate::network::NetworkProbe;
use crate::status::{SyncState, SyncStatusTracker};
use crate::synchronizer::{EntitySyncReport, Synchronizer};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of one entity type within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityCycleResult {
    /// The entity type name.
    pub entity: String,
    /// `Success` or `Failed`.
    pub state: SyncState,
    /// The report, if it succeeded.
    pub report: Option<EntitySyncReport>,
    /// The failure message, if it failed.
    pub error: Option<String>,
}

/// Result of one sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock time spent.
    pub duration: Duration,
    /// One result per entity type, in execution order.
    pub entities: Vec<EntityCycleResult>,
}

impl CycleReport {
    /// Returns true if every entity type succeeded.
    pub fn is_success(&self) -> bool {
        self.entities.iter().all(|e| e.state == SyncState::Success)
    }
}

/// Drives sync cycles.
///
/// A cycle checks the network, then runs every synchronizer in
/// registration order. A failing synchronizer does not stop the others.
/// At most one cycle runs at a time; a cycle requested while another is
/// running is dropped.
pub struct SyncOrchestrator {
    network: Arc<dyn NetworkProbe>,
    tracker: Arc<SyncStatusTracker>,
    synchronizers: Vec<Box<dyn Synchronizer>>,
    in_flight: AtomicBool,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with no synchronizers.
    pub fn new(network: Arc<dyn NetworkProbe>, tracker: Arc<SyncStatusTracker>) -> Self {
        Self {
            network,
            tracker,
            synchronizers: Vec::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Adds a synchronizer. Synchronizers run in the order they are added.
    pub fn with_synchronizer(mut self, synchronizer: impl Synchronizer + 'static) -> Self {
        self.synchronizers.push(Box::new(synchronizer));
        self
    }

    /// Adds a boxed synchronizer.
    pub fn add_synchronizer(&mut self, synchronizer: Box<dyn Synchronizer>) {
        self.synchronizers.push(synchronizer);
    }

    /// Returns the status tracker.
    pub fn tracker(&self) -> &Arc<SyncStatusTracker> {
        &self.tracker
    }

    /// Returns the entity type names in execution order.
    pub fn entity_types(&self) -> Vec<&str> {
        self.synchronizers.iter().map(|s| s.entity_type()).collect()
    }

    /// Returns true while a cycle is running.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one cycle.
    ///
    /// # Errors
    ///
    /// - [`SyncError::CycleInProgress`] if another cycle is running. Nothing
    ///   is recorded.
    /// - [`SyncError::NetworkUnavailable`] if the remote is unreachable. The
    ///   tracker only counts the skip.
    /// - [`SyncError::Cycle`] if any entity type failed. The tracker records
    ///   `Failed`.
    pub fn run_cycle(&self) -> SyncResult<CycleReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sync cycle already running, dropping trigger");
            return Err(SyncError::CycleInProgress);
        }
        let mut guard = CycleGuard {
            in_flight: &self.in_flight,
            tracker: &self.tracker,
            started: false,
        };

        if !self.network.is_available() {
            info!("remote unreachable, skipping sync cycle");
            self.tracker.sync_skipped();
            return Err(SyncError::NetworkUnavailable);
        }

        self.tracker.start_sync();
        guard.started = true;
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut entities = Vec::with_capacity(self.synchronizers.len());
        let mut failures = Vec::new();
        for synchronizer in &self.synchronizers {
            let entity = synchronizer.entity_type().to_string();
            match synchronizer.synchronize() {
                Ok(report) => {
                    info!(
                        entity = %entity,
                        merged = report.merged_count,
                        conflicts = report.conflicts,
                        "entity synchronized"
                    );
                    self.tracker.record_entity(&entity, None);
                    entities.push(EntityCycleResult {
                        entity,
                        state: SyncState::Success,
                        report: Some(report),
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(entity = %entity, error = %e, "entity synchronization failed");
                    self.tracker.record_entity(&entity, Some(&e));
                    entities.push(EntityCycleResult {
                        entity: entity.clone(),
                        state: SyncState::Failed,
                        report: None,
                        error: Some(e.to_string()),
                    });
                    failures.push(EntityFailure { entity, error: e });
                }
            }
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            duration: clock.elapsed(),
            entities,
        };
        guard.started = false;

        if failures.is_empty() {
            self.tracker.sync_completed();
            info!(entities = report.entities.len(), duration = ?report.duration, "sync cycle completed");
            Ok(report)
        } else {
            let failure = SynchronizationFailure { report, failures };
            error!(error = %failure, "sync cycle failed");
            self.tracker.sync_failed(&failure);
            Err(SyncError::Cycle(failure))
        }
    }
}

/// Clears the in-flight flag when a cycle ends, however it ends.
///
/// A cycle that unwinds after it started is recorded as failed.
struct CycleGuard<'a> {
    in_flight: &'a AtomicBool,
    tracker: &'a SyncStatusTracker,
    started: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.started {
            self.tracker.sync_failed(&"sync cycle aborted");
        }
        self.in_flight.store(false, Ordering::Release);
    }
}
