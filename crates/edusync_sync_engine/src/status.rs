//! Synchronization status tracking.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// State of the synchronization process, or of one entity type.
///
/// The process starts `Idle`, enters `InProgress` for each cycle and ends
/// it in `Completed` or `Failed`, where it rests until the next cycle. A
/// finished cycle never returns to `Idle`, so the last outcome stays
/// readable. Per-entity results are recorded as `Success` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// No cycle has run yet. Only ever the state before the first cycle.
    Idle,
    /// A cycle is running.
    InProgress,
    /// An entity type synchronized successfully.
    Success,
    /// The last cycle finished without failures.
    Completed,
    /// The last cycle, or entity type, failed.
    Failed,
}

impl SyncState {
    /// Returns the display name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "IDLE",
            SyncState::InProgress => "IN_PROGRESS",
            SyncState::Success => "SUCCESS",
            SyncState::Completed => "COMPLETED",
            SyncState::Failed => "FAILED",
        }
    }

    /// Returns true while a cycle is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::InProgress)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last recorded result for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityStatus {
    /// `Success` or `Failed`.
    pub state: SyncState,
    /// When the result was recorded.
    pub at: DateTime<Utc>,
    /// The failure message, if it failed.
    pub error: Option<String>,
}

/// Immutable snapshot of the synchronization status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Current state.
    pub state: SyncState,
    /// Start of the most recent cycle.
    pub last_sync_attempt: Option<DateTime<Utc>>,
    /// End of the most recent cycle that completed without failures.
    pub last_successful_sync: Option<DateTime<Utc>>,
    /// Message of the most recent failure, cleared by a successful cycle.
    pub last_error: Option<String>,
    /// Last result per entity type.
    pub entities: BTreeMap<String, EntityStatus>,
    /// Cycles that finished without failures.
    pub cycles_completed: u64,
    /// Cycles that finished with at least one failure.
    pub cycles_failed: u64,
    /// Cycles skipped because the remote was unreachable.
    pub cycles_skipped: u64,
}

impl SyncStatus {
    fn idle() -> Self {
        Self {
            state: SyncState::Idle,
            last_sync_attempt: None,
            last_successful_sync: None,
            last_error: None,
            entities: BTreeMap::new(),
            cycles_completed: 0,
            cycles_failed: 0,
            cycles_skipped: 0,
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::idle()
    }
}

/// Holds the current [`SyncStatus`].
///
/// Writers replace the whole snapshot under a short write lock. Readers
/// clone an `Arc` and never observe a partially updated status.
#[derive(Debug, Default)]
pub struct SyncStatusTracker {
    current: RwLock<Arc<SyncStatus>>,
}

impl SyncStatusTracker {
    /// Creates a tracker in the `Idle` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot.
    pub fn current_status(&self) -> Arc<SyncStatus> {
        Arc::clone(&self.current.read())
    }

    /// Marks the start of a cycle.
    pub fn start_sync(&self) {
        self.update(|status| {
            status.state = SyncState::InProgress;
            status.last_sync_attempt = Some(Utc::now());
        });
    }

    /// Marks the end of a cycle without failures.
    pub fn sync_completed(&self) {
        self.update(|status| {
            status.state = SyncState::Completed;
            status.last_successful_sync = Some(Utc::now());
            status.last_error = None;
            status.cycles_completed += 1;
        });
    }

    /// Marks the end of a cycle with failures.
    pub fn sync_failed(&self, error: &dyn fmt::Display) {
        let message = error.to_string();
        self.update(|status| {
            status.state = SyncState::Failed;
            status.last_error = Some(message);
            status.cycles_failed += 1;
        });
    }

    /// Counts a cycle skipped because the remote was unreachable.
    ///
    /// The state and timestamps are left untouched.
    pub fn sync_skipped(&self) {
        self.update(|status| status.cycles_skipped += 1);
    }

    /// Records the result of one entity type.
    pub fn record_entity(&self, entity: &str, error: Option<&dyn fmt::Display>) {
        let entry = EntityStatus {
            state: if error.is_some() {
                SyncState::Failed
            } else {
                SyncState::Success
            },
            at: Utc::now(),
            error: error.map(|e| e.to_string()),
        };
        self.update(|status| {
            status.entities.insert(entity.to_string(), entry);
        });
    }

    fn update(&self, f: impl FnOnce(&mut SyncStatus)) {
        let mut guard = self.current.write();
        let mut next = SyncStatus::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }
}
