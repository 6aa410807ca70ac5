//! Error types for the sync engine.

use crate::orchestrator::CycleReport;
use edusync_storage::StoreError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failure reported by a remote relational client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The operation may succeed if repeated (busy store, dropped link).
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// The operation will not succeed if repeated (constraint, schema).
    #[error("remote failure: {0}")]
    Fatal(String),
}

impl RemoteError {
    /// Creates a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Returns true if the operation may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

/// Errors that can occur during synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote endpoint is unreachable. The cycle was skipped.
    #[error("remote endpoint unreachable")]
    NetworkUnavailable,

    /// A cycle was triggered while another one was still running.
    #[error("a sync cycle is already in progress")]
    CycleInProgress,

    /// Local transactional storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A local file could not be decoded or encoded as a whole.
    #[error("local data error in {}: {reason}", path.display())]
    LocalData {
        /// The local file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The remote store rejected an operation.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Transient remote failures outlasted the retry bound.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last failure.
        #[source]
        last: RemoteError,
    },

    /// Synchronization of one entity type failed.
    #[error("failed to synchronize {entity}: {source}")]
    EntitySync {
        /// The entity type name.
        entity: String,
        /// The underlying failure.
        #[source]
        source: Box<SyncError>,
    },

    /// One or more entity types failed during a cycle.
    #[error(transparent)]
    Cycle(#[from] SynchronizationFailure),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Wraps an error as the failure of one entity type.
    pub fn entity(entity: impl Into<String>, source: SyncError) -> Self {
        Self::EntitySync {
            entity: entity.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if a later cycle may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::NetworkUnavailable
            | SyncError::CycleInProgress
            | SyncError::RetriesExhausted { .. } => true,
            SyncError::Store(e) => e.is_retryable(),
            SyncError::Remote(e) => e.is_transient(),
            SyncError::EntitySync { source, .. } => source.is_retryable(),
            SyncError::Cycle(failure) => failure.failures.iter().all(|f| f.error.is_retryable()),
            SyncError::LocalData { .. } | SyncError::InvalidConfig(_) => false,
        }
    }

    /// Returns true if the cycle was skipped rather than attempted.
    pub fn is_skip(&self) -> bool {
        matches!(self, SyncError::NetworkUnavailable | SyncError::CycleInProgress)
    }
}

/// The failure of one entity type within a cycle.
#[derive(Debug)]
pub struct EntityFailure {
    /// The entity type name.
    pub entity: String,
    /// Why it failed.
    pub error: SyncError,
}

/// Aggregate of every entity failure in one cycle.
#[derive(Debug)]
pub struct SynchronizationFailure {
    /// Per-entity outcomes of the cycle, successes included.
    pub report: CycleReport,
    /// The failed entity types, in execution order.
    pub failures: Vec<EntityFailure>,
}

impl fmt::Display for SynchronizationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "synchronization failed for {} of {} entity types",
            self.failures.len(),
            self.report.entities.len()
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{}", failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for SynchronizationFailure {}
