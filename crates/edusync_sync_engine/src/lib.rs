//! # EduSync Sync Engine
//!
//! Background synchronization between local CSV files and a relational
//! remote store.
//!
//! This crate provides:
//! - [`NetworkProbe`] and [`TcpNetworkChecker`]: bounded reachability checks
//! - [`LocalDataPort`] and [`CsvLocalPort`]: typed, transactional access to
//!   one entity type's local file
//! - [`RemoteDataPort`] and [`RelationalRemotePort`]: typed access to one
//!   entity type's remote table with bounded retry
//! - [`EntitySynchronizer`]: read both sides, merge, write both sides
//! - [`SyncOrchestrator`]: one non-overlapping cycle across every entity
//!   type, with per-type fault isolation
//! - [`SyncStatusTracker`]: immutable status snapshots for observers
//! - [`SyncScheduler`]: fixed-delay execution on a tokio runtime
//!
//! ## Cycle
//!
//! 1. Probe the network. If unreachable, skip the cycle
//! 2. Mark the status `IN_PROGRESS`
//! 3. Run each synchronizer in turn; a failure is recorded and the next
//!    one still runs
//! 4. Mark the status `COMPLETED`, or `FAILED` with an aggregated error
//!
//! ## Error model
//!
//! Synchronizers return typed results. The orchestrator aggregates them
//! into a [`SynchronizationFailure`] instead of unwinding.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod local;
mod network;
mod orchestrator;
mod remote;
mod retry;
mod scheduler;
mod status;
mod synchronizer;

pub use config::{NetworkConfig, RetryConfig, SyncConfig};
pub use error::{EntityFailure, RemoteError, SyncError, SyncResult, SynchronizationFailure};
pub use local::{CsvLocalPort, LocalDataPort};
pub use network::{NetworkProbe, StaticNetworkProbe, TcpNetworkChecker};
pub use orchestrator::{CycleReport, EntityCycleResult, SyncOrchestrator};
pub use remote::{
    MemoryRemoteClient, RelationalRemotePort, RemoteClient, RemoteDataPort, SqliteRemoteClient,
};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use status::{EntityStatus, SyncState, SyncStatus, SyncStatusTracker};
pub use synchronizer::{EntitySyncReport, EntitySynchronizer, Synchronizer};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
