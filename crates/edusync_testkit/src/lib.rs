//! # EduSync Testkit
//!
//! Test utilities for EduSync.
//!
//! This crate provides:
//! - [`SyncWorkspace`]: a temporary data directory with a registry, a
//!   transactional store and an in-memory remote, plus seeding helpers
//! - Fault injection: [`FlakyRemoteClient`] and [`FailingSynchronizer`]
//! - Property-based generators for records
//! - Lock contention stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use edusync_testkit::prelude::*;
//!
//! #[test]
//! fn sync_task() {
//!     let ws = SyncWorkspace::new();
//!     ws.seed_local(&numbered_tasks(1..=3));
//!     ws.synchronizer::<Task>(&test_config()).synchronize().unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use edusync_core::{Entity, Project, Task};
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
