//! # EduSync Core
//!
//! Entity model shared by the EduSync sync engine.
//!
//! This crate provides:
//! - The [`Entity`] trait: an explicit per-type schema (ordered columns
//!   plus encode/decode functions) so flat-file and relational encodings
//!   are total and statically checked
//! - [`EntityRegistry`]: the static mapping from entity type to local file
//!   and remote table, configured once at startup
//! - [`ConflictPolicy`] and [`merge`]: the reconciliation rule applied to
//!   records present on both sides
//! - The application's synchronized records ([`Task`], [`Project`])
//!
//! The sync core treats records as opaque payloads keyed by their UUID.
//! Business validation happens before records reach this layer.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod conflict;
mod entity;
mod error;
pub mod model;
mod registry;

pub use conflict::{merge, ConflictPolicy, MergeOutcome};
pub use entity::{Entity, Row};
pub use error::{CoreError, CoreResult};
pub use model::{Project, ProjectStatus, Task, TaskStatus};
pub use registry::{EntityBinding, EntityRegistry};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
