//! Records synchronized by the application.
//!
//! Each type implements [`Entity`](crate::Entity) with an explicit column
//! list. Column order is the on-disk and on-wire order.

mod project;
mod task;

pub use project::{Project, ProjectStatus};
pub use task::{Task, TaskStatus};
