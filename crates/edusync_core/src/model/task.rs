//! Task records.

use crate::entity::{format_optional_date, format_timestamp, Entity, Row};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Progress of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Being worked on.
    InProgress,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// Returns the stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// A unit of work assigned within a project or course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Stable identifier.
    pub id: Uuid,
    /// Owning project, if any.
    pub project_id: Option<Uuid>,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Progress.
    pub status: TaskStatus,
    /// Priority, 1 (highest) to 5.
    pub priority: u8,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task with a fresh identifier.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: None,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: 3,
            due_date: None,
            updated_at: Utc::now().trunc_subsecs(3),
        }
    }

    /// Sets the identifier.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Sets the owning project.
    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the due date.
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets the modification time.
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }
}

impl Entity for Task {
    const TYPE_NAME: &'static str = "Task";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "project_id",
        "title",
        "description",
        "status",
        "priority",
        "due_date",
        "updated_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.project_id.map(|p| p.to_string()).unwrap_or_default(),
            self.title.clone(),
            self.description.clone(),
            self.status.to_string(),
            self.priority.to_string(),
            format_optional_date(self.due_date),
            format_timestamp(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> CoreResult<Self> {
        let priority: u8 = row.parse("priority")?;
        if !(1..=5).contains(&priority) {
            return Err(CoreError::invalid_field(
                "priority",
                priority.to_string(),
                "must be between 1 and 5",
            ));
        }

        Ok(Task {
            id: row.uuid("id")?,
            project_id: row.optional_uuid("project_id")?,
            title: row.text("title")?.to_string(),
            description: row.text("description")?.to_string(),
            status: row.parse("status")?,
            priority,
            due_date: row.optional_date("due_date")?,
            updated_at: row.timestamp("updated_at")?,
        })
    }
}
