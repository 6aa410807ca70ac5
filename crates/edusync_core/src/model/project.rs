//! Project records.

use crate::entity::{format_optional_date, format_timestamp, Entity, Row};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProjectStatus {
    /// Being prepared.
    #[default]
    Planned,
    /// Running.
    Active,
    /// Finished and archived.
    Closed,
}

impl ProjectStatus {
    /// Returns the stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planned => "planned",
            ProjectStatus::Active => "active",
            ProjectStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(ProjectStatus::Planned),
            "active" => Ok(ProjectStatus::Active),
            "closed" => Ok(ProjectStatus::Closed),
            other => Err(format!("unknown project status '{other}'")),
        }
    }
}

/// A project or course grouping tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Class or group the project belongs to.
    pub class_name: String,
    /// Lifecycle state.
    pub status: ProjectStatus,
    /// First day.
    pub start_date: Option<NaiveDate>,
    /// Last day.
    pub end_date: Option<NaiveDate>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Creates a project with a fresh identifier.
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            class_name: class_name.into(),
            status: ProjectStatus::Planned,
            start_date: None,
            end_date: None,
            updated_at: Utc::now().trunc_subsecs(3),
        }
    }

    /// Sets the identifier.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the date range.
    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }
}

impl Entity for Project {
    const TYPE_NAME: &'static str = "Project";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "class_name",
        "status",
        "start_date",
        "end_date",
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
            self.name.clone(),
            self.class_name.clone(),
            self.status.to_string(),
            format_optional_date(self.start_date),
            format_optional_date(self.end_date),
            format_timestamp(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> CoreResult<Self> {
        let start_date = row.optional_date("start_date")?;
        let end_date = row.optional_date("end_date")?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(CoreError::invalid_field(
                    "end_date",
                    end.to_string(),
                    "ends before it starts",
                ));
            }
        }

        Ok(Project {
            id: row.uuid("id")?,
            name: row.text("name")?.to_string(),
            class_name: row.text("class_name")?.to_string(),
            status: row.parse("status")?,
            start_date,
            end_date,
            updated_at: row.timestamp("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let project = Project::new("Science fair", "8B")
            .with_status(ProjectStatus::Active)
            .with_dates(
                NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
            );

        let values = project.to_row();
        let row = Row::new(Project::COLUMNS, &values).unwrap();
        assert_eq!(Project::from_row(&row).unwrap(), project);
    }

    #[test]
    fn rejects_inverted_dates() {
        let project = Project::new("Backwards", "7A").with_dates(
            NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
            NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
        );
        let values = project.to_row();
        let row = Row::new(Project::COLUMNS, &values).unwrap();
        assert!(Project::from_row(&row).unwrap_err().is_row_error());
    }
}
