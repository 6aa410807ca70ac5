//! Property-based test generators using proptest.
//!
//! Generated records survive a CSV round trip unchanged: timestamps are
//! whole milliseconds and text never starts with whitespace.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use edusync_core::{Project, ProjectStatus, Task, TaskStatus};
use proptest::prelude::*;
use uuid::Uuid;

/// Strategy for record identifiers.
///
/// Draws from a small range so that independently generated lists share ids.
pub fn id_strategy() -> impl Strategy<Value = Uuid> {
    (1u128..=64).prop_map(Uuid::from_u128)
}

/// Strategy for millisecond-precision timestamps in 2020..2030.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_577_836_800_000i64..1_893_456_000_000).prop_map(|ms| {
        Utc.timestamp_millis_opt(ms)
            .single()
            .expect("Timestamp in range")
    })
}

/// Strategy for calendar dates in 2024.
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1u32..=365).prop_map(|day| {
        NaiveDate::from_yo_opt(2024, day).expect("Day of year in range")
    })
}

/// Strategy for short text, including CSV metacharacters.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9][A-Za-z0-9 ,.\"']{0,23}").expect("Invalid regex")
}

fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Done),
    ]
}

fn project_status_strategy() -> impl Strategy<Value = ProjectStatus> {
    prop_oneof![
        Just(ProjectStatus::Planned),
        Just(ProjectStatus::Active),
        Just(ProjectStatus::Closed),
    ]
}

/// Strategy for valid tasks.
pub fn task_strategy() -> impl Strategy<Value = Task> {
    (
        id_strategy(),
        text_strategy(),
        task_status_strategy(),
        1u8..=5,
        prop::option::of(date_strategy()),
        timestamp_strategy(),
    )
        .prop_map(|(id, title, status, priority, due, updated_at)| {
            let task = Task::new(title)
                .with_id(id)
                .with_status(status)
                .with_priority(priority)
                .with_updated_at(updated_at);
            match due {
                Some(date) => task.with_due_date(date),
                None => task,
            }
        })
}

/// Strategy for task lists with unique ids.
pub fn task_list_strategy(max_len: usize) -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(task_strategy(), 0..=max_len).prop_map(|mut tasks| {
        let mut seen = std::collections::HashSet::new();
        tasks.retain(|t| seen.insert(t.id));
        tasks
    })
}

/// Strategy for valid projects.
pub fn project_strategy() -> impl Strategy<Value = Project> {
    (
        id_strategy(),
        text_strategy(),
        text_strategy(),
        project_status_strategy(),
        date_strategy(),
        0i64..60,
    )
        .prop_map(|(id, name, class_name, status, start, days)| {
            Project::new(name, class_name)
                .with_id(id)
                .with_status(status)
                .with_dates(start, start + chrono::Duration::days(days))
        })
}
