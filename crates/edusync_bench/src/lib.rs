//! Benchmark utilities.

use edusync_core::{Task, TaskStatus};
use uuid::Uuid;

/// Generates `count` tasks with stable ids `1..=count`.
pub fn generate_tasks(count: usize) -> Vec<Task> {
    (1..=count)
        .map(|n| {
            let status = match n % 3 {
                0 => TaskStatus::Todo,
                1 => TaskStatus::InProgress,
                _ => TaskStatus::Done,
            };
            Task::new(format!("Task {n}, section {}", n % 7))
                .with_id(Uuid::from_u128(n as u128))
                .with_status(status)
                .with_priority((n % 5) as u8 + 1)
        })
        .collect()
}

/// Returns `tasks` with every `stride`-th title changed.
pub fn diverge(tasks: &[Task], stride: usize) -> Vec<Task> {
    tasks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let mut t = t.clone();
            if stride > 0 && i % stride == 0 {
                t.title.push_str(" (edited)");
            }
            t
        })
        .collect()
}

/// Creates payload bytes of the given size.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}
