//! Once command implementation.

use super::App;
use crate::error::CliResult;
use edusync_sync_engine::{CycleReport, SyncError};
use std::path::Path;

/// Runs a single sync cycle and prints its report.
pub fn run(config_path: &Path, format: &str) -> CliResult<()> {
    let app = App::open(config_path)?;
    let orchestrator = app.orchestrator()?;

    match orchestrator.run_cycle() {
        Ok(report) => print_report(&report, format),
        Err(SyncError::Cycle(failure)) => {
            print_report(&failure.report, format)?;
            Err(SyncError::Cycle(failure).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &CycleReport, format: &str) -> CliResult<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(report)?),
        _ => print!("{}", render_text(report)),
    }
    Ok(())
}

fn render_text(report: &CycleReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Sync cycle {} in {:?}\n",
        if report.is_success() { "completed" } else { "failed" },
        report.duration
    ));
    for entity in &report.entities {
        match (&entity.report, &entity.error) {
            (Some(r), _) => out.push_str(&format!(
                "  {:<10} {}  merged={} conflicts={} local_only={} remote_only={}\n",
                entity.entity, entity.state, r.merged_count, r.conflicts, r.local_only, r.remote_only
            )),
            (None, error) => out.push_str(&format!(
                "  {:<10} {}  {}\n",
                entity.entity,
                entity.state,
                error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
    out
}
