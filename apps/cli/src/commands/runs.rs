//! Runs command implementation.

use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use voxtrain_pipeline::WorkspaceLayout;
use voxtrain_tracking::{FsTracker, RunStatus};
use voxtrain_training::AppConfig;

/// Execute the runs command.
///
/// Lists tracked runs in the configured experiment group, oldest first,
/// optionally filtered to one experiment's runs by run-name prefix.
pub async fn execute(root: &Path, experiment: Option<&str>) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(root)?;
    let layout = WorkspaceLayout::new(root);
    let store = config
        .tracking
        .store_dir
        .clone()
        .unwrap_or_else(|| layout.tracking_dir());
    let tracker = FsTracker::new(store.clone());

    let mut records = tracker
        .list_runs(&config.tracking.experiment_group)
        .with_context(|| format!("failed to read the run store at {}", store.display()))?;
    if let Some(experiment) = experiment {
        let prefix = format!("{experiment}-");
        records.retain(|record| record.run_name.starts_with(&prefix));
    }

    if records.is_empty() {
        println!("{}", "No runs recorded".yellow());
        return Ok(());
    }

    println!("{}", format!("Runs in {}", config.tracking.experiment_group).bold().cyan());
    for record in &records {
        let status = match record.status {
            Some(RunStatus::Completed) => "completed".green(),
            Some(RunStatus::Failed) => "failed".red(),
            Some(RunStatus::Killed) => "killed".yellow(),
            None => "open".cyan(),
        };
        println!(
            "  {}  {}  {}  {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.id.to_string().dimmed(),
            record.run_name.bold(),
            status
        );
    }

    Ok(())
}
