//! Train command implementation.

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use voxtrain_pipeline::WorkspaceLayout;
use voxtrain_tracking::{ExperimentTracker, FsTracker, InMemoryTracker, RunStatus};
use voxtrain_training::{run_experiment, AppConfig, HyperParams, TrainRequest};

/// Execute the train command.
///
/// Runs the cache-aware preprocessing pipeline, then supervises one
/// training run to a terminal status. Exits non-zero when the run did not
/// complete.
pub async fn execute(
    root: &Path,
    experiment: &str,
    dataset: Option<PathBuf>,
    hyper: HyperParams,
    accelerator: bool,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(root)?;
    let layout = WorkspaceLayout::new(root);

    let tracker: Arc<dyn ExperimentTracker> = if dry_run {
        Arc::new(InMemoryTracker::new())
    } else {
        let store = config
            .tracking
            .store_dir
            .clone()
            .unwrap_or_else(|| layout.tracking_dir());
        Arc::new(FsTracker::new(store))
    };

    // Ctrl-c cancels cooperatively; the supervisor records the run as killed.
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let request = TrainRequest {
        experiment: experiment.to_string(),
        dataset_dir: dataset,
        hyper,
        accelerator,
    };

    if !json {
        println!("{}", format!("Training {experiment}...").bold().cyan());
    }
    let outcome = run_experiment(&layout, &config, &request, tracker, &cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        if outcome.pipeline.skipped {
            println!("  Preprocessing: {}", "cached".green());
        } else {
            println!("  Preprocessing: ran {} stages", outcome.pipeline.stages_run.len());
        }
        let status = match outcome.run.status {
            RunStatus::Completed => "completed".green().bold(),
            RunStatus::Failed => "failed".red().bold(),
            RunStatus::Killed => "killed".yellow().bold(),
        };
        println!("  Run {} ({}): {}", outcome.run.run_name.bold(), outcome.run.run_id, status);
        println!("  Checkpoints: {}", outcome.run.checkpoints);

        if let Some(tail) = &outcome.run.failure_tail {
            if !tail.is_empty() {
                println!();
                println!("{}", "Last trainer output:".bold());
                for line in tail.lines() {
                    println!("  {}", line.dimmed());
                }
            }
        }
    }

    match outcome.run.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Failed => std::process::exit(1),
        RunStatus::Killed => std::process::exit(130), // Standard exit code for SIGINT
    }
}
