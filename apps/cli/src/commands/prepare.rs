//! Prepare command implementation.

use colored::Colorize;
use std::path::{Path, PathBuf};
use voxtrain_pipeline::{PipelineRunner, WorkspaceLayout};
use voxtrain_training::AppConfig;

/// Execute the prepare command.
///
/// Brings the preprocessing pipeline for an experiment to ready, reusing
/// the cached outputs when the dataset and parameters are unchanged.
pub async fn execute(
    root: &Path,
    experiment: &str,
    dataset: Option<PathBuf>,
    force: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(root)?;
    let layout = WorkspaceLayout::new(root);
    let dataset_dir = dataset.unwrap_or_else(|| layout.dataset_dir(experiment));
    let runner = PipelineRunner::new(layout, config.stages.clone());

    if force && runner.cache(experiment).clear()? {
        println!("{}", "Cleared cache record".yellow());
    }

    println!("{}", format!("Preparing {experiment}...").bold().cyan());
    let outcome = runner
        .ensure_ready(experiment, &dataset_dir, &config.pipeline)
        .await?;

    if outcome.skipped {
        println!(
            "{}",
            format!("✓ Cache valid, all stages skipped ({} files)", outcome.file_count)
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "✓ Ran {} stages over {} files",
                outcome.stages_run.len(),
                outcome.file_count
            )
            .green()
            .bold()
        );
    }
    println!("  Cache key: {}", outcome.cache_key.to_string().dimmed());

    Ok(())
}
