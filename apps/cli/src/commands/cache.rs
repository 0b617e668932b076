//! Cache command implementation.

use clap::Subcommand;
use colored::Colorize;
use std::path::Path;
use voxtrain_pipeline::{PipelineRunner, PipelineState, WorkspaceLayout};
use voxtrain_training::AppConfig;

/// Cache command subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum CacheCommand {
    /// Show the cache record and whether it is still valid
    Status,
    /// Remove the cache record, forcing the next run to redo every stage
    Clear,
}

/// Execute the cache command.
pub async fn execute(root: &Path, experiment: &str, command: CacheCommand) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(root)?;
    let layout = WorkspaceLayout::new(root);
    let runner = PipelineRunner::new(layout.clone(), config.stages.clone());

    match command {
        CacheCommand::Status => show_status(&runner, &layout, &config, experiment),
        CacheCommand::Clear => clear_record(&runner, experiment),
    }
}

fn show_status(
    runner: &PipelineRunner,
    layout: &WorkspaceLayout,
    config: &AppConfig,
    experiment: &str,
) -> anyhow::Result<()> {
    println!("{}", format!("Cache status for {experiment}").bold().cyan());

    let dataset_dir = layout.dataset_dir(experiment);
    if !dataset_dir.is_dir() {
        println!("  Dataset:     {}", format!("missing ({})", dataset_dir.display()).red());
        match runner.cache(experiment).load() {
            Some(record) => {
                println!("  Stored key:  {}", record.cache_key.to_string().dimmed());
                println!("  Recorded at: {}", record.created_at);
            }
            None => println!("  Stored key:  {}", "none".yellow()),
        }
        return Ok(());
    }

    let status = runner.status(experiment, &dataset_dir, &config.pipeline)?;
    println!("  Dataset files: {}", status.file_count);
    println!("  Current key:   {}", status.current_key.to_string().dimmed());
    match &status.record {
        Some(record) => {
            println!("  Stored key:    {}", record.cache_key.to_string().dimmed());
            println!("  Recorded at:   {}", record.created_at);
        }
        None => println!("  Stored key:    {}", "none".yellow()),
    }
    let state = if status.state == PipelineState::Ready {
        "ready (stages will be skipped)".green().bold()
    } else {
        "pending (stages will run)".yellow().bold()
    };
    println!("  State:         {state}");

    Ok(())
}

fn clear_record(runner: &PipelineRunner, experiment: &str) -> anyhow::Result<()> {
    if runner.cache(experiment).clear()? {
        println!("{}", format!("✓ Cleared cache record for {experiment}").green().bold());
    } else {
        println!("No cache record for {experiment}");
    }
    Ok(())
}
