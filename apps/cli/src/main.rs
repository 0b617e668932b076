//! Voxtrain CLI - Command-line interface for voice model training
//!
//! This CLI provides a `voxtrain` command for preparing voice datasets and
//! supervising training runs against the experiment tracker.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use commands::{cache, prepare, runs, train, CacheCommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use voxtrain_training::HyperParams;

/// Voxtrain - voice model training orchestration
///
/// Voxtrain wraps an external voice-conversion training stack: it
/// fingerprints datasets, caches preprocessing, and supervises training
/// subprocesses while streaming metrics, checkpoints and telemetry to an
/// experiment tracker.
#[derive(Parser, Debug)]
#[command(
    name = "voxtrain",
    author,
    version,
    about = "Voxtrain - voice model training orchestration",
    long_about = "Voxtrain orchestrates voice model training: dataset fingerprinting,\ncached preprocessing stages, and supervised training runs with metric,\ncheckpoint and telemetry capture."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Workspace root (overrides VOXTRAIN_ROOT)
    #[arg(short = 'r', long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the preprocessing pipeline for an experiment
    ///
    /// Fingerprints the dataset and runs the stages, or skips all of them
    /// when the cached fingerprint still matches and every stage output is
    /// present.
    Prepare {
        /// Experiment (voice) name
        experiment: String,

        /// Dataset directory (defaults to <root>/datasets/<experiment>)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Clear the cache record first so every stage runs
        #[arg(long)]
        force: bool,
    },

    /// Preprocess (cache-aware), then train an experiment
    ///
    /// Launches the external trainer and supervises it: metrics parsed from
    /// its log, new checkpoints and resource telemetry stream to the run
    /// store while it runs. Ctrl-c stops the trainer cooperatively and
    /// records the run as killed.
    Train {
        /// Experiment (voice) name
        experiment: String,

        /// Dataset directory (defaults to <root>/datasets/<experiment>)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Total training epochs
        #[arg(long)]
        epochs: u32,

        /// Trainer batch size
        #[arg(long)]
        batch_size: Option<u32>,

        /// Emit a checkpoint every this many epochs
        #[arg(long)]
        save_every: Option<u32>,

        /// Train on the accelerator instead of the CPU
        #[arg(long)]
        accelerator: bool,

        /// Track the run in memory only, writing nothing to the run store
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clear the preprocessing cache
    Cache {
        /// Experiment (voice) name
        experiment: String,

        #[command(subcommand)]
        command: CacheCommand,
    },

    /// List tracked runs from the file store
    Runs {
        /// Only runs of this experiment (run-name prefix)
        experiment: Option<String>,
    },
}

fn resolve_root(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| std::env::var_os("VOXTRAIN_ROOT").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("voxtrain"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let root = resolve_root(args.root);

    // If no command provided, show help
    let command = if let Some(command) = args.command {
        command
    } else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Prepare { experiment, dataset, force } => {
            prepare::execute(&root, &experiment, dataset, force).await?;
        }
        Command::Train {
            experiment,
            dataset,
            epochs,
            batch_size,
            save_every,
            accelerator,
            dry_run,
            json,
        } => {
            let mut hyper = HyperParams { epochs, ..HyperParams::default() };
            if let Some(batch_size) = batch_size {
                hyper.batch_size = batch_size;
            }
            if let Some(save_every) = save_every {
                hyper.save_every = save_every;
            }
            train::execute(&root, &experiment, dataset, hyper, accelerator, dry_run, json).await?;
        }
        Command::Cache { experiment, command } => {
            cache::execute(&root, &experiment, command).await?;
        }
        Command::Runs { experiment } => {
            runs::execute(&root, experiment.as_deref()).await?;
        }
    }

    Ok(())
}
