use crate::command::{build_trainer_command, HyperParams};
use crate::config::AppConfig;
use crate::error::TrainResult;
use crate::supervisor::{RunOutcome, Supervisor, TrainingJob};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use voxtrain_pipeline::{
    validate_experiment_name, PipelineOutcome, PipelineParams, PipelineRunner, WorkspaceLayout,
};
use voxtrain_tracking::{ExperimentTracker, RunConfig};

/// A request to train one experiment end to end.
#[derive(Debug, Clone)]
pub struct TrainRequest {
    pub experiment: String,
    /// Raw audio location; defaults to the workspace dataset directory.
    pub dataset_dir: Option<PathBuf>,
    pub hyper: HyperParams,
    /// Train on the accelerator instead of the CPU.
    pub accelerator: bool,
}

impl TrainRequest {
    pub fn validate(&self) -> TrainResult<()> {
        validate_experiment_name(&self.experiment)?;
        self.hyper.validate()
    }
}

/// What happened, end to end: preprocessing then the supervised run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentOutcome {
    pub pipeline: PipelineOutcome,
    pub run: RunOutcome,
}

/// Runs are named so the tracker UI sorts and reads well without
/// opening the parameter record.
#[must_use]
pub fn format_run_name(experiment: &str, hyper: &HyperParams) -> String {
    format!("{experiment}-{}epochs-bs{}", hyper.epochs, hyper.batch_size)
}

/// Bring preprocessing to ready, then supervise one training run.
///
/// Preprocessing failures surface before any tracking run is opened;
/// trainer failures end the run as `failed` and still return `Ok` with
/// the terminal outcome.
pub async fn run_experiment(
    layout: &WorkspaceLayout,
    config: &AppConfig,
    request: &TrainRequest,
    tracker: Arc<dyn ExperimentTracker>,
    cancel: &CancellationToken,
) -> TrainResult<ExperimentOutcome> {
    request.validate()?;

    let mut params = config.pipeline.clone();
    params.accelerator = request.accelerator;
    let dataset_dir = request
        .dataset_dir
        .clone()
        .unwrap_or_else(|| layout.dataset_dir(&request.experiment));

    let runner = PipelineRunner::new(layout.clone(), config.stages.clone());
    let pipeline = runner
        .ensure_ready(&request.experiment, &dataset_dir, &params)
        .await?;
    // A skipped pipeline proves the stage outputs exist, not the run dirs.
    layout.ensure_experiment_dirs(&request.experiment)?;

    let run_name = format_run_name(&request.experiment, &request.hyper);
    let command = build_trainer_command(
        &config.trainer,
        layout,
        &request.experiment,
        &params,
        &request.hyper,
    );
    info!(
        experiment = %request.experiment,
        run_name = %run_name,
        program = %command.program.display(),
        "launching trainer"
    );

    let job = TrainingJob {
        experiment: request.experiment.clone(),
        run_config: RunConfig::new(config.tracking.experiment_group.clone(), run_name),
        command,
        params: run_params(&request.experiment, &params, &request.hyper),
        training_log: layout.training_log_path(&request.experiment),
        checkpoints_dir: layout.checkpoints_dir(&request.experiment),
        failure_tail_path: layout.failure_tail_path(&request.experiment),
    };

    let supervisor = Supervisor::new(config.supervisor.clone(), tracker);
    let run = supervisor.supervise(&job, cancel).await?;
    Ok(ExperimentOutcome { pipeline, run })
}

/// The parameter record logged when the run opens.
fn run_params(
    experiment: &str,
    params: &PipelineParams,
    hyper: &HyperParams,
) -> BTreeMap<String, String> {
    let mut record = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        record.insert(key.to_string(), value);
    };
    put("voice_name", experiment.to_string());
    put("epochs", hyper.epochs.to_string());
    put("batch_size", hyper.batch_size.to_string());
    put("save_frequency", hyper.save_every.to_string());
    put("sample_rate", params.sample_rate.to_string());
    put("segment_secs", params.segment_secs.to_string());
    put("use_f0", params.use_f0.to_string());
    put("pitch_method", params.pitch_method.clone());
    put("model_version", params.model_version.clone());
    put("mode", if params.accelerator { "gpu" } else { "cpu" }.to_string());
    record
}
