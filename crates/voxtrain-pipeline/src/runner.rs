use crate::cache::{CacheRecord, PreprocessCache};
use crate::error::{PipelineError, PipelineResult};
use crate::fingerprint::{compute_cache_key, CacheKey, DatasetSnapshot};
use crate::layout::{validate_experiment_name, WorkspaceLayout};
use crate::params::PipelineParams;
use crate::stage::{default_stages, StagePrograms, StageSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tracing::{debug, info, warn};

/// Preprocessing state of one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Running { stage: String },
    Ready,
    Failed,
}

/// Result of bringing an experiment's preprocessing to ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutcome {
    pub cache_key: CacheKey,
    /// True when a valid cache let every stage be skipped.
    pub skipped: bool,
    pub stages_run: Vec<String>,
    pub file_count: usize,
}

/// Cache-level view of an experiment, for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub record: Option<CacheRecord>,
    pub current_key: CacheKey,
    pub file_count: usize,
}

/// Drives the preprocessing stages for one experiment at a time.
///
/// The cache record and the stage output directories are single-writer:
/// two runners must not operate on the same experiment concurrently.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    layout: WorkspaceLayout,
    programs: StagePrograms,
}

impl PipelineRunner {
    #[must_use]
    pub fn new(layout: WorkspaceLayout, programs: StagePrograms) -> Self {
        Self { layout, programs }
    }

    #[must_use]
    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    #[must_use]
    pub fn cache(&self, experiment: &str) -> PreprocessCache {
        PreprocessCache::new(self.layout.cache_record_path(experiment))
    }

    /// Compute the current cache state without running anything.
    pub fn status(
        &self,
        experiment: &str,
        dataset_dir: &Path,
        params: &PipelineParams,
    ) -> PipelineResult<PipelineStatus> {
        validate_experiment_name(experiment)?;
        params.validate()?;
        let snapshot = DatasetSnapshot::capture(dataset_dir)?;
        let current_key = compute_cache_key(&snapshot, params);
        let stages = default_stages(&self.layout, experiment, dataset_dir, params, &self.programs);
        let cache = self.cache(experiment);
        let state = if cache.is_valid(&current_key, &stages) {
            PipelineState::Ready
        } else {
            PipelineState::Pending
        };
        Ok(PipelineStatus {
            state,
            record: cache.load(),
            current_key,
            file_count: snapshot.len(),
        })
    }

    /// Run (or skip, when the cache is valid) every stage, then persist the
    /// cache record. On any stage failure the remaining stages are aborted
    /// and no record is written, so the next invocation retries from the
    /// first stage.
    pub async fn ensure_ready(
        &self,
        experiment: &str,
        dataset_dir: &Path,
        params: &PipelineParams,
    ) -> PipelineResult<PipelineOutcome> {
        validate_experiment_name(experiment)?;
        params.validate()?;
        let snapshot = DatasetSnapshot::capture(dataset_dir)?;
        let cache_key = compute_cache_key(&snapshot, params);
        let stages = default_stages(&self.layout, experiment, dataset_dir, params, &self.programs);
        let cache = self.cache(experiment);

        if cache.is_valid(&cache_key, &stages) {
            info!(experiment = %experiment, key = %cache_key, "preprocessing cache valid, skipping stages");
            return Ok(PipelineOutcome {
                cache_key,
                skipped: true,
                stages_run: Vec::new(),
                file_count: snapshot.len(),
            });
        }

        if snapshot.is_empty() {
            return Err(PipelineError::EmptyDataset(dataset_dir.display().to_string()));
        }

        self.layout.ensure_experiment_dirs(experiment)?;
        info!(
            experiment = %experiment,
            files = snapshot.len(),
            stages = stages.len(),
            "running preprocessing pipeline"
        );

        let mut stages_run = Vec::with_capacity(stages.len());
        for stage in &stages {
            debug!(
                experiment = %experiment,
                state = ?PipelineState::Running { stage: stage.name.clone() },
                "pipeline transition"
            );
            if let Err(e) = self.run_stage(experiment, stage).await {
                warn!(
                    experiment = %experiment,
                    stage = %stage.name,
                    state = ?PipelineState::Failed,
                    "pipeline failed: {e}"
                );
                return Err(e);
            }
            stages_run.push(stage.name.clone());
        }

        cache.save(cache_key.clone(), params)?;
        info!(experiment = %experiment, key = %cache_key, "preprocessing pipeline ready");
        Ok(PipelineOutcome {
            cache_key,
            skipped: false,
            stages_run,
            file_count: snapshot.len(),
        })
    }

    async fn run_stage(&self, experiment: &str, stage: &StageSpec) -> PipelineResult<()> {
        info!(experiment = %experiment, stage = %stage.name, "running stage");
        let log_path = self.layout.stage_log_path(experiment, &stage.name);
        let log_file = std::fs::File::create(&log_path)?;
        let log_stderr = log_file.try_clone()?;

        let status = tokio::process::Command::new(&stage.program)
            .args(&stage.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_stderr))
            .status()
            .await
            .map_err(|e| PipelineError::StageFailed {
                stage: stage.name.clone(),
                reason: format!("failed to start {}: {e}", stage.program.display()),
            })?;

        if !status.success() {
            return Err(PipelineError::StageFailed {
                stage: stage.name.clone(),
                reason: exit_reason(status),
            });
        }
        if let Some(missing) = stage.missing_output() {
            return Err(PipelineError::MissingOutput {
                stage: stage.name.clone(),
                path: missing.display().to_string(),
            });
        }
        debug!(experiment = %experiment, stage = %stage.name, "stage complete");
        Ok(())
    }
}

fn exit_reason(status: std::process::ExitStatus) -> String {
    status.code().map_or_else(
        || "terminated by signal".to_string(),
        |code| format!("exit code {code}"),
    )
}
