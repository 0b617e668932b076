use crate::error::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};

/// Filesystem layout for datasets, pipeline outputs and tracking data
/// inside a voxtrain workspace root.
///
/// ```text
/// <root>/datasets/<experiment>/          raw audio (input, never mutated)
/// <root>/experiments/<experiment>/
///     segments/ pitch/ features/         stage output directories
///     filelist.txt train_config.json     stage output files
///     checkpoints/                       trainer emissions
///     logs/                              stage + training logs
///     preprocess_cache.json              cache record
/// <root>/tracking/                       file-backed run store
/// ```
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Default location for an experiment's raw audio.
    #[must_use]
    pub fn dataset_dir(&self, experiment: &str) -> PathBuf {
        self.root.join("datasets").join(experiment)
    }

    #[must_use]
    pub fn experiment_dir(&self, experiment: &str) -> PathBuf {
        self.root.join("experiments").join(experiment)
    }

    #[must_use]
    pub fn segments_dir(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join("segments")
    }

    #[must_use]
    pub fn pitch_dir(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join("pitch")
    }

    #[must_use]
    pub fn features_dir(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join("features")
    }

    #[must_use]
    pub fn filelist_path(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join("filelist.txt")
    }

    #[must_use]
    pub fn train_config_path(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join("train_config.json")
    }

    #[must_use]
    pub fn checkpoints_dir(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join("checkpoints")
    }

    #[must_use]
    pub fn logs_dir(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join("logs")
    }

    #[must_use]
    pub fn stage_log_path(&self, experiment: &str, stage: &str) -> PathBuf {
        self.logs_dir(experiment).join(format!("{stage}.log"))
    }

    #[must_use]
    pub fn training_log_path(&self, experiment: &str) -> PathBuf {
        self.logs_dir(experiment).join("training.log")
    }

    #[must_use]
    pub fn failure_tail_path(&self, experiment: &str) -> PathBuf {
        self.logs_dir(experiment).join("failure_tail.log")
    }

    #[must_use]
    pub fn cache_record_path(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join("preprocess_cache.json")
    }

    #[must_use]
    pub fn tracking_dir(&self) -> PathBuf {
        self.root.join("tracking")
    }

    pub fn ensure_experiment_dirs(&self, experiment: &str) -> PipelineResult<()> {
        std::fs::create_dir_all(self.segments_dir(experiment))?;
        std::fs::create_dir_all(self.pitch_dir(experiment))?;
        std::fs::create_dir_all(self.features_dir(experiment))?;
        std::fs::create_dir_all(self.checkpoints_dir(experiment))?;
        std::fs::create_dir_all(self.logs_dir(experiment))?;
        Ok(())
    }
}

/// Experiment names become path components; keep them to a single segment.
pub fn validate_experiment_name(name: &str) -> PipelineResult<()> {
    if name.trim().is_empty() {
        return Err(PipelineError::InvalidExperiment("name is empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(PipelineError::InvalidExperiment(name.to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(PipelineError::InvalidExperiment(format!(
            "name must not contain path separators: {name}"
        )));
    }
    Ok(())
}
