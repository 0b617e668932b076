use crate::error::{TrainError, TrainResult};
use crate::supervisor::SupervisorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use voxtrain_pipeline::{PipelineParams, StagePrograms};

/// Name of the workspace configuration file.
pub const CONFIG_FILE_NAME: &str = "voxtrain.toml";

/// Workspace configuration, loaded from `voxtrain.toml` in the workspace
/// root. Every section and every field has a default, so an absent or
/// empty file is a fully working configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Preprocessing parameters (participate in the cache key).
    #[serde(default)]
    pub pipeline: PipelineParams,
    /// Interpreter and scripts implementing the pipeline stages.
    #[serde(default)]
    pub stages: StagePrograms,
    /// Trainer invocation.
    #[serde(default)]
    pub trainer: TrainerConfig,
    /// Polling cadences and shutdown behavior of the run supervisor.
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Experiment tracking.
    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> TrainResult<Self> {
        if !path.exists() {
            return Err(TrainError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// `voxtrain.toml` in the workspace root, or defaults when absent.
    pub fn load_or_default(root: &Path) -> TrainResult<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.exists() {
            let config = Self::load_from_file(&path)?;
            debug!(path = %path.display(), "loaded workspace config");
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default = "default_trainer_interpreter")]
    pub interpreter: PathBuf,
    #[serde(default = "default_train_script")]
    pub train_script: PathBuf,
    /// Pretrained generator weights to fine-tune from, if any.
    #[serde(default)]
    pub pretrained_generator: Option<PathBuf>,
    /// Pretrained discriminator weights to fine-tune from, if any.
    #[serde(default)]
    pub pretrained_discriminator: Option<PathBuf>,
}

fn default_trainer_interpreter() -> PathBuf {
    PathBuf::from("python3")
}

fn default_train_script() -> PathBuf {
    PathBuf::from("tools/train.py")
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_trainer_interpreter(),
            train_script: default_train_script(),
            pretrained_generator: None,
            pretrained_discriminator: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Experiment group runs are filed under.
    #[serde(default = "default_experiment_group")]
    pub experiment_group: String,
    /// Override for the run store directory; defaults to `<root>/tracking`.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

fn default_experiment_group() -> String {
    "voice-training".to_string()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self { experiment_group: default_experiment_group(), store_dir: None }
    }
}
