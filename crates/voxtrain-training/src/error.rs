use thiserror::Error;
use voxtrain_pipeline::PipelineError;
use voxtrain_tracking::TrackingError;

pub type TrainResult<T> = std::result::Result<T, TrainError>;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid hyperparameters: {0}")]
    InvalidHyperParams(String),

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
