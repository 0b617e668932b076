use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid experiment name: {0}")]
    InvalidExperiment(String),

    #[error("invalid pipeline parameters: {0}")]
    InvalidParams(String),

    #[error("dataset has no audio files: {0}")]
    EmptyDataset(String),

    #[error("stage {stage} failed: {reason}")]
    StageFailed { stage: String, reason: String },

    #[error("stage {stage} succeeded but output is missing: {path}")]
    MissingOutput { stage: String, path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
