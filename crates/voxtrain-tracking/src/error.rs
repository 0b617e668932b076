use thiserror::Error;

pub type TrackingResult<T> = std::result::Result<T, TrackingError>;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("run {0} is closed")]
    RunClosed(String),

    #[error("run {0} not found")]
    RunNotFound(String),

    #[error("invalid metric name: {0}")]
    InvalidMetric(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
