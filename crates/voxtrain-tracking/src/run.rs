use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a tracked training run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Killed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Killed => "killed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller asks for when opening a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Experiment group the run is filed under (e.g., "voice-training").
    pub experiment: String,
    /// Human-readable run name within the group.
    pub run_name: String,
}

impl RunConfig {
    #[must_use]
    pub fn new(experiment: impl Into<String>, run_name: impl Into<String>) -> Self {
        Self { experiment: experiment.into(), run_name: run_name.into() }
    }
}

/// Handle to an open run, passed back into every tracker call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub id: RunId,
    pub experiment: String,
    pub run_name: String,
}

/// Persistent identity of a run, including its terminal state once ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub experiment: String,
    pub run_name: String,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: Option<RunStatus>,
}

impl RunRecord {
    #[must_use]
    pub fn open(handle: &RunHandle) -> Self {
        Self {
            id: handle.id.clone(),
            experiment: handle.experiment.clone(),
            run_name: handle.run_name.clone(),
            created_at: Utc::now(),
            ended_at: None,
            status: None,
        }
    }
}

/// One scalar observation within a metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub value: f64,
    pub step: u64,
    pub at: DateTime<Utc>,
}

impl MetricPoint {
    #[must_use]
    pub fn now(value: f64, step: u64) -> Self {
        Self { value, step, at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_run_status_serializes_snake_case() {
        let json = serde_json::to_string(&RunStatus::Killed).unwrap();
        assert_eq!(json, "\"killed\"");
        assert_eq!(RunStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_run_record_open_carries_handle_identity() {
        let handle = RunHandle {
            id: RunId::new(),
            experiment: "voice-training".to_string(),
            run_name: "alice-100epochs-bs8".to_string(),
        };
        let record = RunRecord::open(&handle);
        assert_eq!(record.id, handle.id);
        assert_eq!(record.experiment, "voice-training");
        assert!(record.status.is_none());
        assert!(record.ended_at.is_none());
    }
}
