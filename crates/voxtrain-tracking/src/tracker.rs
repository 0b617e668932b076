use crate::error::TrackingResult;
use crate::run::{RunConfig, RunHandle, RunStatus};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

/// Capability set every tracking backend provides.
///
/// The rest of the system depends only on this trait, so the backend is
/// swappable (file store, in-memory, or a remote MLflow-style server).
/// Calls against a run that has already been ended must return
/// [`TrackingError::RunClosed`](crate::TrackingError::RunClosed) rather
/// than silently dropping data.
#[async_trait]
pub trait ExperimentTracker: Send + Sync {
    /// Open a new run and return the handle used by all subsequent calls.
    async fn start_run(&self, config: RunConfig) -> TrackingResult<RunHandle>;

    /// Record the run's immutable parameter mapping.
    async fn log_params(
        &self,
        run: &RunHandle,
        params: &BTreeMap<String, String>,
    ) -> TrackingResult<()>;

    /// Append one scalar observation to the named metric series.
    async fn log_metric(
        &self,
        run: &RunHandle,
        name: &str,
        value: f64,
        step: u64,
    ) -> TrackingResult<()>;

    /// Attach a file produced by the run (checkpoints, failure logs).
    async fn log_artifact(&self, run: &RunHandle, path: &Path) -> TrackingResult<()>;

    /// Close the run with its terminal status. The handle is dead afterwards.
    async fn end_run(&self, run: &RunHandle, status: RunStatus) -> TrackingResult<()>;
}
