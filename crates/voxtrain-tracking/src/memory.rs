use crate::error::{TrackingError, TrackingResult};
use crate::run::{MetricPoint, RunConfig, RunHandle, RunId, RunRecord, RunStatus};
use crate::tracker::ExperimentTracker;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Everything recorded for one run by [`InMemoryTracker`].
#[derive(Debug, Clone)]
pub struct MemoryRun {
    pub record: RunRecord,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
    pub artifacts: Vec<PathBuf>,
}

/// In-memory tracking backend for tests and dry runs.
///
/// Enforces the same run lifecycle as the file backend: once a run is
/// ended, further calls against its handle fail with `RunClosed`.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    runs: Mutex<HashMap<RunId, MemoryRun>>,
}

impl InMemoryTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn run(&self, id: &RunId) -> Option<MemoryRun> {
        self.runs.lock().ok().and_then(|runs| runs.get(id).cloned())
    }

    /// All runs seen so far, oldest first.
    #[must_use]
    pub fn runs(&self) -> Vec<MemoryRun> {
        let mut runs: Vec<MemoryRun> = self
            .runs
            .lock()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default();
        runs.sort_by_key(|r| r.record.created_at);
        runs
    }

    /// Observations recorded for one metric series of one run.
    #[must_use]
    pub fn metric(&self, id: &RunId, name: &str) -> Vec<MetricPoint> {
        self.run(id)
            .and_then(|run| run.metrics.get(name).cloned())
            .unwrap_or_default()
    }

    fn state(&self) -> TrackingResult<MutexGuard<'_, HashMap<RunId, MemoryRun>>> {
        self.runs
            .lock()
            .map_err(|_| TrackingError::Other(anyhow::anyhow!("run map poisoned")))
    }
}

fn open_entry<'a>(
    runs: &'a mut HashMap<RunId, MemoryRun>,
    run: &RunHandle,
) -> TrackingResult<&'a mut MemoryRun> {
    let entry = runs
        .get_mut(&run.id)
        .ok_or_else(|| TrackingError::RunNotFound(run.id.to_string()))?;
    if entry.record.status.is_some() {
        return Err(TrackingError::RunClosed(run.id.to_string()));
    }
    Ok(entry)
}

#[async_trait]
impl ExperimentTracker for InMemoryTracker {
    async fn start_run(&self, config: RunConfig) -> TrackingResult<RunHandle> {
        let handle = RunHandle {
            id: RunId::new(),
            experiment: config.experiment,
            run_name: config.run_name,
        };
        self.state()?.insert(
            handle.id.clone(),
            MemoryRun {
                record: RunRecord::open(&handle),
                params: BTreeMap::new(),
                metrics: BTreeMap::new(),
                artifacts: Vec::new(),
            },
        );
        Ok(handle)
    }

    async fn log_params(
        &self,
        run: &RunHandle,
        params: &BTreeMap<String, String>,
    ) -> TrackingResult<()> {
        let mut runs = self.state()?;
        open_entry(&mut runs, run)?.params = params.clone();
        Ok(())
    }

    async fn log_metric(
        &self,
        run: &RunHandle,
        name: &str,
        value: f64,
        step: u64,
    ) -> TrackingResult<()> {
        if name.trim().is_empty() {
            return Err(TrackingError::InvalidMetric("empty name".to_string()));
        }
        let mut runs = self.state()?;
        open_entry(&mut runs, run)?
            .metrics
            .entry(name.to_string())
            .or_default()
            .push(MetricPoint::now(value, step));
        Ok(())
    }

    async fn log_artifact(&self, run: &RunHandle, path: &Path) -> TrackingResult<()> {
        if !path.is_file() {
            return Err(TrackingError::Artifact(format!(
                "not a file: {}",
                path.display()
            )));
        }
        let mut runs = self.state()?;
        open_entry(&mut runs, run)?.artifacts.push(path.to_path_buf());
        Ok(())
    }

    async fn end_run(&self, run: &RunHandle, status: RunStatus) -> TrackingResult<()> {
        let mut runs = self.state()?;
        let entry = open_entry(&mut runs, run)?;
        entry.record.ended_at = Some(Utc::now());
        entry.record.status = Some(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_round_trip() {
        let tracker = InMemoryTracker::new();
        let run = tracker
            .start_run(RunConfig::new("voice-training", "bob-5epochs-bs2"))
            .await
            .unwrap();

        let mut params = BTreeMap::new();
        params.insert("epochs".to_string(), "5".to_string());
        tracker.log_params(&run, &params).await.unwrap();
        tracker.log_metric(&run, "loss_disc", 3.0, 1).await.unwrap();
        tracker.log_metric(&run, "loss_disc", 2.5, 2).await.unwrap();
        tracker.end_run(&run, RunStatus::Completed).await.unwrap();

        let stored = tracker.run(&run.id).unwrap();
        assert_eq!(stored.params.get("epochs").unwrap(), "5");
        assert_eq!(stored.record.status, Some(RunStatus::Completed));

        let series = tracker.metric(&run.id, "loss_disc");
        assert_eq!(series.len(), 2);
        assert!(series[0].step <= series[1].step);
    }

    #[tokio::test]
    async fn test_closed_run_rejects_further_calls() {
        let tracker = InMemoryTracker::new();
        let run = tracker
            .start_run(RunConfig::new("voice-training", "bob-5epochs-bs2"))
            .await
            .unwrap();
        tracker.end_run(&run, RunStatus::Killed).await.unwrap();

        let err = tracker.log_metric(&run, "lr", 0.0001, 9).await.unwrap_err();
        assert!(matches!(err, TrackingError::RunClosed(_)));
        let err = tracker.end_run(&run, RunStatus::Completed).await.unwrap_err();
        assert!(matches!(err, TrackingError::RunClosed(_)));
    }

    #[tokio::test]
    async fn test_unknown_handle_is_not_found() {
        let tracker = InMemoryTracker::new();
        let ghost = RunHandle {
            id: RunId::new(),
            experiment: "voice-training".to_string(),
            run_name: "ghost".to_string(),
        };
        let err = tracker.log_metric(&ghost, "lr", 1.0, 0).await.unwrap_err();
        assert!(matches!(err, TrackingError::RunNotFound(_)));
    }
}
