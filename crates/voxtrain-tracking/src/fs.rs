use crate::error::{TrackingError, TrackingResult};
use crate::run::{MetricPoint, RunConfig, RunHandle, RunId, RunRecord, RunStatus};
use crate::tracker::ExperimentTracker;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// File-system tracking backend.
///
/// Layout under the store root:
///
/// ```text
/// <root>/<experiment>/<run id>/
///     meta.json          run identity and terminal status
///     params.json        parameter mapping
///     metrics/<name>     one JSONL file per metric series
///     artifacts/<file>   artifact copies, by file name
/// ```
#[derive(Debug)]
pub struct FsTracker {
    root: PathBuf,
    open_runs: Mutex<HashSet<RunId>>,
}

impl FsTracker {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), open_runs: Mutex::new(HashSet::new()) }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn run_dir(&self, run: &RunHandle) -> PathBuf {
        self.root.join(&run.experiment).join(&run.id.0)
    }

    fn open_runs(&self) -> TrackingResult<MutexGuard<'_, HashSet<RunId>>> {
        self.open_runs
            .lock()
            .map_err(|_| TrackingError::Other(anyhow::anyhow!("open-run set poisoned")))
    }

    fn require_open(&self, run: &RunHandle) -> TrackingResult<()> {
        if self.open_runs()?.contains(&run.id) {
            Ok(())
        } else {
            Err(TrackingError::RunClosed(run.id.to_string()))
        }
    }

    /// All persisted runs for an experiment group, oldest first.
    ///
    /// Directories without a readable `meta.json` are skipped with a warning
    /// rather than failing the listing.
    pub fn list_runs(&self, experiment: &str) -> TrackingResult<Vec<RunRecord>> {
        let group_dir = self.root.join(experiment);
        if !group_dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&group_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let meta_path = entry.path().join("meta.json");
            match std::fs::read_to_string(&meta_path) {
                Ok(raw) => match serde_json::from_str::<RunRecord>(&raw) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(path = %meta_path.display(), "skipping malformed run meta: {e}"),
                },
                Err(e) => warn!(path = %meta_path.display(), "skipping unreadable run meta: {e}"),
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

#[async_trait]
impl ExperimentTracker for FsTracker {
    async fn start_run(&self, config: RunConfig) -> TrackingResult<RunHandle> {
        let handle = RunHandle {
            id: RunId::new(),
            experiment: config.experiment,
            run_name: config.run_name,
        };
        let dir = self.run_dir(&handle);
        std::fs::create_dir_all(dir.join("metrics"))?;
        std::fs::create_dir_all(dir.join("artifacts"))?;
        write_json(dir.join("meta.json"), &RunRecord::open(&handle))?;
        self.open_runs()?.insert(handle.id.clone());
        debug!(run_id = %handle.id, experiment = %handle.experiment, "opened tracking run");
        Ok(handle)
    }

    async fn log_params(
        &self,
        run: &RunHandle,
        params: &BTreeMap<String, String>,
    ) -> TrackingResult<()> {
        self.require_open(run)?;
        write_json(self.run_dir(run).join("params.json"), params)
    }

    async fn log_metric(
        &self,
        run: &RunHandle,
        name: &str,
        value: f64,
        step: u64,
    ) -> TrackingResult<()> {
        self.require_open(run)?;
        let path = self.run_dir(run).join("metrics").join(metric_rel_path(name)?);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let line = serde_json::to_string(&MetricPoint::now(value, step))?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    async fn log_artifact(&self, run: &RunHandle, path: &Path) -> TrackingResult<()> {
        self.require_open(run)?;
        if !path.is_file() {
            return Err(TrackingError::Artifact(format!(
                "not a file: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .ok_or_else(|| TrackingError::Artifact(format!("no file name: {}", path.display())))?;
        std::fs::copy(path, self.run_dir(run).join("artifacts").join(name))?;
        Ok(())
    }

    async fn end_run(&self, run: &RunHandle, status: RunStatus) -> TrackingResult<()> {
        self.require_open(run)?;
        let meta_path = self.run_dir(run).join("meta.json");
        let mut record: RunRecord = match std::fs::read_to_string(&meta_path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            // Meta lost out-of-band; rebuild identity from the handle.
            Err(_) => RunRecord::open(run),
        };
        record.ended_at = Some(Utc::now());
        record.status = Some(status);
        write_json_atomic(&meta_path, &record)?;
        self.open_runs()?.remove(&run.id);
        debug!(run_id = %run.id, status = %status, "closed tracking run");
        Ok(())
    }
}

/// Metric names map onto file paths; `/` nests directories. Reject segments
/// that would escape the run's metrics directory.
fn metric_rel_path(name: &str) -> TrackingResult<PathBuf> {
    if name.trim().is_empty() {
        return Err(TrackingError::InvalidMetric("empty name".to_string()));
    }
    let mut rel = PathBuf::new();
    for segment in name.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(TrackingError::InvalidMetric(name.to_string()));
        }
        rel.push(segment);
    }
    Ok(rel)
}

fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> TrackingResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> TrackingResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
