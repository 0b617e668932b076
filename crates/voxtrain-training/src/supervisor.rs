use crate::checkpoints::CheckpointWatcher;
use crate::command::TrainerCommand;
use crate::error::{TrainError, TrainResult};
use crate::metrics::{LogParser, ParsedLine};
use crate::telemetry::TelemetrySampler;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voxtrain_tracking::{ExperimentTracker, RunConfig, RunHandle, RunId, RunStatus};

/// Cadences and shutdown behavior of the run supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// How often the training log is polled for new lines.
    #[serde(default = "default_log_poll_secs")]
    pub log_poll_secs: u64,
    /// How often the checkpoint directory is scanned.
    #[serde(default = "default_checkpoint_poll_secs")]
    pub checkpoint_poll_secs: u64,
    /// Resource telemetry sampling period.
    #[serde(default = "default_telemetry_interval_secs")]
    pub telemetry_interval_secs: u64,
    /// How long a cancelled trainer gets to exit after the termination
    /// signal before it is force-killed.
    #[serde(default = "default_kill_grace_secs")]
    pub kill_grace_secs: u64,
    /// How many trailing output lines are kept as failure context.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

fn default_log_poll_secs() -> u64 {
    2
}

fn default_checkpoint_poll_secs() -> u64 {
    2
}

fn default_telemetry_interval_secs() -> u64 {
    30
}

fn default_kill_grace_secs() -> u64 {
    10
}

fn default_tail_lines() -> usize {
    50
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            log_poll_secs: default_log_poll_secs(),
            checkpoint_poll_secs: default_checkpoint_poll_secs(),
            telemetry_interval_secs: default_telemetry_interval_secs(),
            kill_grace_secs: default_kill_grace_secs(),
            tail_lines: default_tail_lines(),
        }
    }
}

impl SupervisorConfig {
    #[must_use]
    pub fn log_poll(&self) -> Duration {
        Duration::from_secs(self.log_poll_secs)
    }

    #[must_use]
    pub fn checkpoint_poll(&self) -> Duration {
        Duration::from_secs(self.checkpoint_poll_secs)
    }

    #[must_use]
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry_interval_secs)
    }

    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }
}

/// Everything the supervisor needs to launch and track one run.
#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub experiment: String,
    pub run_config: RunConfig,
    pub command: TrainerCommand,
    /// Parameter mapping logged when the run opens.
    pub params: BTreeMap<String, String>,
    /// Combined stdout/stderr of the trainer lands here.
    pub training_log: PathBuf,
    pub checkpoints_dir: PathBuf,
    /// Where the failure tail is written when the trainer fails.
    pub failure_tail_path: PathBuf,
}

/// Terminal result of one supervised run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub run_name: String,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    /// Checkpoint artifacts registered during the run.
    pub checkpoints: usize,
    /// Last output lines, present only when the trainer failed.
    pub failure_tail: Option<String>,
}

/// Owns the lifecycle of one training subprocess per run: launch, log
/// tailing, checkpoint polling and telemetry run concurrently until the
/// trainer exits or the caller cancels. All background activity is joined
/// before the tracking run is closed, so nothing is ever attributed to a
/// closed run.
pub struct Supervisor {
    config: SupervisorConfig,
    tracker: Arc<dyn ExperimentTracker>,
}

impl Supervisor {
    #[must_use]
    pub fn new(config: SupervisorConfig, tracker: Arc<dyn ExperimentTracker>) -> Self {
        Self { config, tracker }
    }

    /// Run the trainer to a terminal status. Cancellation is cooperative:
    /// the trainer gets the termination signal, then the grace period,
    /// then a forced kill, and the run ends as `killed`.
    pub async fn supervise(
        &self,
        job: &TrainingJob,
        cancel: &CancellationToken,
    ) -> TrainResult<RunOutcome> {
        let run = self.tracker.start_run(job.run_config.clone()).await?;
        info!(
            run_id = %run.id,
            run_name = %run.run_name,
            experiment = %job.experiment,
            "starting training run"
        );

        if let Err(e) = self.tracker.log_params(&run, &job.params).await {
            warn!(run_id = %run.id, "failed to log run parameters: {e}");
        }

        match self.run_to_completion(job, &run, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // The trainer never ran; close the run before surfacing.
                if let Err(end) = self.tracker.end_run(&run, RunStatus::Failed).await {
                    warn!(run_id = %run.id, "failed to close tracking run: {end}");
                }
                Err(e)
            }
        }
    }

    async fn run_to_completion(
        &self,
        job: &TrainingJob,
        run: &RunHandle,
        cancel: &CancellationToken,
    ) -> TrainResult<RunOutcome> {
        if let Some(parent) = job.training_log.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log_out = std::fs::File::create(&job.training_log)?;
        let log_err = log_out.try_clone()?;

        let mut child = Command::new(&job.command.program)
            .args(&job.command.args)
            .current_dir(&job.command.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_out))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| {
                TrainError::Trainer(format!(
                    "failed to start trainer {}: {e}",
                    job.command.program.display()
                ))
            })?;

        // One token for the three activities; cancelling the caller token
        // stops the trainer, this one stops the background tasks.
        let activities = CancellationToken::new();

        let tailer = tokio::spawn(tail_training_log(
            self.tracker.clone(),
            run.clone(),
            job.training_log.clone(),
            self.config.log_poll(),
            self.config.tail_lines,
            activities.clone(),
        ));
        let checkpoints = tokio::spawn(poll_checkpoints(
            self.tracker.clone(),
            run.clone(),
            job.checkpoints_dir.clone(),
            self.config.checkpoint_poll(),
            activities.clone(),
        ));
        let telemetry = tokio::spawn(sample_telemetry(
            self.tracker.clone(),
            run.clone(),
            self.config.telemetry_interval(),
            activities.clone(),
        ));

        enum WaitEvent {
            Exited(std::process::ExitStatus),
            WaitFailed(std::io::Error),
            Cancelled,
        }

        let event = tokio::select! {
            result = child.wait() => match result {
                Ok(status) => WaitEvent::Exited(status),
                Err(e) => WaitEvent::WaitFailed(e),
            },
            () = cancel.cancelled() => WaitEvent::Cancelled,
        };

        let (status, exit_code) = match event {
            WaitEvent::Exited(exit) => {
                let code = exit.code();
                if exit.success() {
                    (RunStatus::Completed, code)
                } else {
                    warn!(run_id = %run.id, code = ?code, "trainer exited with failure");
                    (RunStatus::Failed, code)
                }
            }
            WaitEvent::WaitFailed(e) => {
                warn!(run_id = %run.id, "waiting on trainer failed: {e}");
                if let Err(kill) = child.kill().await {
                    warn!(run_id = %run.id, "failed to kill trainer: {kill}");
                }
                (RunStatus::Failed, None)
            }
            WaitEvent::Cancelled => {
                info!(run_id = %run.id, "cancellation requested, stopping trainer");
                terminate_child(&mut child, self.config.kill_grace()).await;
                (RunStatus::Killed, None)
            }
        };

        // Stop the activities and drain them before closing the run.
        activities.cancel();
        let tail_lines = match tailer.await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(run_id = %run.id, "log tailer task failed: {e}");
                Vec::new()
            }
        };
        let registered = match checkpoints.await {
            Ok(count) => count,
            Err(e) => {
                warn!(run_id = %run.id, "checkpoint poller task failed: {e}");
                0
            }
        };
        if let Err(e) = telemetry.await {
            warn!(run_id = %run.id, "telemetry task failed: {e}");
        }

        let mut failure_tail = None;
        if status == RunStatus::Failed {
            let tail_text = tail_lines.join("\n");
            match write_failure_tail(&job.failure_tail_path, &tail_text) {
                Ok(()) => {
                    if let Err(e) = self.tracker.log_artifact(run, &job.failure_tail_path).await {
                        warn!(run_id = %run.id, "failed to attach failure tail: {e}");
                    }
                }
                Err(e) => {
                    warn!(run_id = %run.id, "failed to write failure tail: {e}");
                }
            }
            failure_tail = Some(tail_text);
        }

        if let Err(e) = self.tracker.end_run(run, status).await {
            warn!(run_id = %run.id, "failed to close tracking run: {e}");
        }
        info!(run_id = %run.id, status = %status, checkpoints = registered, "training run finished");

        Ok(RunOutcome {
            run_id: run.id.clone(),
            run_name: run.run_name.clone(),
            status,
            exit_code,
            checkpoints: registered,
            failure_tail,
        })
    }
}

/// SIGTERM, grace period, then SIGKILL.
async fn terminate_child(child: &mut Child, grace: Duration) {
    if try_sigterm(child) {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(_) => return,
            Err(_) => {
                warn!("trainer ignored termination signal for {}s, killing", grace.as_secs());
            }
        }
    }
    if let Err(e) = child.kill().await {
        warn!("failed to kill trainer: {e}");
    }
}

#[cfg(unix)]
fn try_sigterm(child: &Child) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return false;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        // ESRCH: the trainer exited between wait() and here.
        Ok(()) | Err(Errno::ESRCH) => true,
        Err(e) => {
            warn!("failed to signal trainer: {e}");
            false
        }
    }
}

#[cfg(not(unix))]
fn try_sigterm(_child: &Child) -> bool {
    false
}

/// Incremental reader over an append-only log file. Keeps a byte offset
/// and stashes a trailing partial line until its newline arrives.
pub(crate) struct LogReader {
    path: PathBuf,
    offset: u64,
    partial: String,
}

impl LogReader {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, offset: 0, partial: String::new() }
    }

    /// Complete lines appended since the last call.
    pub(crate) fn read_new_lines(&mut self) -> Vec<String> {
        let mut file = match std::fs::File::open(&self.path) {
            // Not created yet, or transiently unreadable; try again next poll.
            Err(_) => return Vec::new(),
            Ok(file) => file,
        };
        if file.seek(SeekFrom::Start(self.offset)).is_err() {
            return Vec::new();
        }
        let mut bytes = Vec::new();
        if file.read_to_end(&mut bytes).is_err() {
            return Vec::new();
        }
        self.offset += bytes.len() as u64;

        let combined = format!("{}{}", self.partial, String::from_utf8_lossy(&bytes));
        let mut parts: Vec<&str> = combined.split('\n').collect();
        self.partial = parts.pop().unwrap_or_default().to_string();
        parts
            .into_iter()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect()
    }
}

/// Follow the training log: forward parsed metric bundles to the tracker
/// and keep a bounded ring of recent lines for failure context. Performs
/// one final drain after cancellation so lines written just before exit
/// are not lost. Returns the tail ring.
async fn tail_training_log(
    tracker: Arc<dyn ExperimentTracker>,
    run: RunHandle,
    log_path: PathBuf,
    poll: Duration,
    tail_lines: usize,
    cancel: CancellationToken,
) -> Vec<String> {
    let parser = LogParser::new();
    let mut reader = LogReader::new(log_path);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(tail_lines);
    let mut last_step: Option<u64> = None;

    loop {
        let finish = tokio::select! {
            () = cancel.cancelled() => true,
            () = tokio::time::sleep(poll) => false,
        };

        for line in reader.read_new_lines() {
            if tail_lines > 0 {
                if tail.len() == tail_lines {
                    tail.pop_front();
                }
                tail.push_back(line.clone());
            }

            let ParsedLine::Matched { step, metrics } = parser.parse_line(&line) else {
                continue;
            };
            if metrics.is_empty() {
                continue;
            }
            // Metric delivery is non-decreasing in step; a regressing
            // bundle is dropped rather than reordered.
            if last_step.is_some_and(|last| step < last) {
                warn!(run_id = %run.id, step, "dropping out-of-order metric bundle");
                continue;
            }
            last_step = Some(step);
            for (name, value) in metrics {
                if let Err(e) = tracker.log_metric(&run, &name, value, step).await {
                    warn!(run_id = %run.id, metric = %name, "failed to log metric: {e}");
                }
            }
        }

        if finish {
            break;
        }
    }
    tail.into_iter().collect()
}

/// Scan the checkpoint directory on a fixed cadence, registering each new
/// filename exactly once. A final scan runs after cancellation so files
/// written just before trainer exit are caught. Returns how many artifacts
/// were registered.
async fn poll_checkpoints(
    tracker: Arc<dyn ExperimentTracker>,
    run: RunHandle,
    dir: PathBuf,
    poll: Duration,
    cancel: CancellationToken,
) -> usize {
    let mut watcher = CheckpointWatcher::new(dir);
    let mut registered = 0usize;

    loop {
        let finish = tokio::select! {
            () = cancel.cancelled() => true,
            () = tokio::time::sleep(poll) => false,
        };

        for path in watcher.scan() {
            info!(run_id = %run.id, checkpoint = %path.display(), "new checkpoint");
            match tracker.log_artifact(&run, &path).await {
                Ok(()) => registered += 1,
                Err(e) => {
                    warn!(
                        run_id = %run.id,
                        checkpoint = %path.display(),
                        "failed to register checkpoint: {e}"
                    );
                }
            }
        }

        if finish {
            break;
        }
    }
    registered
}

/// Sample resource telemetry on a fixed interval, starting immediately.
/// A failed tick is skipped, never fatal to the run.
async fn sample_telemetry(
    tracker: Arc<dyn ExperimentTracker>,
    run: RunHandle,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut sampler = TelemetrySampler::with_default_probes();
    let mut tick: u64 = 0;

    loop {
        let sample = sampler.sample();
        for (name, value) in sample.metrics() {
            if let Err(e) = tracker.log_metric(&run, &name, value, tick).await {
                warn!(run_id = %run.id, metric = %name, "failed to log telemetry: {e}");
                break;
            }
        }
        tick += 1;

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!(run_id = %run.id, ticks = tick, "telemetry sampler stopped");
}

fn write_failure_tail(path: &Path, tail: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, tail)
}
