//! Voxtrain Training
//!
//! Supervision of the external training subprocess:
//! - Trainer command assembly (`build_trainer_command`)
//! - The run supervisor: log tailing, checkpoint polling, telemetry
//!   (`Supervisor`)
//! - Training log metric extraction (`LogParser`)
//! - Workspace configuration (`AppConfig`)
//! - The end-to-end entry point (`run_experiment`)

pub mod checkpoints;
pub mod command;
pub mod config;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod supervisor;
pub mod telemetry;

pub use checkpoints::CheckpointWatcher;
pub use command::{build_trainer_command, HyperParams, TrainerCommand};
pub use config::{AppConfig, TrackingConfig, TrainerConfig, CONFIG_FILE_NAME};
pub use error::{TrainError, TrainResult};
pub use experiment::{format_run_name, run_experiment, ExperimentOutcome, TrainRequest};
pub use metrics::{LogParser, ParsedLine};
pub use supervisor::{RunOutcome, Supervisor, SupervisorConfig, TrainingJob};
pub use telemetry::{
    AcceleratorProbe, AcceleratorSample, HostSampler, NvmlProbe, TelemetrySample,
    TelemetrySampler, SYSTEM_METRIC_PREFIX,
};
