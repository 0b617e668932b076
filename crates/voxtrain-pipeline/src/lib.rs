//! Voxtrain Pipeline
//!
//! Dataset fingerprinting and the multi-stage preprocessing pipeline:
//! - Dataset snapshots and cache keys (`DatasetSnapshot`, `compute_cache_key`)
//! - The per-experiment cache record (`PreprocessCache`)
//! - Stage definitions and the sequential runner (`StageSpec`, `PipelineRunner`)
//! - The workspace filesystem layout (`WorkspaceLayout`)

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod layout;
pub mod params;
pub mod runner;
pub mod stage;

pub use cache::{CacheRecord, PreprocessCache};
pub use error::{PipelineError, PipelineResult};
pub use fingerprint::{compute_cache_key, CacheKey, DatasetSnapshot, FileStamp, AUDIO_EXTENSIONS};
pub use layout::{validate_experiment_name, WorkspaceLayout};
pub use params::PipelineParams;
pub use runner::{PipelineOutcome, PipelineRunner, PipelineState, PipelineStatus};
pub use stage::{default_stages, output_present, StagePrograms, StageSpec};
