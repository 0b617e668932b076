//! Voxtrain Tracking
//!
//! Backend-agnostic experiment tracking:
//! - Run lifecycle types (`RunConfig`, `RunHandle`, `RunStatus`, `RunRecord`)
//! - The `ExperimentTracker` capability trait
//! - A file-system backend (`FsTracker`)
//! - An in-memory backend (`InMemoryTracker`) for tests and dry runs

pub mod error;
pub mod fs;
pub mod memory;
pub mod run;
pub mod tracker;

pub use error::{TrackingError, TrackingResult};
pub use fs::FsTracker;
pub use memory::{InMemoryTracker, MemoryRun};
pub use run::{MetricPoint, RunConfig, RunHandle, RunId, RunRecord, RunStatus};
pub use tracker::ExperimentTracker;
