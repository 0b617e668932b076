use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Preprocessing configuration that participates in the cache key.
///
/// Any change to any field invalidates previously cached pipeline outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Target sample rate in Hz after resampling.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Length of each cut segment in seconds.
    #[serde(default = "default_segment_secs")]
    pub segment_secs: f64,
    /// Pitch extraction method (e.g., "rmvpe", "harvest").
    #[serde(default = "default_pitch_method")]
    pub pitch_method: String,
    /// Feature/model version tag passed through to the extractor.
    #[serde(default = "default_model_version")]
    pub model_version: String,
    /// Whether the model conditions on pitch; disables the pitch stage when false.
    #[serde(default = "default_use_f0")]
    pub use_f0: bool,
    /// Whether accelerator-capable stages may use the accelerator.
    #[serde(default)]
    pub accelerator: bool,
}

fn default_sample_rate() -> u32 {
    40_000
}

fn default_segment_secs() -> f64 {
    3.5
}

fn default_pitch_method() -> String {
    "rmvpe".to_string()
}

fn default_model_version() -> String {
    "v2".to_string()
}

fn default_use_f0() -> bool {
    true
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            segment_secs: default_segment_secs(),
            pitch_method: default_pitch_method(),
            model_version: default_model_version(),
            use_f0: default_use_f0(),
            accelerator: false,
        }
    }
}

impl PipelineParams {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.sample_rate == 0 {
            return Err(PipelineError::InvalidParams("sample_rate must be > 0".to_string()));
        }
        if !self.segment_secs.is_finite() || self.segment_secs <= 0.0 {
            return Err(PipelineError::InvalidParams("segment_secs must be > 0".to_string()));
        }
        if self.pitch_method.trim().is_empty() {
            return Err(PipelineError::InvalidParams("pitch_method is required".to_string()));
        }
        if self.model_version.trim().is_empty() {
            return Err(PipelineError::InvalidParams("model_version is required".to_string()));
        }
        Ok(())
    }

    /// Key-sorted `(name, value)` pairs, the canonical form hashed into the
    /// cache key. Keys sort lexicographically so the digest is independent
    /// of struct field order.
    #[must_use]
    pub fn canonical_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("accelerator".to_string(), self.accelerator.to_string()),
            ("model_version".to_string(), self.model_version.clone()),
            ("pitch_method".to_string(), self.pitch_method.clone()),
            ("sample_rate".to_string(), self.sample_rate.to_string()),
            ("segment_secs".to_string(), self.segment_secs.to_string()),
            ("use_f0".to_string(), self.use_f0.to_string()),
        ]
    }
}
