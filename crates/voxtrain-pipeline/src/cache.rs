use crate::error::PipelineResult;
use crate::fingerprint::CacheKey;
use crate::params::PipelineParams;
use crate::stage::StageSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What gets persisted after a fully successful preprocessing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub cache_key: CacheKey,
    pub created_at: DateTime<Utc>,
    pub parameters: PipelineParams,
}

/// The per-experiment preprocessing cache record on disk.
///
/// Reads degrade to a cache miss on any problem (missing, unreadable or
/// malformed record); rerunning preprocessing is always safe, skipping it
/// on ambiguous state is not. Writes are atomic via a temp-file rename so
/// a crash mid-write never leaves a record claiming an incomplete pipeline.
#[derive(Debug, Clone)]
pub struct PreprocessCache {
    path: PathBuf,
}

impl PreprocessCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn load(&self) -> Option<CacheRecord> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), "cache record unreadable, treating as miss: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %self.path.display(), "cache record malformed, treating as miss: {e}");
                None
            }
        }
    }

    /// True iff a record exists, its key matches the freshly computed one,
    /// and every declared stage output is still present on disk. The digest
    /// alone is not proof: outputs deleted out-of-band must invalidate.
    #[must_use]
    pub fn is_valid(&self, key: &CacheKey, stages: &[StageSpec]) -> bool {
        let Some(record) = self.load() else {
            return false;
        };
        if record.cache_key != *key {
            debug!(
                stored = %record.cache_key,
                computed = %key,
                "cache key mismatch"
            );
            return false;
        }
        for stage in stages {
            if let Some(missing) = stage.missing_output() {
                debug!(
                    stage = %stage.name,
                    path = %missing.display(),
                    "cached stage output missing"
                );
                return false;
            }
        }
        true
    }

    /// Persist a record for `key`. Callers must only do this after every
    /// stage has reported success.
    pub fn save(&self, key: CacheKey, params: &PipelineParams) -> PipelineResult<CacheRecord> {
        let record = CacheRecord {
            cache_key: key,
            created_at: Utc::now(),
            parameters: params.clone(),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&record)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(record)
    }

    /// Remove the record, forcing the next invocation to rerun all stages.
    /// Returns whether a record was actually removed.
    pub fn clear(&self) -> PipelineResult<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
