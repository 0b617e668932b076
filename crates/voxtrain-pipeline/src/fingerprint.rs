use crate::error::PipelineResult;
use crate::params::PipelineParams;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

/// Audio extensions included in a dataset snapshot (case-insensitive).
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a", "aac"];

/// Content fingerprint of a dataset plus its pipeline parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of one audio file at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    /// Path relative to the dataset root, `/`-separated.
    pub rel_path: String,
    pub size: u64,
    pub mtime_secs: i64,
    pub mtime_nanos: u32,
}

/// Point-in-time view of a dataset directory: every recognized audio file
/// with its size and modification time, sorted by relative path so the
/// snapshot is independent of filesystem enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub files: Vec<FileStamp>,
}

impl DatasetSnapshot {
    /// Walk `dataset_dir` and capture every audio file. An existing but
    /// audio-free directory yields an empty (still hashable) snapshot.
    pub fn capture(dataset_dir: &Path) -> PipelineResult<Self> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dataset_dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
                continue;
            }
            let metadata = entry.metadata().map_err(std::io::Error::from)?;
            let (mtime_secs, mtime_nanos) = mtime_parts(&metadata)?;
            files.push(FileStamp {
                rel_path: relative_slash_path(entry.path(), dataset_dir),
                size: metadata.len(),
                mtime_secs,
                mtime_nanos,
            });
        }
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Ok(Self { files })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Digest over the sorted file stamps followed by the canonicalized
/// parameter pairs. Stable across processes and platforms for the same
/// dataset state and parameters.
#[must_use]
pub fn compute_cache_key(snapshot: &DatasetSnapshot, params: &PipelineParams) -> CacheKey {
    let mut hasher = Sha256::new();
    for file in &snapshot.files {
        hasher.update(file.rel_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(file.size.to_le_bytes());
        hasher.update(file.mtime_secs.to_le_bytes());
        hasher.update(file.mtime_nanos.to_le_bytes());
        hasher.update(b"\n");
    }
    for (key, value) in params.canonical_pairs() {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    CacheKey(hex::encode(hasher.finalize()))
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
}

fn mtime_parts(metadata: &std::fs::Metadata) -> PipelineResult<(i64, u32)> {
    let modified = metadata.modified()?;
    match modified.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => Ok((d.as_secs() as i64, d.subsec_nanos())),
        // Pre-epoch mtimes are possible on badly restored files; keep them stable.
        Err(e) => Ok((-(e.duration().as_secs() as i64), e.duration().subsec_nanos())),
    }
}

fn relative_slash_path(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_clip(dir: &Path, name: &str, contents: &[u8]) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_snapshot_only_sees_audio_files_sorted() {
        let temp = TempDir::new().unwrap();
        write_clip(temp.path(), "b.wav", b"bb");
        write_clip(temp.path(), "a.flac", b"aa");
        write_clip(temp.path(), "notes.txt", b"ignore me");
        write_clip(temp.path(), "nested/c.WAV", b"cc");

        let snapshot = DatasetSnapshot::capture(temp.path()).unwrap();
        let paths: Vec<&str> = snapshot.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["a.flac", "b.wav", "nested/c.WAV"]);
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let temp = TempDir::new().unwrap();
        write_clip(temp.path(), "a.wav", b"aaaa");
        write_clip(temp.path(), "b.wav", b"bb");

        let params = PipelineParams::default();
        let k1 = compute_cache_key(&DatasetSnapshot::capture(temp.path()).unwrap(), &params);
        let k2 = compute_cache_key(&DatasetSnapshot::capture(temp.path()).unwrap(), &params);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_cache_key_changes_with_params() {
        let temp = TempDir::new().unwrap();
        write_clip(temp.path(), "a.wav", b"aaaa");
        let snapshot = DatasetSnapshot::capture(temp.path()).unwrap();

        let base = compute_cache_key(&snapshot, &PipelineParams::default());
        let params = PipelineParams {
            sample_rate: 48_000,
            ..PipelineParams::default()
        };
        assert_ne!(base, compute_cache_key(&snapshot, &params));
    }

    #[test]
    fn test_cache_key_changes_with_dataset() {
        let temp = TempDir::new().unwrap();
        write_clip(temp.path(), "a.wav", b"aaaa");
        let params = PipelineParams::default();
        let before = compute_cache_key(&DatasetSnapshot::capture(temp.path()).unwrap(), &params);

        write_clip(temp.path(), "b.wav", b"bb");
        let after = compute_cache_key(&DatasetSnapshot::capture(temp.path()).unwrap(), &params);
        assert_ne!(before, after);

        // Same file list, different content size.
        write_clip(temp.path(), "b.wav", b"bbbb");
        let resized = compute_cache_key(&DatasetSnapshot::capture(temp.path()).unwrap(), &params);
        assert_ne!(after, resized);
    }

    #[test]
    fn test_empty_dataset_still_hashes() {
        let temp = TempDir::new().unwrap();
        let snapshot = DatasetSnapshot::capture(temp.path()).unwrap();
        assert!(snapshot.is_empty());
        let key = compute_cache_key(&snapshot, &PipelineParams::default());
        assert_eq!(key.0.len(), 64);
    }
}
