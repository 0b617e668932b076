use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tracks which checkpoint files a run has produced so far.
///
/// Detection is purely additive: a filename is reported by exactly one
/// scan and never again, file contents are never inspected, and filenames
/// are opaque beyond "new vs. already seen". A scan that cannot read the
/// directory (not created yet, transient error) reports nothing.
#[derive(Debug)]
pub struct CheckpointWatcher {
    dir: PathBuf,
    seen: HashSet<OsString>,
}

impl CheckpointWatcher {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), seen: HashSet::new() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Regular files that appeared since the previous scan, name-sorted.
    pub fn scan(&mut self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), "checkpoint scan skipped: {e}");
                return Vec::new();
            }
        };

        let mut fresh = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name() else {
                continue;
            };
            if self.seen.insert(name.to_os_string()) {
                fresh.push(path);
            }
        }
        fresh.sort();
        fresh
    }

    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_scan_reports_existing_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("G_50.pth"), b"g").unwrap();
        std::fs::write(temp.path().join("D_50.pth"), b"d").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();

        let mut watcher = CheckpointWatcher::new(temp.path());
        let fresh = watcher.scan();
        let names: Vec<_> = fresh
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["D_50.pth", "G_50.pth"]);
        assert_eq!(watcher.seen_count(), 2);
    }

    #[test]
    fn test_files_are_reported_exactly_once() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("G_50.pth"), b"g").unwrap();

        let mut watcher = CheckpointWatcher::new(temp.path());
        assert_eq!(watcher.scan().len(), 1);
        assert!(watcher.scan().is_empty());

        // Rewriting the same name is not a new checkpoint.
        std::fs::write(temp.path().join("G_50.pth"), b"g2").unwrap();
        assert!(watcher.scan().is_empty());

        // A new name is.
        std::fs::write(temp.path().join("G_100.pth"), b"g").unwrap();
        assert_eq!(watcher.scan().len(), 1);
        assert_eq!(watcher.seen_count(), 2);
    }

    #[test]
    fn test_opaque_names_are_registered() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("final-weights.bin"), b"w").unwrap();

        let mut watcher = CheckpointWatcher::new(temp.path());
        assert_eq!(watcher.scan().len(), 1);
    }

    #[test]
    fn test_missing_directory_reports_nothing() {
        let temp = TempDir::new().unwrap();
        let mut watcher = CheckpointWatcher::new(temp.path().join("not-yet"));
        assert!(watcher.scan().is_empty());

        // Directory appearing later starts reporting.
        std::fs::create_dir(watcher.dir()).unwrap();
        std::fs::write(watcher.dir().join("G_10.pth"), b"g").unwrap();
        assert_eq!(watcher.scan().len(), 1);
    }
}
