use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

use crate::storage::remove_if_exists;

/// File-count and site-size safety nets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardCapCleanup {
    /// Artifact count above which the directory is pruned
    pub max_files: usize,
    /// Newest artifacts kept when pruning
    pub keep_files: usize,
    pub max_site_bytes: u64,
    /// Per-loop pages older than this are purged when the site is too large
    pub max_page_age: Duration,
}

/// What one cleanup pass removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub artifacts_purged: usize,
    pub pages_purged: usize,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.artifacts_purged == 0 && self.pages_purged == 0
    }
}

impl HardCapCleanup {
    pub fn apply(&self, artifacts_dir: &Path, site_dir: &Path, site_loops_dir: &Path) -> CleanupReport {
        let report = CleanupReport {
            artifacts_purged: self.cap_artifacts(artifacts_dir),
            pages_purged: self.cap_site(site_dir, site_loops_dir),
        };
        if !report.is_empty() {
            log::info!(
                "Auto-cleaned {} old artifacts and {} old loop pages",
                report.artifacts_purged,
                report.pages_purged
            );
        }
        report
    }

    fn cap_artifacts(&self, dir: &Path) -> usize {
        let mut files = files_with_mtime(dir);
        if files.len() <= self.max_files {
            return 0;
        }

        // Newest first, name breaks ties so repeated runs agree
        files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        purge(files.into_iter().skip(self.keep_files).map(|(path, _)| path))
    }

    fn cap_site(&self, site_dir: &Path, loops_dir: &Path) -> usize {
        let size = dir_size(site_dir);
        if size <= self.max_site_bytes {
            return 0;
        }
        log::warn!("Site is {} bytes, over the {} byte ceiling", size, self.max_site_bytes);

        let now = SystemTime::now();
        let stale = files_with_mtime(loops_dir).into_iter().filter_map(|(path, mtime)| {
            let age = now.duration_since(mtime).unwrap_or_default();
            (age > self.max_page_age).then_some(path)
        });
        purge(stale)
    }
}

/// Total size of all files under `dir`; missing directories are empty
pub fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

fn files_with_mtime(dir: &Path) -> Vec<(PathBuf, SystemTime)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((entry.path(), meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)))
        })
        .collect()
}

fn purge(paths: impl Iterator<Item = PathBuf>) -> usize {
    let mut count = 0;
    for path in paths {
        match remove_if_exists(&path) {
            Ok(_) => count += 1,
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    count
}
