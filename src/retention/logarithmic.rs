use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::domain::ArtifactName;
use crate::id::LoopId;
use crate::storage::remove_if_exists;

/// Keeps O(log n) loops plus a window of the most recent ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogarithmicRetention {
    /// Size of the always-kept recent window
    pub recent: u64,
}

impl LogarithmicRetention {
    pub fn new(recent: u64) -> Self {
        Self { recent }
    }

    /// Whether loop `ordinal` survives once `latest` loops have run
    pub fn keeps(&self, ordinal: u64, latest: u64) -> bool {
        ordinal == 1 || ordinal.is_power_of_two() || ordinal > latest.saturating_sub(self.recent)
    }

    /// Retained ordinals among 1..=latest
    pub fn retained(&self, latest: u64) -> BTreeSet<u64> {
        (1..=latest).filter(|n| self.keeps(*n, latest)).collect()
    }

    /// Purge files whose loop is known and not retained; returns what was purged
    ///
    /// Files that do not parse as `{loopId}_...` or whose loop id is not in
    /// `ordinals` are left alone.
    pub fn apply(&self, files: &[PathBuf], ordinals: &HashMap<LoopId, u64>, latest: u64) -> Vec<PathBuf> {
        let mut purged = Vec::new();
        for path in files {
            let Some(ordinal) = ordinal_of(path, ordinals) else {
                continue;
            };
            if self.keeps(ordinal, latest) {
                continue;
            }
            match remove_if_exists(path) {
                Ok(_) => purged.push(path.clone()),
                Err(e) => log::warn!("Failed to purge {}: {}", path.display(), e),
            }
        }
        if !purged.is_empty() {
            log::info!("Logarithmic retention purged {} files at ordinal {}", purged.len(), latest);
        }
        purged
    }
}

fn ordinal_of(path: &Path, ordinals: &HashMap<LoopId, u64>) -> Option<u64> {
    let name = ArtifactName::parse(&path.file_name()?.to_string_lossy())?;
    ordinals.get(&name.loop_id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_retained_set_for_40() {
        let retained: Vec<u64> = LogarithmicRetention::new(10).retained(40).into_iter().collect();
        assert_eq!(
            retained,
            vec![1, 2, 4, 8, 16, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40]
        );
    }

    #[test]
    fn test_retained_set_matches_formula() {
        let policy = LogarithmicRetention::new(10);
        for n in 1..=300u64 {
            let mut expected: BTreeSet<u64> = BTreeSet::from([1]);
            let mut p = 1u64;
            while p <= n {
                expected.insert(p);
                p *= 2;
            }
            for k in n.saturating_sub(9).max(1)..=n {
                expected.insert(k);
            }
            assert_eq!(policy.retained(n), expected, "n = {}", n);
        }
    }

    #[test]
    fn test_small_counts_keep_everything() {
        let retained = LogarithmicRetention::new(10).retained(7);
        assert_eq!(retained.len(), 7);
    }

    fn make_files(temp: &TempDir, count: u64) -> (Vec<PathBuf>, HashMap<LoopId, u64>) {
        let mut files = Vec::new();
        let mut ordinals = HashMap::new();
        for ordinal in 1..=count {
            let id = LoopId(1_000_000 + ordinal * 7);
            ordinals.insert(id, ordinal);
            for kind in ["plan.json", "report.md"] {
                let path = temp.path().join(format!("{}_{}", id, kind));
                fs::write(&path, "x").unwrap();
                files.push(path);
            }
        }
        (files, ordinals)
    }

    fn remaining(temp: &TempDir) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_apply_purges_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let (files, ordinals) = make_files(&temp, 40);
        let policy = LogarithmicRetention::new(10);

        let purged = policy.apply(&files, &ordinals, 40);
        assert_eq!(purged.len(), (40 - 15) * 2);
        assert_eq!(remaining(&temp).len(), 15 * 2);

        let again = policy.apply(&remaining(&temp), &ordinals, 40);
        assert!(again.is_empty());
    }

    #[test]
    fn test_unknown_and_foreign_files_are_kept() {
        let temp = TempDir::new().unwrap();
        let unknown = temp.path().join("999_report.md");
        let foreign = temp.path().join("notes.txt");
        fs::write(&unknown, "x").unwrap();
        fs::write(&foreign, "x").unwrap();

        let purged = LogarithmicRetention::new(10).apply(&[unknown.clone(), foreign.clone()], &HashMap::new(), 500);
        assert!(purged.is_empty());
        assert!(unknown.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_already_deleted_file_does_not_fail() {
        let temp = TempDir::new().unwrap();
        let ghost = temp.path().join("5_plan.json");
        let ordinals = HashMap::from([(LoopId(5), 3u64)]);

        let purged = LogarithmicRetention::new(10).apply(&[ghost], &ordinals, 100);
        assert_eq!(purged.len(), 1);
    }
}
