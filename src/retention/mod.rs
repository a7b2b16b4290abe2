//! Retention policy
//!
//! Two independent rules keep storage bounded:
//! - logarithmic: keep loop ordinal 1, powers of two and the recent window
//! - hard cap: file-count and site-size safety nets, independent of ordinals
//!
//! Both are best-effort. A file that is already gone counts as purged and
//! any other delete error is logged and skipped.

mod cleanup;
mod logarithmic;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::RetentionConfig;
use crate::id::LoopId;
use crate::storage::{ArtifactStore, Workspace};

pub use cleanup::{CleanupReport, HardCapCleanup, dir_size};
pub use logarithmic::LogarithmicRetention;

/// Both retention rules, configured together
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub logarithmic: LogarithmicRetention,
    pub hard_cap: HardCapCleanup,
}

impl RetentionPolicy {
    pub fn from_config(config: &RetentionConfig) -> Self {
        Self {
            logarithmic: LogarithmicRetention::new(config.recent_ordinals),
            hard_cap: HardCapCleanup {
                max_files: config.max_artifact_files,
                keep_files: config.keep_artifact_files,
                max_site_bytes: config.max_site_bytes,
                max_page_age: Duration::from_secs(config.max_page_age_secs),
            },
        }
    }

    /// Apply the logarithmic rule to every artifact and reflection file
    pub fn retain(&self, store: &ArtifactStore, ordinals: &HashMap<LoopId, u64>, latest: u64) -> Vec<PathBuf> {
        self.logarithmic.apply(&store.artifact_files(), ordinals, latest)
    }

    /// Apply the hard-cap safety nets
    pub fn cleanup(&self, workspace: &Workspace) -> CleanupReport {
        self.hard_cap.apply(
            &workspace.artifacts_dir(),
            &workspace.site_dir,
            &workspace.site_loops_dir(),
        )
    }
}
