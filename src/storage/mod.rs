//! Storage layer for Kaizen
//!
//! Everything durable lives in two directory trees: the data directory
//! (status record, mission, failure patterns, loop ledger, artifacts,
//! reflections, self-repair requests) and the site directory (dashboard).

mod artifacts;
mod jsonl;
mod loops;
mod traits;

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::error::Result;

pub use artifacts::ArtifactStore;
pub use jsonl::JsonlStorage;
pub use loops::{LOOPS_COLLECTION, LoopEntry, LoopOutcome, LoopStore};
pub use traits::{Filter, FilterOp, HasId, Storage};

/// Write a file through a sibling temp file and rename it into place
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Remove a file, treating "already gone" as success
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Paths of the persisted workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    pub data_dir: PathBuf,
    pub site_dir: PathBuf,
}

impl Workspace {
    pub fn new(data_dir: impl Into<PathBuf>, site_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            site_dir: site_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.data_dir, &config.site_dir)
    }

    /// Create every directory the loop writes into
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.artifacts_dir(),
            self.reflections_dir(),
            self.requests_dir(),
            self.site_dir.clone(),
            self.site_loops_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn status_path(&self) -> PathBuf {
        self.data_dir.join("system_state.json")
    }

    pub fn mission_path(&self) -> PathBuf {
        self.data_dir.join("current_mission.md")
    }

    pub fn failure_patterns_path(&self) -> PathBuf {
        self.data_dir.join("failure_patterns.json")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }

    pub fn reflections_dir(&self) -> PathBuf {
        self.data_dir.join("reflections")
    }

    pub fn requests_dir(&self) -> PathBuf {
        self.data_dir.join("system_agent_requests")
    }

    pub fn site_loops_dir(&self) -> PathBuf {
        self.site_dir.join("loops")
    }

    pub fn site_index(&self) -> PathBuf {
        self.site_dir.join("index.html")
    }

    pub fn site_page(&self, loop_id: crate::id::LoopId) -> PathBuf {
        self.site_loops_dir().join(format!("{}.html", loop_id))
    }
}
