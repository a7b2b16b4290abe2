//! Per-loop artifact files
//!
//! Writes are atomic and propagate errors. Reads are best-effort: a missing
//! or unreadable file reads as absent, never as an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{Workspace, write_atomic};
use crate::domain::{ArtifactKind, ArtifactName};
use crate::error::Result;
use crate::id::LoopId;

/// Reads and writes the artifact, reflection and mission files
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    workspace: Workspace,
}

impl ArtifactStore {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn dir_for(&self, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::Reflection => self.workspace.reflections_dir(),
            _ => self.workspace.artifacts_dir(),
        }
    }

    pub fn path(&self, loop_id: LoopId, kind: ArtifactKind) -> PathBuf {
        self.dir_for(kind).join(kind.file_name(loop_id))
    }

    pub fn write_text(&self, loop_id: LoopId, kind: ArtifactKind, text: &str) -> Result<PathBuf> {
        let path = self.path(loop_id, kind);
        write_atomic(&path, text.as_bytes())?;
        log::debug!("Loop {}: wrote {}", loop_id, path.display());
        Ok(path)
    }

    pub fn write_json<T: Serialize>(&self, loop_id: LoopId, kind: ArtifactKind, value: &T) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(value)?;
        self.write_text(loop_id, kind, &json)
    }

    pub fn read_text(&self, loop_id: LoopId, kind: ArtifactKind) -> Option<String> {
        fs::read_to_string(self.path(loop_id, kind)).ok()
    }

    pub fn exists(&self, loop_id: LoopId, kind: ArtifactKind) -> bool {
        self.path(loop_id, kind).is_file()
    }

    /// Current mission text, if present and non-blank
    pub fn read_mission(&self) -> Option<String> {
        let text = fs::read_to_string(self.workspace.mission_path()).ok()?;
        let trimmed = text.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    }

    pub fn write_mission(&self, mission: &str) -> Result<()> {
        write_atomic(&self.workspace.mission_path(), mission.as_bytes())
    }

    /// Contents of the most recent reflections, newest first
    pub fn recent_reflections(&self, limit: usize) -> Vec<String> {
        newest_first(&self.workspace.reflections_dir(), ArtifactKind::Reflection.tag())
            .into_iter()
            .filter_map(|(_, path)| fs::read_to_string(path).ok())
            .take(limit)
            .collect()
    }

    /// Filenames of the most recent execution reports, newest first
    pub fn recent_report_names(&self, limit: usize) -> Vec<String> {
        newest_first(&self.workspace.artifacts_dir(), ArtifactKind::Report.tag())
            .into_iter()
            .filter_map(|(_, path)| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .take(limit)
            .collect()
    }

    /// Every file in the artifact and reflection directories
    pub fn artifact_files(&self) -> Vec<PathBuf> {
        let mut files = list_files(&self.workspace.artifacts_dir());
        files.extend(list_files(&self.workspace.reflections_dir()));
        files
    }
}

/// Regular files directly inside `dir`; a missing directory is empty
pub(crate) fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect()
}

/// Artifacts with the given tag in `dir`, sorted by loop id descending
fn newest_first(dir: &Path, tag: &str) -> Vec<(LoopId, PathBuf)> {
    let mut named: Vec<(LoopId, PathBuf)> = list_files(dir)
        .into_iter()
        .filter_map(|path| {
            let name = ArtifactName::parse(&path.file_name()?.to_string_lossy())?;
            (name.tag == tag).then_some((name.loop_id, path))
        })
        .collect();
    named.sort_by(|a, b| b.0.cmp(&a.0));
    named
}
