//! Loop run record and the persisted status record
//!
//! A LoopRun is one iteration of the improvement loop. Its id comes from the
//! wall clock, its ordinal counts loop attempts. The status record is the
//! single persisted document that says whether a loop is currently running.

use crate::id::{LoopId, now_ms};
use serde::{Deserialize, Serialize};

/// One iteration of the improvement loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopRun {
    /// Timestamp-derived identifier, strictly increasing
    pub id: LoopId,

    /// Sequential count of loop attempts
    pub ordinal: u64,

    pub status: LoopStatus,

    pub started_at: u64,
    pub ended_at: Option<u64>,
}

/// Whether a loop is executing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    #[default]
    Idle,
    Running,
}

impl LoopRun {
    /// Start a new run
    pub fn start(id: LoopId, ordinal: u64) -> Self {
        Self {
            id,
            ordinal,
            status: LoopStatus::Running,
            started_at: now_ms(),
            ended_at: None,
        }
    }

    /// Mark the run as finished
    pub fn finish(&mut self) {
        self.status = LoopStatus::Idle;
        self.ended_at = Some(now_ms());
    }

    pub fn is_running(&self) -> bool {
        self.status == LoopStatus::Running
    }
}

/// Persisted status document (`system_state.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusRecord {
    pub status: LoopStatus,

    /// Loop currently running, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_id: Option<LoopId>,

    /// Most recently finished loop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_loop_id: Option<LoopId>,

    /// Ordinal of the most recently started loop
    pub ordinal: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
}

impl StatusRecord {
    /// Record for a loop that just started
    pub fn running(run: &LoopRun, last_loop_id: Option<LoopId>) -> Self {
        Self {
            status: LoopStatus::Running,
            loop_id: Some(run.id),
            last_loop_id,
            ordinal: run.ordinal,
            start_time: Some(run.started_at),
            end_time: None,
        }
    }

    /// Record for a loop that just ended
    pub fn idle_after(run: &LoopRun) -> Self {
        Self {
            status: LoopStatus::Idle,
            loop_id: None,
            last_loop_id: Some(run.id),
            ordinal: run.ordinal,
            start_time: Some(run.started_at),
            end_time: Some(run.ended_at.unwrap_or_else(now_ms)),
        }
    }

    /// Highest loop id this record knows about
    pub fn latest_id(&self) -> Option<LoopId> {
        self.loop_id.max(self.last_loop_id)
    }

    pub fn is_running(&self) -> bool {
        self.status == LoopStatus::Running
    }
}
