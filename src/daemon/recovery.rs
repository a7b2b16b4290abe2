//! Crash Recovery - resets a loop left running by a dead process
//!
//! A status record that says `running` at startup can only come from a
//! process that died mid-loop. The record is reset to idle, the interrupted
//! loop gets an error artifact and its ledger entry is closed.

use crate::domain::{ArtifactKind, LoopRun, LoopStatus};
use crate::error::Result;
use crate::id::now_ms;
use crate::storage::{ArtifactStore, LoopOutcome, LoopStore, Storage};

use super::state::LoopStateManager;

/// Result of the startup recovery check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Nothing was running
    Clean,
    /// An interrupted loop was reset to idle
    Reset { loop_id: String, ordinal: u64 },
}

/// Reset an interrupted loop, if any
pub fn recover_interrupted<S: Storage>(
    state: &LoopStateManager,
    artifacts: &ArtifactStore,
    storage: &S,
) -> Result<RecoveryAction> {
    let Some(stale) = state.reset_stale()? else {
        return Ok(RecoveryAction::Clean);
    };
    let Some(loop_id) = stale.loop_id.or(stale.last_loop_id) else {
        return Ok(RecoveryAction::Clean);
    };

    log::warn!("Loop {} was interrupted by a restart, marked idle", loop_id);

    let message = format!(
        "Loop {} was interrupted: the process exited while the loop was running.\nStarted at: {}\nRecovered at: {}\n",
        loop_id,
        stale.start_time.map(|t| t.to_string()).unwrap_or_else(|| "unknown".into()),
        now_ms()
    );
    artifacts.write_text(loop_id, ArtifactKind::Error, &message)?;

    let run = LoopRun {
        id: loop_id,
        ordinal: stale.ordinal,
        status: LoopStatus::Idle,
        started_at: stale.start_time.unwrap_or_default(),
        ended_at: Some(now_ms()),
    };
    LoopStore::new(storage).record_end(&run, LoopOutcome::Interrupted)?;

    Ok(RecoveryAction::Reset {
        loop_id: loop_id.to_string(),
        ordinal: stale.ordinal,
    })
}
