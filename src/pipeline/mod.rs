//! The improvement loop
//!
//! `Orchestrator` drives one iteration through the fixed stage sequence and
//! owns the state the stages share. The remaining modules are the pure
//! pieces it is assembled from.

mod context;
mod escalation;
mod orchestrator;
mod stage;
mod strategist;

use crate::id::LoopId;

pub use context::{DEFAULT_MISSION, PlanningContext, reflect_prompt};
pub use escalation::{EscalationPolicy, spawn_escalation};
pub use orchestrator::{LedgerSummary, LoopSummary, Orchestrator, RetentionReport};
pub use stage::Stage;
pub use strategist::{CORE_MISSION, MissionRejection, accept_or_fallback, fallback_mission, validate_mission};

/// Answer to a request to start a loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopRequest {
    /// A loop was started in the background
    Started(LoopId),
    /// Another loop holds the slot; retry later
    AlreadyRunning,
    /// The status record could not be read or written
    Failed(String),
}
