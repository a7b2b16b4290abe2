//! Domain types for Kaizen
//!
//! - LoopRun / StatusRecord: one loop iteration and the persisted run status
//! - Plan / Review: typed collaborator documents validated at the boundary
//! - ExecutionResult: what the step executor reports for one batch
//! - ArtifactKind: the per-stage files keyed by loop id

pub mod artifact;
pub mod execution;
pub mod loop_run;
pub mod plan;

pub use artifact::{ArtifactKind, ArtifactName};
pub use execution::{ExecutionResult, StepFailure, StepSuccess};
pub use loop_run::{LoopRun, LoopStatus, StatusRecord};
pub use plan::{
    MissionUpdate, Plan, ProposedStep, Reflection, RejectedStep, Review, ReviewedStep, RiskAssessment,
    plan_review_diff,
};
