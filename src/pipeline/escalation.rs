//! Escalation trigger
//!
//! Self-repair is invoked on a fixed cadence of loop ordinals and after a
//! loop dies of a timeout or parse error. The call is detached from the
//! loop: its failure is logged and dropped.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::collab::{Diagnosis, SelfRepair};
use crate::error::{ErrorCategory, KaizenError};
use crate::id::LoopId;
use crate::text::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub cadence: u64,
}

impl EscalationPolicy {
    pub fn new(cadence: u64) -> Self {
        Self { cadence: cadence.max(1) }
    }

    pub fn from_config(config: &crate::config::EscalationConfig) -> Self {
        Self::new(config.cadence)
    }

    /// Trigger reason for a loop that ended at `ordinal`, if any
    ///
    /// The scheduled trigger wins when both apply, so one loop escalates
    /// at most once.
    pub fn trigger_for(&self, ordinal: u64, error: Option<&KaizenError>) -> Option<String> {
        if ordinal > 0 && ordinal % self.cadence == 0 {
            return Some(format!("scheduled_{}_loops", self.cadence));
        }
        let error = error?;
        match error.category()? {
            ErrorCategory::Timeout | ErrorCategory::Parse => {
                Some(format!("error: {}", truncate_chars(&error.to_string(), 100)))
            }
        }
    }

    /// Scheduled self-repair runs completed by `ordinal`
    pub fn escalation_runs(&self, ordinal: u64) -> u64 {
        ordinal / self.cadence
    }
}

/// Invoke self-repair in the background; failures are logged and swallowed
pub fn spawn_escalation(
    self_repair: Arc<dyn SelfRepair>,
    loop_id: LoopId,
    trigger: String,
) -> JoinHandle<Option<Diagnosis>> {
    log::warn!("Loop {}: escalating to self-repair ({})", loop_id, trigger);
    tokio::spawn(async move {
        match self_repair.improve(&trigger).await {
            Ok(diagnosis) => {
                log::info!("Loop {}: self-repair answered: {}", loop_id, truncate_chars(&diagnosis.diagnosis, 200));
                Some(diagnosis)
            }
            Err(e) => {
                log::error!("Loop {}: self-repair failed: {}", loop_id, e);
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::mock::MockSelfRepair;

    #[test]
    fn test_scheduled_every_cadence() {
        let policy = EscalationPolicy::new(32);
        assert_eq!(policy.trigger_for(32, None).as_deref(), Some("scheduled_32_loops"));
        assert_eq!(policy.trigger_for(64, None).as_deref(), Some("scheduled_32_loops"));
        assert!(policy.trigger_for(31, None).is_none());
        assert!(policy.trigger_for(0, None).is_none());
    }

    #[test]
    fn test_error_categories() {
        let policy = EscalationPolicy::new(32);

        let timeout = KaizenError::timeout("plan", 120_000);
        let trigger = policy.trigger_for(5, Some(&timeout)).unwrap();
        assert!(trigger.starts_with("error: "));
        assert!(trigger.contains("plan"));

        let parse = KaizenError::parse("executor", "expected value at line 1");
        assert!(policy.trigger_for(5, Some(&parse)).is_some());

        let refused = KaizenError::collaborator("review", "connection refused");
        assert!(policy.trigger_for(5, Some(&refused)).is_none());
    }

    #[test]
    fn test_scheduled_takes_precedence_over_error() {
        let policy = EscalationPolicy::new(32);
        let timeout = KaizenError::timeout("plan", 1);
        assert_eq!(
            policy.trigger_for(32, Some(&timeout)).as_deref(),
            Some("scheduled_32_loops")
        );
    }

    #[test]
    fn test_error_trigger_is_truncated() {
        let policy = EscalationPolicy::new(32);
        let long = KaizenError::Executor(format!("timeout {}", "x".repeat(300)));
        let trigger = policy.trigger_for(1, Some(&long)).unwrap();
        assert_eq!(trigger.chars().count(), "error: ".len() + 100);
    }

    #[test]
    fn test_escalation_runs() {
        let policy = EscalationPolicy::new(32);
        assert_eq!(policy.escalation_runs(31), 0);
        assert_eq!(policy.escalation_runs(64), 2);
    }

    #[tokio::test]
    async fn test_spawned_failure_is_swallowed() {
        let repair = Arc::new(MockSelfRepair::failing());
        let handle = spawn_escalation(repair.clone(), LoopId(7), "manual".into());
        assert!(handle.await.unwrap().is_none());
        assert_eq!(repair.triggers(), vec!["manual".to_string()]);
    }
}
