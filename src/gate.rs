//! Risk gate
//!
//! The only authorization boundary between what the reviewer approved and
//! what runs automatically. A step passes when its effective risk is at or
//! below the threshold; the first `max_steps` passing steps are kept in
//! their original order.

use serde::Serialize;

use crate::domain::ReviewedStep;

/// Gate settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskGate {
    pub threshold: f64,
    pub max_steps: usize,
}

/// Result of running the gate over one review
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateOutcome {
    /// The approved batch, in review order
    pub approved: Vec<ReviewedStep>,
    /// Steps over the threshold, with the effective score used
    pub excluded: Vec<(ReviewedStep, f64)>,
    /// Passing steps dropped by the cap
    pub truncated: Vec<ReviewedStep>,
}

impl RiskGate {
    pub fn new(threshold: f64, max_steps: usize) -> Self {
        Self { threshold, max_steps }
    }

    pub fn from_config(config: &crate::config::GateConfig) -> Self {
        Self::new(config.risk_threshold, config.max_steps)
    }

    /// Filter and cap the reviewer-approved steps
    pub fn apply(&self, steps: &[ReviewedStep]) -> GateOutcome {
        let mut outcome = GateOutcome::default();

        for step in steps {
            let risk = step.effective_risk();
            if risk > self.threshold {
                outcome.excluded.push((step.clone(), risk));
            } else if outcome.approved.len() < self.max_steps {
                outcome.approved.push(step.clone());
            } else {
                outcome.truncated.push(step.clone());
            }
        }

        outcome
    }
}

/// One step as recorded in the gate audit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditStep {
    pub title: String,
    pub bash: String,
    pub risk: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditStep {
    pub fn new(step: &ReviewedStep, reason: Option<String>) -> Self {
        Self {
            title: step.title.clone(),
            bash: step.bash.clone(),
            risk: step.effective_risk(),
            reason,
        }
    }
}

/// The `{loopId}_gate.json` audit document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateAudit {
    pub threshold: f64,
    pub max_steps: usize,
    pub approved: Vec<AuditStep>,
    pub excluded_by_risk: Vec<AuditStep>,
    pub truncated_by_cap: Vec<AuditStep>,
    pub skipped_known_failure: Vec<AuditStep>,
}

impl GateAudit {
    pub fn new(gate: &RiskGate, outcome: &GateOutcome) -> Self {
        Self {
            threshold: gate.threshold,
            max_steps: gate.max_steps,
            approved: outcome.approved.iter().map(|s| AuditStep::new(s, None)).collect(),
            excluded_by_risk: outcome
                .excluded
                .iter()
                .map(|(s, risk)| AuditStep::new(s, Some(format!("risk {:.2} above threshold", risk))))
                .collect(),
            truncated_by_cap: outcome.truncated.iter().map(|s| AuditStep::new(s, None)).collect(),
            skipped_known_failure: Vec::new(),
        }
    }
}
