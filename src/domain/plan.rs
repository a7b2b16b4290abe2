//! Planner and reviewer documents
//!
//! These are the typed shapes of the collaborator responses. Required fields
//! are required: a planner answer without `steps` is a parse error, not an
//! empty plan.

use serde::{Deserialize, Deserializer, Serialize};

/// A shell step proposed by the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedStep {
    pub title: String,
    pub bash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_net: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
}

impl ProposedStep {
    pub fn new(title: impl Into<String>, bash: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            bash: bash.into(),
            cwd: None,
            allow_net: None,
            timeout_sec: None,
        }
    }
}

/// Planner output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<ProposedStep>,
    #[serde(default)]
    pub spec_md: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todo_md: Option<String>,
}

/// Reviewer risk assessment for one step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Accept any JSON for the score; anything but a number becomes `None`
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

/// A step the reviewer approved, possibly patched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedStep {
    pub title: String,
    pub bash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_net: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Fail-closed ceiling applied to absent or malformed scores
pub const MAX_RISK: f64 = 1.0;

impl ReviewedStep {
    pub fn new(title: impl Into<String>, bash: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            title: title.into(),
            bash: bash.into(),
            cwd: None,
            allow_net: None,
            timeout_sec: None,
            risk: score.map(|s| RiskAssessment {
                score: Some(s),
                ..Default::default()
            }),
            note: None,
        }
    }

    /// Score used for gating; absent, NaN or out-of-range scores count as maximal risk
    pub fn effective_risk(&self) -> f64 {
        match self.risk.as_ref().and_then(|r| r.score) {
            Some(score) if score.is_finite() && (0.0..=MAX_RISK).contains(&score) => score,
            _ => MAX_RISK,
        }
    }
}

/// A step the reviewer refused
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedStep {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub original_bash: String,
}

/// Reviewer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub approved_steps: Vec<ReviewedStep>,
    #[serde(default)]
    pub rejected: Vec<RejectedStep>,
    #[serde(default)]
    pub summary_md: String,
}

/// Reflector output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub reflection_md: String,
}

/// Strategist output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionUpdate {
    pub mission_md: String,
}

/// Render steps as `# title\ncommand` blocks
pub fn render_steps<'a>(steps: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    steps
        .into_iter()
        .map(|(title, bash)| format!("# {}\n{}", title, bash))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Audit juxtaposition of the proposed plan and the reviewer-approved steps
pub fn plan_review_diff(plan: &Plan, review: &Review) -> String {
    let original = render_steps(plan.steps.iter().map(|s| (s.title.as_str(), s.bash.as_str())));
    let approved = render_steps(
        review
            .approved_steps
            .iter()
            .map(|s| (s.title.as_str(), s.bash.as_str())),
    );
    format!(
        "--- Original Plan ---\n{}\n\n+++ Approved Plan +++\n{}",
        original, approved
    )
}
