//! Executor results

use serde::{Deserialize, Serialize};

/// A step that ran successfully
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSuccess {
    pub title: String,
    pub bash: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
}

/// A step that failed, with the stderr that explains why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "command")]
    pub bash: String,
    #[serde(default = "unknown_error")]
    pub stderr: String,
}

fn unknown_error() -> String {
    "Unknown error".to_string()
}

/// Outcome of one executor batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub success: Vec<StepSuccess>,
    #[serde(default)]
    pub failed: Vec<StepFailure>,
    pub final_report_md: String,
}

impl ExecutionResult {
    /// Result for a batch that never reached the executor
    pub fn not_executed(report: impl Into<String>) -> Self {
        Self {
            success: Vec::new(),
            failed: Vec::new(),
            final_report_md: report.into(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
