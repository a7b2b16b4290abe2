//! Process-backed step executor
//!
//! Runs the configured program once per batch with the approved steps as a
//! single JSON argument and reads an `ExecutionResult` from its stdout. The
//! whole batch shares one hard timeout; the child is killed when it expires.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::StepExecutor;
use crate::config::ExecutorConfig;
use crate::domain::{ExecutionResult, ReviewedStep};
use crate::error::{KaizenError, Result};

#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    program: PathBuf,
    args: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ScriptExecutor {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(&config.program, &config.working_dir, Duration::from_millis(config.timeout_ms))
            .with_args(config.args.clone())
    }

    /// Arguments placed before the steps JSON
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

#[async_trait]
impl StepExecutor for ScriptExecutor {
    async fn execute(&self, steps: &[ReviewedStep]) -> Result<ExecutionResult> {
        let steps_json = serde_json::to_string(steps)?;
        log::info!("Executing {} approved steps via {}", steps.len(), self.program.display());

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&steps_json)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KaizenError::Executor(format!("Failed to start {}: {}", self.program.display(), e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| KaizenError::timeout("executor", self.timeout.as_millis() as u64))??;

        if !output.status.success() {
            log::warn!(
                "Executor exited with {}: {}",
                output.status,
                crate::text::truncate_chars(String::from_utf8_lossy(&output.stderr).trim(), 500)
            );
        }

        // A non-zero exit with a valid report is still a report
        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim())
            .map_err(|e| KaizenError::parse("executor", format!("Failed to parse executor output: {}", e)))
    }
}
