//! Error types for Kaizen
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Kaizen
#[derive(Debug, Error)]
pub enum KaizenError {
    /// A collaborator call failed (network, HTTP status)
    #[error("{service} call failed: {message}")]
    Collaborator { service: String, message: String },

    /// A collaborator or the executor did not answer in time
    #[error("{service} timeout after {after_ms}ms")]
    Timeout { service: String, after_ms: u64 },

    /// A collaborator answered with something we could not parse
    #[error("{service} parse error: {message}")]
    Parse { service: String, message: String },

    /// The step executor could not be run
    #[error("Executor error: {0}")]
    Executor(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error categories that warrant calling the self-repair collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Timeout,
    Parse,
}

impl KaizenError {
    pub fn timeout(service: impl Into<String>, after_ms: u64) -> Self {
        Self::Timeout {
            service: service.into(),
            after_ms,
        }
    }

    pub fn parse(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Classify this error for escalation purposes
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            KaizenError::Timeout { .. } => Some(ErrorCategory::Timeout),
            KaizenError::Parse { .. } => Some(ErrorCategory::Parse),
            other => {
                let message = other.to_string().to_lowercase();
                if message.contains("timeout") || message.contains("timed out") {
                    Some(ErrorCategory::Timeout)
                } else if message.contains("parse") {
                    Some(ErrorCategory::Parse)
                } else {
                    None
                }
            }
        }
    }
}

/// Result type alias for Kaizen operations
pub type Result<T> = std::result::Result<T, KaizenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_display() {
        let err = KaizenError::collaborator("planner", "connection refused");
        assert_eq!(err.to_string(), "planner call failed: connection refused");
    }

    #[test]
    fn test_timeout_error_display() {
        let err = KaizenError::timeout("reviewer", 120000);
        assert_eq!(err.to_string(), "reviewer timeout after 120000ms");
    }

    #[test]
    fn test_category_by_variant() {
        assert_eq!(
            KaizenError::timeout("executor", 1).category(),
            Some(ErrorCategory::Timeout)
        );
        assert_eq!(
            KaizenError::parse("planner", "missing field `steps`").category(),
            Some(ErrorCategory::Parse)
        );
        assert_eq!(KaizenError::collaborator("memory", "503").category(), None);
        assert_eq!(KaizenError::Storage("disk full".to_string()).category(), None);
    }

    #[test]
    fn test_category_by_message() {
        let err = KaizenError::Executor("child process timed out".to_string());
        assert_eq!(err.category(), Some(ErrorCategory::Timeout));

        let err = KaizenError::Executor("could not parse stdout".to_string());
        assert_eq!(err.category(), Some(ErrorCategory::Parse));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KaizenError = io_err.into();
        assert!(matches!(err, KaizenError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: KaizenError = json_err.into();
        assert!(matches!(err, KaizenError::Json(_)));
    }
}
