//! Error types for the bddflow orchestrator.
//!
//! Stage-level failures are data (`ErrorDetail` inside a `StageOutcome`);
//! the types in this module cover the conditions that reject a run before it
//! starts, invariant violations, and the collaborators around the core.

use crate::core::{ErrorKind, StageStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for bddflow operations.
#[derive(Debug, Error)]
pub enum BddflowError {
    /// A pipeline or input validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A cycle was detected in the pipeline.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// The generative capability cannot serve any stage.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A stage execution failed. Only surfaces when a caller converts a
    /// failed stage into an error; the runner itself records it as data.
    #[error("Stage '{stage}' failed: {detail}")]
    StageExecutionFailed {
        /// The failed stage.
        stage: String,
        /// The captured failure.
        detail: ErrorDetail,
    },

    /// A dependency output was missing while composing a stage input.
    #[error("{0}")]
    MissingDependency(#[from] MissingDependencyError),

    /// An output was written twice for the same stage.
    #[error("{0}")]
    OutputConflict(#[from] OutputConflictError),

    /// A stage result was moved through an illegal status transition.
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransitionError),

    /// The run was cancelled.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// Document extraction failed.
    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-004-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when pipeline or run-input validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a cycle is detected in the pipeline graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "CONTRACT-004-CYCLE",
            format!("Pipeline contains a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the dependencies in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stages: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}

/// Raised by `ContextStore::compose` when a declared dependency has no
/// succeeded output. The runner never schedules such a stage, so this marks
/// a scheduling defect rather than a user-facing condition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Stage '{stage}' requires output of '{dependency}', which is not available")]
pub struct MissingDependencyError {
    /// The stage being composed.
    pub stage: String,
    /// The missing dependency.
    pub dependency: String,
}

impl MissingDependencyError {
    /// Creates a new missing dependency error.
    #[must_use]
    pub fn new(stage: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            dependency: dependency.into(),
        }
    }
}

/// Error raised when writing to an existing output in the context store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Output conflict for stage '{stage}': {message}")]
pub struct OutputConflictError {
    /// The stage name.
    pub stage: String,
    /// Additional message.
    pub message: String,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a stage result is moved backwards or out of a terminal
/// status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Stage '{stage}' cannot move from {from} to {to}")]
pub struct InvalidTransitionError {
    /// The stage whose result was touched.
    pub stage: String,
    /// Current status.
    pub from: StageStatus,
    /// Requested status.
    pub to: StageStatus,
}

/// A failure captured from a stage execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ErrorDetail {
    /// Distinguishing kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Whether a retry could plausibly succeed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl ErrorDetail {
    /// Creates a new error detail; retryability follows the kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_transient(),
        }
    }

    /// Creates a timeout detail.
    #[must_use]
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("stage did not finish within {:.3}s", after.as_secs_f64()),
        )
    }
}

/// Errors returned by a generative capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The capability cannot be used at all (missing credential, bad setup).
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// The credential was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The backend asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network or server-side failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The backend answered without any text.
    #[error("empty response")]
    EmptyResponse,

    /// The backend answered with something we cannot parse.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl CapabilityError {
    /// Returns the stage error kind this failure maps to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::EmptyResponse => ErrorKind::EmptyResponse,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    /// Returns true if retrying the call could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

impl From<CapabilityError> for ErrorDetail {
    fn from(err: CapabilityError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Errors raised while turning an uploaded document into pipeline input.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file extension is not one we can read.
    #[error("Unsupported document format: .{0}")]
    UnsupportedFormat(String),

    /// The file could not be parsed.
    #[error("Could not read {format} document: {reason}")]
    Corrupt {
        /// Document format.
        format: &'static str,
        /// Parser message.
        reason: String,
    },

    /// The document contains no text.
    #[error("Document contains no extractable text")]
    Empty,

    /// IO error while reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);

        assert!(err.to_string().contains("a -> b -> a"));
        let validation: PipelineValidationError = err.into();
        assert_eq!(validation.code(), Some("CONTRACT-004-CYCLE"));
        assert_eq!(validation.stages.len(), 3);
    }

    #[test]
    fn test_capability_error_kinds() {
        assert_eq!(CapabilityError::RateLimited("slow".into()).kind(), ErrorKind::RateLimited);
        assert_eq!(CapabilityError::EmptyResponse.kind(), ErrorKind::EmptyResponse);
        assert!(CapabilityError::Transport("reset".into()).is_transient());
        assert!(!CapabilityError::Authentication("bad key".into()).is_transient());
    }

    #[test]
    fn test_error_detail_from_capability_error() {
        let detail: ErrorDetail = CapabilityError::Timeout("30s".into()).into();
        assert_eq!(detail.kind, ErrorKind::Timeout);
        assert!(!detail.retryable);
        assert!(detail.message.contains("30s"));
    }

    #[test]
    fn test_missing_dependency_message() {
        let err = MissingDependencyError::new("user_stories", "domain_story");
        assert!(err.to_string().contains("'domain_story'"));
    }
}
