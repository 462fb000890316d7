//! Status, kind and error-kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared shape of a stage's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Unstructured prose.
    #[default]
    FreeText,
    /// A document with a recognizable structure (markdown, gherkin, source code).
    StructuredDocument,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeText => write!(f, "free_text"),
            Self::StructuredDocument => write!(f, "structured_document"),
        }
    }
}

/// The execution status of a single stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started.
    #[default]
    Pending,
    /// Stage is currently running.
    Running,
    /// Stage produced output.
    Succeeded,
    /// Stage ran and failed.
    Failed,
    /// Stage was never executed because a dependency did not succeed.
    Skipped,
    /// Stage was cancelled before finishing.
    Cancelled,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl StageStatus {
    /// Returns true if no further transition may occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// Returns true if the stage produced output.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if moving to `next` keeps the status monotonic.
    ///
    /// Allowed: `pending -> running | skipped | cancelled` and
    /// `running -> succeeded | failed | cancelled`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Skipped | Self::Cancelled),
            Self::Running => matches!(next, Self::Succeeded | Self::Failed | Self::Cancelled),
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Cancelled => false,
        }
    }
}

/// The status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run has been created but no stage has been scheduled.
    #[default]
    NotStarted,
    /// Stages are being executed.
    InProgress,
    /// Every stage succeeded.
    Completed,
    /// At least one stage did not succeed.
    PartiallyFailed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::PartiallyFailed => write!(f, "partially_failed"),
        }
    }
}

impl RunStatus {
    /// Returns true for `Completed` and `PartiallyFailed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::PartiallyFailed)
    }
}

/// Distinguishes why a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Capability not usable (missing credential, bad configuration).
    Unavailable,
    /// Credential rejected by the backend.
    Authentication,
    /// Backend rate limit.
    RateLimited,
    /// Network or server error.
    Transport,
    /// Deadline exceeded.
    Timeout,
    /// Backend returned no text.
    EmptyResponse,
    /// Backend returned something unparseable.
    MalformedResponse,
    /// The composed input was blank.
    EmptyInput,
    /// A dependency output was missing at composition time.
    MissingDependency,
    /// The executor panicked or another internal defect occurred.
    Internal,
}

impl ErrorKind {
    /// Returns true if a retry could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transport)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unavailable => "unavailable",
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::EmptyResponse => "empty_response",
            Self::MalformedResponse => "malformed_response",
            Self::EmptyInput => "empty_input",
            Self::MissingDependency => "missing_dependency",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(StageStatus::Skipped.to_string(), "skipped");
        assert_eq!(StageStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Succeeded.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
        assert!(StageStatus::Cancelled.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        use StageStatus::*;

        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Succeeded));

        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));
        assert!(!Running.can_transition_to(Pending));

        for terminal in [Succeeded, Failed, Skipped, Cancelled] {
            for next in [Pending, Running, Succeeded, Failed, Skipped, Cancelled] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Succeeded).unwrap();
        assert_eq!(json, r#""succeeded""#);

        let json = serde_json::to_string(&RunStatus::PartiallyFailed).unwrap();
        assert_eq!(json, r#""partially_failed""#);

        let kind: ErrorKind = serde_json::from_str(r#""rate_limited""#).unwrap();
        assert_eq!(kind, ErrorKind::RateLimited);
    }

    #[test]
    fn test_error_kind_transient() {
        assert!(ErrorKind::RateLimited.is_transient());
        assert!(ErrorKind::Transport.is_transient());
        assert!(!ErrorKind::Authentication.is_transient());
        assert!(!ErrorKind::EmptyResponse.is_transient());
        assert!(!ErrorKind::Timeout.is_transient());
    }
}
