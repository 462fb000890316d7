//! The value a stage executor hands back to the runner.

use crate::errors::ErrorDetail;
use serde::{Deserialize, Serialize};

/// The result of one executor invocation.
///
/// Failures are values: an executor never signals failure by panicking or by
/// returning `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage produced output.
    Succeeded {
        /// Generated text.
        output: String,
        /// Number of capability calls it took.
        #[serde(default = "one")]
        attempts: u32,
    },
    /// The stage failed.
    Failed {
        /// What went wrong.
        error: ErrorDetail,
        /// Number of capability calls made before giving up.
        #[serde(default = "one")]
        attempts: u32,
    },
}

fn one() -> u32 {
    1
}

impl StageOutcome {
    /// Creates a successful outcome from a single attempt.
    #[must_use]
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self::Succeeded {
            output: output.into(),
            attempts: 1,
        }
    }

    /// Creates a failed outcome from a single attempt.
    #[must_use]
    pub fn failed(error: impl Into<ErrorDetail>) -> Self {
        Self::Failed {
            error: error.into(),
            attempts: 1,
        }
    }

    /// Overrides the attempt count.
    #[must_use]
    pub fn with_attempts(mut self, n: u32) -> Self {
        match &mut self {
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => *attempts = n,
        }
        self
    }

    /// Returns true if the stage produced output.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Returns the output text, if any.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Succeeded { output, .. } => Some(output),
            Self::Failed { .. } => None,
        }
    }

    /// Returns the failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorDetail> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// Returns the number of capability calls made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}
