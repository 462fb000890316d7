//! Failure handling policy and per-run failure summaries.

use crate::core::{ErrorKind, StageResult, StageStatus};
use serde::{Deserialize, Serialize};

/// What a run does after a stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Skip dependents of the failed stage, keep running independent branches.
    #[default]
    ContinueOnFailure,
    /// Skip every stage that has not started yet.
    FailFast,
}

impl FailureMode {
    /// Returns true if a single failure should stop scheduling new stages.
    #[must_use]
    pub fn stops_on_failure(self) -> bool {
        matches!(self, Self::FailFast)
    }
}

/// A failed stage and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage identifier.
    pub stage: String,
    /// Failure category.
    pub kind: ErrorKind,
    /// Error message.
    pub message: String,
    /// Whether a later retry might succeed.
    pub retryable: bool,
}

/// Counts of stage outcomes in a run, plus the failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Total number of stages.
    pub total: usize,
    /// Stages that succeeded.
    pub succeeded: usize,
    /// Stages that failed.
    pub failed: usize,
    /// Stages skipped because an upstream stage did not succeed.
    pub skipped: usize,
    /// Stages cancelled.
    pub cancelled: usize,
    /// Failure records in execution order.
    pub failures: Vec<FailureRecord>,
}

impl FailureSummary {
    /// Tallies a sequence of results.
    #[must_use]
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a StageResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.total += 1;
            match result.status() {
                StageStatus::Succeeded => summary.succeeded += 1,
                StageStatus::Failed => {
                    summary.failed += 1;
                    if let Some(error) = result.error() {
                        summary.failures.push(FailureRecord {
                            stage: result.stage_id.clone(),
                            kind: error.kind,
                            message: error.message.clone(),
                            retryable: error.retryable,
                        });
                    }
                }
                StageStatus::Skipped => summary.skipped += 1,
                StageStatus::Cancelled => summary.cancelled += 1,
                StageStatus::Pending | StageStatus::Running => {}
            }
        }
        summary
    }

    /// Fraction of stages that succeeded.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }

    /// Returns true if any stage failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Returns true if every stage succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.total > 0 && self.succeeded == self.total
    }
}
