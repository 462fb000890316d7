//! Per-stage result record with monotonic status transitions.

use super::StageStatus;
use crate::errors::{ErrorDetail, InvalidTransitionError};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// The record of one stage within one run.
///
/// Output is present iff the status is `Succeeded`; the error iff it is
/// `Failed`. Once the status is terminal every mutator returns an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage identifier.
    pub stage_id: String,
    status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<Timestamp>,
    #[serde(default)]
    attempts: u32,
}

impl StageResult {
    /// Creates a pending result.
    #[must_use]
    pub fn pending(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            status: StageStatus::Pending,
            output: None,
            error: None,
            reason: None,
            started_at: None,
            finished_at: None,
            attempts: 0,
        }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        self.status
    }

    /// Returns the output text (only for succeeded stages).
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Returns the failure detail (only for failed stages).
    #[must_use]
    pub fn error(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    /// Returns the skip or cancel reason.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// When the stage entered `running`.
    #[must_use]
    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    /// When the stage reached a terminal status.
    #[must_use]
    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    /// Number of capability calls recorded for this stage.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wall-clock duration between start and finish, in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    /// Moves `pending -> running`.
    pub fn start(&mut self) -> Result<(), InvalidTransitionError> {
        self.transition(StageStatus::Running)?;
        self.started_at = Some(now_utc());
        Ok(())
    }

    /// Moves `running -> succeeded` and stores the output.
    pub fn succeed(&mut self, output: String, attempts: u32) -> Result<(), InvalidTransitionError> {
        self.transition(StageStatus::Succeeded)?;
        self.output = Some(output);
        self.attempts = attempts;
        self.finish();
        Ok(())
    }

    /// Moves `running -> failed` and stores the error.
    pub fn fail(&mut self, error: ErrorDetail, attempts: u32) -> Result<(), InvalidTransitionError> {
        self.transition(StageStatus::Failed)?;
        self.error = Some(error);
        self.attempts = attempts;
        self.finish();
        Ok(())
    }

    /// Moves `pending -> skipped`.
    pub fn skip(&mut self, reason: impl Into<String>) -> Result<(), InvalidTransitionError> {
        self.transition(StageStatus::Skipped)?;
        self.reason = Some(reason.into());
        self.finish();
        Ok(())
    }

    /// Moves `pending | running -> cancelled`.
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), InvalidTransitionError> {
        self.transition(StageStatus::Cancelled)?;
        self.reason = Some(reason.into());
        self.finish();
        Ok(())
    }

    fn transition(&mut self, next: StageStatus) -> Result<(), InvalidTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransitionError {
                stage: self.stage_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn finish(&mut self) {
        self.finished_at = Some(now_utc());
    }
}
