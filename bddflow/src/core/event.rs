//! Transition events emitted by the runner.

use super::{RunStatus, StageStatus};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "status", rename_all = "snake_case")]
pub enum EventStatus {
    /// The run moved to a new status.
    Run(RunStatus),
    /// A stage moved to a new status.
    Stage(StageStatus),
}

/// A single status transition, emitted once per transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The run that produced the event.
    pub run_id: String,
    /// The stage, for stage transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    /// The new status.
    pub status: EventStatus,
    /// When the transition happened.
    pub timestamp: Timestamp,
    /// Error message, skip reason or cancel reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PipelineEvent {
    /// Creates a run-level event.
    #[must_use]
    pub fn run(run_id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            run_id: run_id.into(),
            stage_id: None,
            status: EventStatus::Run(status),
            timestamp: now_utc(),
            detail: None,
        }
    }

    /// Creates a stage-level event.
    #[must_use]
    pub fn stage(run_id: impl Into<String>, stage_id: impl Into<String>, status: StageStatus) -> Self {
        Self {
            run_id: run_id.into(),
            stage_id: Some(stage_id.into()),
            status: EventStatus::Stage(status),
            timestamp: now_utc(),
            detail: None,
        }
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Returns a dotted event name such as `stage.succeeded` or `run.completed`.
    #[must_use]
    pub fn event_type(&self) -> String {
        match self.status {
            EventStatus::Run(status) => format!("run.{status}"),
            EventStatus::Stage(status) => format!("stage.{status}"),
        }
    }

    /// Returns the stage status carried by a stage event.
    #[must_use]
    pub fn stage_status(&self) -> Option<StageStatus> {
        match self.status {
            EventStatus::Stage(status) => Some(status),
            EventStatus::Run(_) => None,
        }
    }
}
