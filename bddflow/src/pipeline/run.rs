//! The record of one pipeline run.

use super::FailureSummary;
use crate::context::ContextStore;
use crate::core::{RunStatus, StageResult, StageStatus};
use crate::utils::{generate_run_id, now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// One execution of a pipeline definition.
///
/// Stage results are kept in the execution order of the definition. The
/// context store holds the outputs of succeeded stages and is not
/// serialized; succeeded outputs are already part of the stage results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Run identifier (UUID v4).
    pub run_id: String,
    /// Name of the pipeline definition.
    pub pipeline_name: String,
    /// Overall status.
    pub status: RunStatus,
    /// Per-stage results, in execution order.
    pub stages: Vec<StageResult>,
    /// Length of the initial input, in characters.
    pub input_chars: usize,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Why the run was cancelled, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip)]
    context: ContextStore,
}

impl PipelineRun {
    pub(crate) fn new(
        pipeline_name: impl Into<String>,
        stage_ids: impl IntoIterator<Item = impl Into<String>>,
        input: &str,
    ) -> Self {
        Self {
            run_id: generate_run_id(),
            pipeline_name: pipeline_name.into(),
            status: RunStatus::NotStarted,
            stages: stage_ids.into_iter().map(StageResult::pending).collect(),
            input_chars: input.chars().count(),
            started_at: now_utc(),
            finished_at: None,
            cancellation_reason: None,
            context: ContextStore::new(input),
        }
    }

    /// Returns the result for a stage.
    #[must_use]
    pub fn stage(&self, stage_id: &str) -> Option<&StageResult> {
        self.stages.iter().find(|r| r.stage_id == stage_id)
    }

    /// Returns the output of a succeeded stage.
    #[must_use]
    pub fn output(&self, stage_id: &str) -> Option<&str> {
        self.stage(stage_id).and_then(StageResult::output)
    }

    /// Returns the context store of succeeded outputs.
    #[must_use]
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut ContextStore {
        &mut self.context
    }

    /// Stage statuses in execution order.
    #[must_use]
    pub fn statuses(&self) -> Vec<StageStatus> {
        self.stages.iter().map(StageResult::status).collect()
    }

    /// Identifiers of succeeded stages, in execution order.
    #[must_use]
    pub fn succeeded_stage_ids(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|r| r.status() == StageStatus::Succeeded)
            .map(|r| r.stage_id.as_str())
            .collect()
    }

    /// Counts of stage outcomes and the failures.
    #[must_use]
    pub fn summary(&self) -> FailureSummary {
        FailureSummary::from_results(&self.stages)
    }

    /// Returns true if every stage succeeded.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_reason.is_some()
    }

    /// Wall-clock duration of the run, in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Derives the overall status from the stage results.
    pub(crate) fn derived_status(&self) -> RunStatus {
        if self.stages.iter().all(|r| r.status() == StageStatus::Succeeded) {
            RunStatus::Completed
        } else {
            RunStatus::PartiallyFailed
        }
    }
}
