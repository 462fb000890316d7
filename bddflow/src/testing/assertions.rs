//! Assertions over pipeline runs.

use crate::core::{ErrorKind, RunStatus, StageStatus};
use crate::pipeline::PipelineRun;

/// Asserts the overall run status.
pub fn assert_run_status(run: &PipelineRun, expected: RunStatus) {
    assert_eq!(
        run.status, expected,
        "Expected run status {expected}, got {}",
        run.status
    );
}

/// Asserts the status of one stage.
pub fn assert_stage_status(run: &PipelineRun, stage_id: &str, expected: StageStatus) {
    let actual = run.stage(stage_id).map(|r| r.status());
    assert_eq!(
        actual,
        Some(expected),
        "Expected stage '{stage_id}' to be {expected}, got {actual:?}"
    );
}

/// Asserts the statuses of all stages, in execution order.
pub fn assert_statuses(run: &PipelineRun, expected: &[StageStatus]) {
    assert_eq!(
        run.statuses(),
        expected,
        "Unexpected stage statuses for run {}",
        run.run_id
    );
}

/// Asserts that a stage failed with the given kind.
pub fn assert_stage_failed_with(run: &PipelineRun, stage_id: &str, kind: ErrorKind) {
    assert_stage_status(run, stage_id, StageStatus::Failed);
    let actual = run.stage(stage_id).and_then(|r| r.error()).map(|e| e.kind);
    assert_eq!(
        actual,
        Some(kind),
        "Expected stage '{stage_id}' to fail with {kind}, got {actual:?}"
    );
}

/// Asserts that a stage succeeded with the given output.
pub fn assert_stage_output(run: &PipelineRun, stage_id: &str, expected: &str) {
    assert_stage_status(run, stage_id, StageStatus::Succeeded);
    assert_eq!(
        run.output(stage_id),
        Some(expected),
        "Unexpected output for stage '{stage_id}'"
    );
}
