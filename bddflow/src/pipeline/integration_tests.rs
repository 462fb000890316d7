//! End-to-end runner tests over scripted executors.

use crate::cancellation::CancellationToken;
use crate::core::{ErrorKind, PipelineEvent, RunStatus, StageStatus};
use crate::errors::{BddflowError, CapabilityError, ErrorDetail};
use crate::events::{CollectingEventSink, EventSink};
use crate::executor::GenerativeExecutor;
use crate::pipeline::{
    bdd_pipeline, stage_ids, FailureMode, JitterStrategy, PipelineBuilder, PipelineDefinition,
    PipelineRunner, RetryConfig, RunnerConfig, StageSpec,
};
use crate::testing::{
    assert_run_status, assert_stage_failed_with, assert_stage_output, assert_stage_status,
    assert_statuses, ScriptedCapability, StubExecutor,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

use StageStatus::{Cancelled, Failed, Skipped, Succeeded};

const NARRATIVE: &str = "A bakery takes online orders and delivers fresh bread every morning.";

fn diamond() -> PipelineDefinition {
    PipelineBuilder::new("diamond")
        .stage(StageSpec::new("a", "Start from {{input}}"))
        .and_then(|b| b.stage(StageSpec::new("b", "Left of {{a}}").with_dependency("a")))
        .and_then(|b| b.stage(StageSpec::new("c", "Right of {{a}}").with_dependency("a")))
        .and_then(|b| {
            b.stage(
                StageSpec::new("d", "Join both branches.")
                    .with_dependencies(["b", "c"]),
            )
        })
        .and_then(PipelineBuilder::build)
        .unwrap()
}

fn independent(ids: &[&str]) -> PipelineDefinition {
    let mut builder = PipelineBuilder::new("independent");
    for id in ids {
        builder
            .add_stage_spec(StageSpec::new(*id, "Work on {{input}}"))
            .unwrap();
    }
    builder.build().unwrap()
}

/// Cancels a token as soon as a given stage starts running.
struct CancelWhenRunning {
    stage: &'static str,
    token: Arc<CancellationToken>,
}

impl EventSink for CancelWhenRunning {
    fn try_emit(&self, event: &PipelineEvent) {
        if event.stage_id.as_deref() == Some(self.stage)
            && event.stage_status() == Some(StageStatus::Running)
        {
            self.token.cancel("user interrupt");
        }
    }
}

#[tokio::test]
async fn test_failure_in_chain_skips_downstream() {
    let executor = Arc::new(
        StubExecutor::new().fail_on(
            stage_ids::SCENARIOS,
            ErrorDetail::new(ErrorKind::Authentication, "key rejected"),
        ),
    );
    let runner = PipelineRunner::new(bdd_pipeline().unwrap(), executor.clone());

    let run = runner.run(NARRATIVE).await.unwrap();

    assert_run_status(&run, RunStatus::PartiallyFailed);
    assert_statuses(&run, &[Succeeded, Succeeded, Failed, Skipped, Skipped]);
    assert_stage_failed_with(&run, stage_ids::SCENARIOS, ErrorKind::Authentication);
    assert_eq!(
        executor.calls(),
        vec![stage_ids::DOMAIN_STORY, stage_ids::USER_STORIES, stage_ids::SCENARIOS]
    );
    assert!(run
        .stage(stage_ids::IMPLEMENTATION)
        .unwrap()
        .reason()
        .unwrap()
        .contains(stage_ids::SCENARIOS));
    assert!(!run.context().contains(stage_ids::SCENARIOS));
    assert_eq!(run.context().len(), 2);
}

#[tokio::test]
async fn test_stage_timeout_is_recorded_as_failure() {
    let executor = Arc::new(
        StubExecutor::new().with_delay(stage_ids::SCENARIOS, Duration::from_millis(500)),
    );
    let runner = PipelineRunner::new(bdd_pipeline().unwrap(), executor)
        .with_config(RunnerConfig::default().with_stage_timeout(Duration::from_millis(50)));

    let run = runner.run(NARRATIVE).await.unwrap();

    assert_run_status(&run, RunStatus::PartiallyFailed);
    assert_statuses(&run, &[Succeeded, Succeeded, Failed, Skipped, Skipped]);
    assert_stage_failed_with(&run, stage_ids::SCENARIOS, ErrorKind::Timeout);
}

#[tokio::test]
async fn test_outputs_flow_to_the_next_stage() {
    let executor = Arc::new(
        StubExecutor::new()
            .with_output(stage_ids::DOMAIN_STORY, "OUT-A")
            .with_output(stage_ids::USER_STORIES, "OUT-B")
            .with_output(stage_ids::SCENARIOS, "OUT-C")
            .with_output(stage_ids::IMPLEMENTATION, "OUT-D")
            .with_output(stage_ids::REVIEW, "OUT-E"),
    );
    let runner = PipelineRunner::new(bdd_pipeline().unwrap(), executor.clone());

    let run = runner.run(NARRATIVE).await.unwrap();

    assert_run_status(&run, RunStatus::Completed);
    assert!(executor
        .input_for(stage_ids::DOMAIN_STORY)
        .unwrap()
        .ends_with(NARRATIVE));

    let stories_input = executor.input_for(stage_ids::USER_STORIES).unwrap();
    assert!(stories_input.ends_with("\nOUT-A"));
    assert!(!stories_input.contains(NARRATIVE));

    let scenarios_input = executor.input_for(stage_ids::SCENARIOS).unwrap();
    assert!(scenarios_input.ends_with("\nOUT-B"));
    assert!(!scenarios_input.contains("OUT-A"));

    let review_input = executor.input_for(stage_ids::REVIEW).unwrap();
    assert!(review_input.ends_with("\nOUT-D"));
    assert!(!review_input.contains("OUT-C"));
    assert!(!review_input.contains("OUT-B"));

    assert_stage_output(&run, stage_ids::REVIEW, "OUT-E");
    assert_eq!(run.summary().succeeded, 5);
}

#[tokio::test]
async fn test_empty_input_rejected_before_any_stage() {
    let executor = Arc::new(StubExecutor::new());
    let events = Arc::new(CollectingEventSink::new());
    let runner = PipelineRunner::new(bdd_pipeline().unwrap(), executor.clone())
        .with_event_sink(events.clone());

    for input in ["", "   \n\t "] {
        let err = runner.run(input).await.unwrap_err();
        match err {
            BddflowError::Validation(e) => assert_eq!(e.code(), Some("INPUT-001-EMPTY")),
            other => panic!("unexpected error: {other}"),
        }
    }
    assert!(executor.calls().is_empty());
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_preflight_failure_rejects_run() {
    let executor = Arc::new(
        StubExecutor::new()
            .with_preflight_error(CapabilityError::Unavailable("GOOGLE_API_KEY is not set".into())),
    );
    let events = Arc::new(CollectingEventSink::new());
    let runner = PipelineRunner::new(bdd_pipeline().unwrap(), executor.clone())
        .with_event_sink(events.clone());

    let err = runner.run(NARRATIVE).await.unwrap_err();

    assert!(matches!(err, BddflowError::CapabilityUnavailable(ref m) if m.contains("GOOGLE_API_KEY")));
    assert!(executor.calls().is_empty());
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_cancellation_while_stage_runs() {
    let token = Arc::new(CancellationToken::new());
    let sink = Arc::new(CancelWhenRunning {
        stage: stage_ids::SCENARIOS,
        token: token.clone(),
    });
    let executor = Arc::new(
        StubExecutor::new().with_delay(stage_ids::SCENARIOS, Duration::from_secs(5)),
    );
    let runner =
        PipelineRunner::new(bdd_pipeline().unwrap(), executor.clone()).with_event_sink(sink);

    let run = tokio::time::timeout(
        Duration::from_secs(2),
        runner.run_with_cancellation(NARRATIVE, token),
    )
    .await
    .expect("cancellation should not wait for the in-flight stage")
    .unwrap();

    assert_run_status(&run, RunStatus::PartiallyFailed);
    assert_eq!(run.cancellation_reason.as_deref(), Some("user interrupt"));
    assert_stage_status(&run, stage_ids::DOMAIN_STORY, Succeeded);
    assert_stage_status(&run, stage_ids::USER_STORIES, Succeeded);
    assert!(matches!(
        run.stage(stage_ids::SCENARIOS).unwrap().status(),
        Succeeded | Failed | Cancelled
    ));
    assert_stage_status(&run, stage_ids::IMPLEMENTATION, Cancelled);
    assert_stage_status(&run, stage_ids::REVIEW, Cancelled);
    assert!(!executor.calls().contains(&stage_ids::IMPLEMENTATION.to_string()));
    assert_eq!(run.summary().cancelled, 3);
}

#[tokio::test]
async fn test_rerun_is_repeatable() {
    let runner = PipelineRunner::new(bdd_pipeline().unwrap(), Arc::new(StubExecutor::new()));

    let first = runner.run(NARRATIVE).await.unwrap();
    let second = runner.run(NARRATIVE).await.unwrap();

    assert_eq!(first.succeeded_stage_ids(), second.succeeded_stage_ids());
    assert_eq!(first.succeeded_stage_ids(), stage_ids::ALL.to_vec());
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_diamond_with_failing_branch() {
    let executor = Arc::new(
        StubExecutor::new().fail_on("b", ErrorDetail::new(ErrorKind::MalformedResponse, "garbled")),
    );
    let runner = PipelineRunner::new(diamond(), executor.clone())
        .with_config(RunnerConfig::default().with_max_concurrency(2));

    let run = runner.run(NARRATIVE).await.unwrap();

    assert_run_status(&run, RunStatus::PartiallyFailed);
    assert_stage_status(&run, "a", Succeeded);
    assert_stage_failed_with(&run, "b", ErrorKind::MalformedResponse);
    assert_stage_status(&run, "c", Succeeded);
    assert_stage_status(&run, "d", Skipped);
    assert!(run.stage("d").unwrap().reason().unwrap().contains("'b'"));
    assert!(!executor.calls().contains(&"d".to_string()));
}

#[tokio::test]
async fn test_diamond_join_receives_both_branches() {
    let executor = Arc::new(
        StubExecutor::new()
            .with_output("b", "LEFT")
            .with_output("c", "RIGHT"),
    );
    let runner = PipelineRunner::new(diamond(), executor.clone());

    let run = runner.run(NARRATIVE).await.unwrap();

    assert_run_status(&run, RunStatus::Completed);
    assert_eq!(
        executor.input_for("d").unwrap(),
        "Join both branches.\n\n## Context: b\n\nLEFT\n\n## Context: c\n\nRIGHT"
    );
}

#[tokio::test]
async fn test_independent_stages_run_concurrently() {
    let executor = Arc::new(StubExecutor::new().with_default_delay(Duration::from_millis(100)));
    let runner = PipelineRunner::new(independent(&["x", "y", "z"]), executor.clone())
        .with_config(RunnerConfig::default().with_max_concurrency(3));

    let run = runner.run(NARRATIVE).await.unwrap();

    assert_run_status(&run, RunStatus::Completed);
    assert_eq!(executor.max_in_flight(), 3);
}

#[tokio::test]
async fn test_default_concurrency_is_sequential() {
    let executor = Arc::new(StubExecutor::new().with_default_delay(Duration::from_millis(10)));
    let runner = PipelineRunner::new(independent(&["x", "y", "z"]), executor.clone());

    runner.run(NARRATIVE).await.unwrap();

    assert_eq!(executor.max_in_flight(), 1);
    assert_eq!(executor.calls(), vec!["x", "y", "z"]);
}

#[tokio::test]
async fn test_fail_fast_skips_independent_stages() {
    let failing = || {
        Arc::new(StubExecutor::new().fail_on("x", ErrorDetail::new(ErrorKind::Transport, "reset")))
    };

    let continuing = PipelineRunner::new(independent(&["x", "y"]), failing())
        .run(NARRATIVE)
        .await
        .unwrap();
    assert_statuses(&continuing, &[Failed, Succeeded]);

    let fail_fast = PipelineRunner::new(independent(&["x", "y"]), failing())
        .with_config(RunnerConfig::default().with_failure_mode(FailureMode::FailFast))
        .run(NARRATIVE)
        .await
        .unwrap();
    assert_statuses(&fail_fast, &[Failed, Skipped]);
    assert!(fail_fast.stage("y").unwrap().reason().unwrap().contains("halted"));
}

#[tokio::test]
async fn test_event_order() {
    let events = Arc::new(CollectingEventSink::new());
    let definition = PipelineBuilder::new("two")
        .stage(StageSpec::new("a", "{{input}}"))
        .and_then(|b| b.stage(StageSpec::new("b", "{{a}}").with_dependency("a")))
        .and_then(PipelineBuilder::build)
        .unwrap();
    let runner = PipelineRunner::new(definition, Arc::new(StubExecutor::new()))
        .with_event_sink(events.clone());

    let run = runner.run(NARRATIVE).await.unwrap();

    assert_eq!(
        events.event_types(),
        vec![
            "run.in_progress",
            "stage.running",
            "stage.succeeded",
            "stage.running",
            "stage.succeeded",
            "run.completed",
        ]
    );
    assert!(events.events().iter().all(|e| e.run_id == run.run_id));
    assert_eq!(events.stage_history("b"), vec![StageStatus::Running, Succeeded]);
}

#[tokio::test]
async fn test_generative_executor_end_to_end_with_retry() {
    let capability = Arc::new(ScriptedCapability::new([
        Ok("domain story".to_string()),
        Err(CapabilityError::RateLimited("429".into())),
        Ok("user stories".to_string()),
        Ok("Feature: orders".to_string()),
        Ok("class Order: ...".to_string()),
        Ok("Looks good".to_string()),
    ]));
    let executor = GenerativeExecutor::new(capability.clone()).with_retry(
        RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None),
    );
    let runner = PipelineRunner::new(bdd_pipeline().unwrap(), Arc::new(executor));

    let run = runner.run(NARRATIVE).await.unwrap();

    assert_run_status(&run, RunStatus::Completed);
    assert_eq!(run.stage(stage_ids::USER_STORIES).unwrap().attempts(), 2);
    assert_stage_output(&run, stage_ids::SCENARIOS, "Feature: orders");

    let prompts = capability.prompts();
    assert_eq!(prompts.len(), 6);
    assert!(prompts[0].contains(NARRATIVE));
    assert!(prompts[1].contains("domain story"));
    assert_eq!(prompts[1], prompts[2]);
}
