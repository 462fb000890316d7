//! Executes a pipeline definition against a stage executor.
//!
//! Stages run as soon as all their dependencies are terminal, bounded by
//! `max_concurrency`. A stage whose dependencies did not all succeed is
//! skipped. Cancellation drops in-flight executions and marks every
//! unfinished stage cancelled.

use super::{FailureMode, PipelineDefinition, PipelineRun, StageSpec};
use crate::cancellation::CancellationToken;
use crate::core::{ErrorKind, PipelineEvent, RunStatus, StageOutcome, StageStatus};
use crate::errors::{BddflowError, ContractErrorInfo, ErrorDetail, PipelineValidationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::executor::StageExecutor;
use crate::utils::now_utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Execution settings for a runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum number of stages executing at once.
    pub max_concurrency: usize,
    /// Timeout applied to stages without their own.
    pub stage_timeout_secs: Option<f64>,
    /// What to do after a stage fails.
    pub failure_mode: FailureMode,
    /// Minimum length of the trimmed initial input, in characters.
    pub min_input_chars: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            stage_timeout_secs: None,
            failure_mode: FailureMode::ContinueOnFailure,
            min_input_chars: 1,
        }
    }
}

impl RunnerConfig {
    /// Sets the concurrency limit. Zero is treated as one.
    #[must_use]
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Sets the default stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Sets the minimum input length.
    #[must_use]
    pub fn with_min_input_chars(mut self, n: usize) -> Self {
        self.min_input_chars = n;
        self
    }

    /// Returns the default stage timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

type StageFuture = BoxFuture<'static, (usize, StageOutcome)>;

/// Walks a [`PipelineDefinition`] in dependency order.
pub struct PipelineRunner {
    definition: Arc<PipelineDefinition>,
    executor: Arc<dyn StageExecutor>,
    events: Arc<dyn EventSink>,
    config: RunnerConfig,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("pipeline", &self.definition.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineRunner {
    /// Creates a runner with default settings and no event sink.
    #[must_use]
    pub fn new(definition: PipelineDefinition, executor: Arc<dyn StageExecutor>) -> Self {
        Self {
            definition: Arc::new(definition),
            executor,
            events: Arc::new(NoOpEventSink),
            config: RunnerConfig::default(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the execution settings.
    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the definition being run.
    #[must_use]
    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Returns the execution settings.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs the pipeline on `input`.
    ///
    /// # Errors
    ///
    /// See [`PipelineRunner::run_with_cancellation`].
    pub async fn run(&self, input: &str) -> Result<PipelineRun, BddflowError> {
        self.run_with_cancellation(input, Arc::new(CancellationToken::new()))
            .await
    }

    /// Runs the pipeline on `input`, stopping when `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the input is blank or too short and
    /// `CapabilityUnavailable` if the executor's preflight fails. Both are
    /// reported before any stage result exists. Stage failures and
    /// cancellation are recorded in the returned run.
    pub async fn run_with_cancellation(
        &self,
        input: &str,
        token: Arc<CancellationToken>,
    ) -> Result<PipelineRun, BddflowError> {
        self.validate_input(input)?;

        self.executor.preflight().await.map_err(|e| {
            warn!(pipeline = %self.definition.name(), error = %e, "Preflight failed");
            BddflowError::CapabilityUnavailable(e.to_string())
        })?;

        let mut run = PipelineRun::new(
            self.definition.name(),
            self.definition.stages().iter().map(|s| s.id.clone()),
            input,
        );
        run.status = RunStatus::InProgress;
        info!(
            run_id = %run.run_id,
            pipeline = %run.pipeline_name,
            stages = run.stages.len(),
            input_chars = run.input_chars,
            "Pipeline run started"
        );
        self.emit(PipelineEvent::run(&run.run_id, RunStatus::InProgress))
            .await;

        let mut in_flight: FuturesUnordered<StageFuture> = FuturesUnordered::new();
        let mut halted_by: Option<String> = None;

        loop {
            if token.is_cancelled() {
                drop(std::mem::take(&mut in_flight));
                let reason = token
                    .reason()
                    .unwrap_or_else(|| "cancelled".to_string());
                if self.cancel_unfinished(&mut run, &reason).await > 0 {
                    run.cancellation_reason = Some(reason);
                }
                break;
            }

            self.schedule(&mut run, &mut in_flight, halted_by.as_deref())
                .await;

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                () = token.cancelled() => {}
                Some((idx, outcome)) = in_flight.next() => {
                    let failed = !outcome.is_success();
                    self.finish_stage(&mut run, idx, outcome).await;
                    if failed && self.config.failure_mode.stops_on_failure() && halted_by.is_none() {
                        halted_by = Some(run.stages[idx].stage_id.clone());
                    }
                }
            }
        }

        run.status = run.derived_status();
        run.finished_at = Some(now_utc());

        let summary = run.summary();
        info!(
            run_id = %run.run_id,
            status = %run.status,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            duration_ms = run.duration_ms().unwrap_or_default(),
            "Pipeline run finished"
        );

        let mut event = PipelineEvent::run(&run.run_id, run.status);
        if let Some(reason) = &run.cancellation_reason {
            event = event.with_detail(reason.clone());
        }
        self.emit(event).await;

        Ok(run)
    }

    fn validate_input(&self, input: &str) -> Result<(), PipelineValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PipelineValidationError::new("Input text is empty").with_error_info(
                ContractErrorInfo::new("INPUT-001-EMPTY", "No input to run the pipeline on")
                    .with_fix_hint("Provide a business narrative or upload a document."),
            ));
        }

        let chars = trimmed.chars().count();
        if chars < self.config.min_input_chars {
            return Err(PipelineValidationError::new(format!(
                "Input text is too short ({chars} characters, minimum {})",
                self.config.min_input_chars
            ))
            .with_error_info(
                ContractErrorInfo::new("INPUT-002-TOO_SHORT", "Input below minimum length")
                    .with_context_entry("chars", chars.to_string())
                    .with_context_entry("minimum", self.config.min_input_chars.to_string()),
            ));
        }
        Ok(())
    }

    /// Skips or starts every pending stage whose dependencies are terminal.
    async fn schedule(
        &self,
        run: &mut PipelineRun,
        in_flight: &mut FuturesUnordered<StageFuture>,
        halted_by: Option<&str>,
    ) {
        let limit = self.config.max_concurrency.max(1);

        for (idx, stage) in self.definition.stages().iter().enumerate() {
            if run.stages[idx].status() != StageStatus::Pending {
                continue;
            }

            if let Some(failed) = halted_by {
                let reason = format!("run halted after stage '{failed}' failed");
                self.skip_stage(run, idx, reason).await;
                continue;
            }

            let mut ready = true;
            let mut blocked_by = None;
            for dep in &stage.dependencies {
                match run.stage(dep).map(|r| r.status()) {
                    Some(StageStatus::Succeeded) => {}
                    Some(status @ (StageStatus::Failed | StageStatus::Skipped | StageStatus::Cancelled)) => {
                        blocked_by = Some((dep.as_str(), status));
                        break;
                    }
                    _ => ready = false,
                }
            }

            if let Some((dep, status)) = blocked_by {
                let reason = format!("dependency '{dep}' did not succeed ({status})");
                self.skip_stage(run, idx, reason).await;
                continue;
            }

            if !ready || in_flight.len() >= limit {
                continue;
            }

            self.start_stage(run, in_flight, idx, stage).await;
        }
    }

    async fn start_stage(
        &self,
        run: &mut PipelineRun,
        in_flight: &mut FuturesUnordered<StageFuture>,
        idx: usize,
        stage: &StageSpec,
    ) {
        let composed = run.context().compose(stage);

        if let Err(e) = run.stages[idx].start() {
            warn!(run_id = %run.run_id, error = %e, "Refusing to start stage");
            return;
        }
        debug!(run_id = %run.run_id, stage = %stage.id, "Stage running");
        self.emit(PipelineEvent::stage(&run.run_id, &stage.id, StageStatus::Running))
            .await;

        match composed {
            Ok(input) => {
                let timeout = stage.timeout().or_else(|| self.config.stage_timeout());
                in_flight.push(execute_stage(
                    Arc::clone(&self.executor),
                    stage.clone(),
                    input,
                    idx,
                    timeout,
                ));
            }
            Err(e) => {
                let detail = ErrorDetail::new(ErrorKind::MissingDependency, e.to_string());
                self.finish_stage(run, idx, StageOutcome::failed(detail).with_attempts(0))
                    .await;
            }
        }
    }

    async fn finish_stage(&self, run: &mut PipelineRun, idx: usize, outcome: StageOutcome) {
        let run_id = run.run_id.clone();
        let stage_id = run.stages[idx].stage_id.clone();
        let attempts = outcome.attempts();

        match outcome {
            StageOutcome::Succeeded { output, .. } => {
                if let Err(e) = run.stages[idx].succeed(output, attempts) {
                    warn!(run_id = %run_id, error = %e, "Dropping stage outcome");
                    return;
                }
                let stored = run.stages[idx].clone();
                if let Err(e) = run.context_mut().put(&stage_id, &stored) {
                    warn!(run_id = %run_id, stage = %stage_id, error = %e, "Context rejected output");
                }
                debug!(
                    run_id = %run_id,
                    stage = %stage_id,
                    attempts,
                    duration_ms = run.stages[idx].duration_ms().unwrap_or_default(),
                    "Stage succeeded"
                );
                self.emit(PipelineEvent::stage(&run_id, &stage_id, StageStatus::Succeeded))
                    .await;
            }
            StageOutcome::Failed { error, .. } => {
                let message = error.to_string();
                warn!(
                    run_id = %run_id,
                    stage = %stage_id,
                    error_kind = %error.kind,
                    attempts,
                    error = %error.message,
                    "Stage failed"
                );
                if let Err(e) = run.stages[idx].fail(error, attempts) {
                    warn!(run_id = %run_id, error = %e, "Dropping stage outcome");
                    return;
                }
                self.emit(
                    PipelineEvent::stage(&run_id, &stage_id, StageStatus::Failed).with_detail(message),
                )
                .await;
            }
        }
    }

    async fn skip_stage(&self, run: &mut PipelineRun, idx: usize, reason: String) {
        if run.stages[idx].skip(reason.clone()).is_err() {
            return;
        }
        let stage_id = &run.stages[idx].stage_id;
        debug!(run_id = %run.run_id, stage = %stage_id, %reason, "Stage skipped");
        self.emit(
            PipelineEvent::stage(&run.run_id, stage_id, StageStatus::Skipped).with_detail(reason),
        )
        .await;
    }

    /// Cancels every non-terminal stage and returns how many there were.
    async fn cancel_unfinished(&self, run: &mut PipelineRun, reason: &str) -> usize {
        info!(run_id = %run.run_id, reason, "Pipeline run cancelled");
        let mut cancelled = 0;
        for idx in 0..run.stages.len() {
            if run.stages[idx].status().is_terminal() {
                continue;
            }
            if run.stages[idx].cancel(reason).is_ok() {
                cancelled += 1;
                let stage_id = &run.stages[idx].stage_id;
                self.emit(
                    PipelineEvent::stage(&run.run_id, stage_id, StageStatus::Cancelled)
                        .with_detail(reason),
                )
                .await;
            }
        }
        cancelled
    }

    async fn emit(&self, event: PipelineEvent) {
        self.events.emit(&event).await;
    }
}

/// Runs one stage with panic isolation and an optional deadline.
fn execute_stage(
    executor: Arc<dyn StageExecutor>,
    stage: StageSpec,
    input: String,
    idx: usize,
    timeout: Option<Duration>,
) -> StageFuture {
    async move {
        let call = AssertUnwindSafe(executor.execute(&stage, &input)).catch_unwind();

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => return (idx, StageOutcome::failed(ErrorDetail::timeout(limit))),
            },
            None => call.await,
        };

        let outcome = result.unwrap_or_else(|panic| {
            StageOutcome::failed(ErrorDetail::new(
                ErrorKind::Internal,
                format!("executor panicked: {}", panic_message(panic.as_ref())),
            ))
        });
        (idx, outcome)
    }
    .boxed()
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
