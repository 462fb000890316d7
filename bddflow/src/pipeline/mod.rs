//! Pipeline declaration and execution.
//!
//! This module provides:
//! - Stage and pipeline specifications
//! - A validating builder producing an immutable, topologically sorted definition
//! - The built-in five-stage BDD chain
//! - The runner, its failure policy and retry helpers

mod bdd;
mod definition;
mod failure_tolerance;
mod retry;
mod run;
mod runner;
mod spec;

#[cfg(test)]
mod integration_tests;

pub use bdd::{bdd_pipeline, bdd_stages, stage_ids, BDD_PIPELINE_NAME};
pub use definition::{PipelineBuilder, PipelineDefinition};
pub use failure_tolerance::{FailureMode, FailureRecord, FailureSummary};
pub use retry::{
    should_retry, with_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision,
    RetryState,
};
pub use run::PipelineRun;
pub use runner::{PipelineRunner, RunnerConfig};
pub use spec::{PipelineSpec, StageSpec};
