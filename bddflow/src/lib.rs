//! # Bddflow
//!
//! Orchestrates a generative behaviour-driven development pipeline: a free
//! form business narrative becomes a domain story, user stories, Gherkin
//! scenarios, an implementation and finally a code review.
//!
//! The crate provides:
//!
//! - **Declarative pipelines**: stages with prompt templates and dependencies,
//!   validated and topologically sorted once
//! - **A run-scoped context**: upstream outputs composed into each prompt
//! - **Failure isolation**: failed stages skip their dependents while
//!   independent stages keep running
//! - **Cancellation**: cooperative, with in-flight stages discarded
//! - **Progress events and persistence**: observers for every transition and
//!   sinks for finished runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bddflow::prelude::*;
//! use std::sync::Arc;
//!
//! let capability = Arc::new(GeminiClient::new(std::env::var("GOOGLE_API_KEY").ok()));
//! let executor = Arc::new(GenerativeExecutor::new(capability));
//! let runner = PipelineRunner::new(bdd_pipeline()?, executor);
//!
//! let run = runner.run("Customers order bread online and pick it up.").await?;
//! println!("{}", run.status);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod capability;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod extract;
pub mod observability;
pub mod pipeline;
pub mod sink;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::capability::{GenerationOptions, GenerativeCapability};
    #[cfg(feature = "gemini")]
    pub use crate::capability::GeminiClient;
    pub use crate::config::PipelineConfig;
    pub use crate::context::{ContextStore, PromptTemplate};
    pub use crate::core::{
        ErrorKind, EventStatus, OutputKind, PipelineEvent, RunStatus, StageOutcome, StageResult,
        StageStatus,
    };
    pub use crate::errors::{
        BddflowError, CapabilityError, ContractErrorInfo, CycleDetectedError, ErrorDetail,
        ExtractionError, MissingDependencyError, PipelineValidationError,
    };
    pub use crate::events::{
        ChannelEventSink, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::executor::{GenerativeExecutor, StageExecutor};
    pub use crate::extract::{extract_text, DocumentKind};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        bdd_pipeline, stage_ids, FailureMode, PipelineBuilder, PipelineDefinition, PipelineRun,
        PipelineRunner, RetryConfig, RunnerConfig, StageSpec,
    };
    pub use crate::sink::{FileResultSink, MemoryResultSink, ResultSink, SinkReceipt};
    pub use crate::utils::{generate_run_id, Timestamp};
}
