//! Core domain model types for bddflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage, run and error-kind enums
//! - The executor outcome
//! - Per-stage result records
//! - Transition events

mod event;
mod outcome;
mod result;
mod status;

pub use event::{EventStatus, PipelineEvent};
pub use outcome::StageOutcome;
pub use result::StageResult;
pub use status::{ErrorKind, OutputKind, RunStatus, StageStatus};
