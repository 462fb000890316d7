//! Testing utilities for bddflow pipelines.
//!
//! This module provides:
//! - A scripted stage executor and generative capability
//! - Assertions over pipeline runs

mod assertions;
mod mocks;

pub use assertions::{
    assert_run_status, assert_stage_failed_with, assert_stage_output, assert_stage_status,
    assert_statuses,
};
pub use mocks::{ScriptedCapability, StubExecutor};
