//! Persistence of finished runs.

mod file;
mod memory;

pub use file::{ArtifactEntry, FileResultSink, RunManifest};
pub use memory::MemoryResultSink;

use crate::errors::BddflowError;
use crate::pipeline::{PipelineDefinition, PipelineRun};
use async_trait::async_trait;
use std::path::PathBuf;

/// Where a run was persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReceipt {
    /// Directory or other location holding the run, if any.
    pub location: Option<PathBuf>,
    /// Files written, in write order.
    pub files: Vec<PathBuf>,
}

/// Receives a run once it is terminal.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persists `run`. The definition supplies stage titles and artifact names.
    async fn persist(
        &self,
        run: &PipelineRun,
        definition: &PipelineDefinition,
    ) -> Result<SinkReceipt, BddflowError>;
}
