//! In-memory result sink.

use super::{ResultSink, SinkReceipt};
use crate::errors::BddflowError;
use crate::pipeline::{PipelineDefinition, PipelineRun};
use async_trait::async_trait;
use parking_lot::RwLock;

/// Keeps persisted runs in memory, in persist order.
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    runs: RwLock<Vec<PipelineRun>>,
}

impl MemoryResultSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a persisted run by identifier.
    #[must_use]
    pub fn get(&self, run_id: &str) -> Option<PipelineRun> {
        self.runs.read().iter().find(|r| r.run_id == run_id).cloned()
    }

    /// Returns all persisted runs.
    #[must_use]
    pub fn runs(&self) -> Vec<PipelineRun> {
        self.runs.read().clone()
    }

    /// Returns the most recently persisted run.
    #[must_use]
    pub fn latest(&self) -> Option<PipelineRun> {
        self.runs.read().last().cloned()
    }

    /// Number of persisted runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    /// Returns true if nothing has been persisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn persist(
        &self,
        run: &PipelineRun,
        _definition: &PipelineDefinition,
    ) -> Result<SinkReceipt, BddflowError> {
        self.runs.write().push(run.clone());
        Ok(SinkReceipt::default())
    }
}
