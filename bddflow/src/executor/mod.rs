//! Stage executors turn a composed input into a stage outcome.

mod generative;

pub use generative::GenerativeExecutor;

use crate::core::StageOutcome;
use crate::errors::CapabilityError;
use crate::pipeline::StageSpec;
use async_trait::async_trait;

/// Produces the output of one stage.
///
/// Failures are returned as [`StageOutcome::Failed`]; implementations must
/// not signal failure by panicking. The runner still catches panics and
/// records them as internal failures.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Runs `stage` on `input`.
    async fn execute(&self, stage: &StageSpec, input: &str) -> StageOutcome;

    /// Checks, before any stage runs, that the executor can serve the run.
    async fn preflight(&self) -> Result<(), CapabilityError> {
        Ok(())
    }
}
