//! Executor backed by a generative capability.

use super::StageExecutor;
use crate::capability::{GenerationOptions, GenerativeCapability};
use crate::core::{ErrorKind, StageOutcome};
use crate::errors::{CapabilityError, ErrorDetail};
use crate::pipeline::{with_retry, RetryConfig, StageSpec};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Sends the composed input to a [`GenerativeCapability`], retrying
/// transient failures.
#[derive(Clone)]
pub struct GenerativeExecutor {
    capability: Arc<dyn GenerativeCapability>,
    options: GenerationOptions,
    retry: RetryConfig,
}

impl GenerativeExecutor {
    /// Creates an executor with default options and retry policy.
    #[must_use]
    pub fn new(capability: Arc<dyn GenerativeCapability>) -> Self {
        Self {
            capability,
            options: GenerationOptions::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the generation options.
    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the generation options.
    #[must_use]
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }
}

impl std::fmt::Debug for GenerativeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeExecutor")
            .field("options", &self.options)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StageExecutor for GenerativeExecutor {
    async fn execute(&self, stage: &StageSpec, input: &str) -> StageOutcome {
        if input.trim().is_empty() {
            return StageOutcome::failed(ErrorDetail::new(
                ErrorKind::EmptyInput,
                format!("composed input for stage '{}' is empty", stage.id),
            ))
            .with_attempts(0);
        }

        let (result, attempts) = with_retry(
            &self.retry,
            &stage.id,
            CapabilityError::is_transient,
            || self.capability.generate(input, &self.options),
        )
        .await;

        debug!(stage = %stage.id, attempts, ok = result.is_ok(), "Capability call finished");

        match result {
            Ok(text) if text.trim().is_empty() => {
                StageOutcome::failed(CapabilityError::EmptyResponse).with_attempts(attempts)
            }
            Ok(text) => StageOutcome::succeeded(text).with_attempts(attempts),
            Err(err) => StageOutcome::failed(err).with_attempts(attempts),
        }
    }

    async fn preflight(&self) -> Result<(), CapabilityError> {
        self.capability.preflight().await
    }
}
