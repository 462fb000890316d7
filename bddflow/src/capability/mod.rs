//! The generative-text capability consumed by stage executors.

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiClient, GEMINI_API_BASE, MIN_API_KEY_LEN};

use crate::errors::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier. A `gemini/` routing prefix is accepted.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl GenerationOptions {
    /// Creates options for a model with the default temperature.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Produces text from a prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeCapability: Send + Sync {
    /// Generates text for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, CapabilityError>;

    /// Checks that the capability can serve requests at all.
    ///
    /// Called once before a run starts. The default accepts.
    async fn preflight(&self) -> Result<(), CapabilityError> {
        Ok(())
    }
}
