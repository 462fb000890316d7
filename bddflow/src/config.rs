//! Run configuration loaded from defaults, environment or JSON.

use crate::capability::{GenerationOptions, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::errors::BddflowError;
use crate::pipeline::{FailureMode, RetryConfig, RunnerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the Gemini API key.
pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
/// Environment variable overriding the model.
pub const ENV_MODEL: &str = "BDDFLOW_MODEL";
/// Environment variable overriding the sampling temperature.
pub const ENV_TEMPERATURE: &str = "BDDFLOW_TEMPERATURE";
/// Environment variable setting a per-stage timeout in seconds.
pub const ENV_STAGE_TIMEOUT: &str = "BDDFLOW_STAGE_TIMEOUT_SECS";
/// Environment variable setting the concurrency limit.
pub const ENV_MAX_CONCURRENCY: &str = "BDDFLOW_MAX_CONCURRENCY";
/// Environment variable setting the output directory.
pub const ENV_OUTPUT_DIR: &str = "BDDFLOW_OUTPUT_DIR";
/// Environment variable setting the minimum input length.
pub const ENV_MIN_INPUT_CHARS: &str = "BDDFLOW_MIN_INPUT_CHARS";
/// Environment variable enabling fail-fast mode.
pub const ENV_FAIL_FAST: &str = "BDDFLOW_FAIL_FAST";

/// Everything needed to set up a run.
#[derive(Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// API key for the generative capability. Never serialized.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-stage timeout in seconds.
    #[serde(default)]
    pub stage_timeout_secs: Option<f64>,
    /// Maximum number of stages running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Root directory for persisted runs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Minimum trimmed input length, in characters.
    #[serde(default = "default_min_input_chars")]
    pub min_input_chars: usize,
    /// Stop scheduling after the first failure.
    #[serde(default)]
    pub fail_fast: bool,
    /// Retry policy for transient capability errors.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_concurrency() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_min_input_chars() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            stage_timeout_secs: None,
            max_concurrency: default_max_concurrency(),
            output_dir: default_output_dir(),
            min_input_chars: default_min_input_chars(),
            fail_fast: false,
            retry: RetryConfig::default(),
        }
    }
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("stage_timeout_secs", &self.stage_timeout_secs)
            .field("max_concurrency", &self.max_concurrency)
            .field("output_dir", &self.output_dir)
            .field("min_input_chars", &self.min_input_chars)
            .field("fail_fast", &self.fail_fast)
            .field("retry", &self.retry)
            .finish()
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self, BddflowError> {
        Self::default().merge_env(|key| std::env::var(key).ok())
    }

    /// Loads a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BddflowError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BddflowError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, BddflowError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BddflowError::Config(e.to_string()))?;
        config.validate()
    }

    /// Rejects values that cannot drive a run.
    ///
    /// The stage timeout must convert to a positive `Duration` and the
    /// temperature must be finite.
    pub fn validate(self) -> Result<Self, BddflowError> {
        if let Some(secs) = self.stage_timeout_secs {
            let representable = secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok();
            if !representable {
                return Err(BddflowError::Config(format!(
                    "stage timeout must be a positive number of seconds, got {secs}"
                )));
            }
        }
        if !self.temperature.is_finite() {
            return Err(BddflowError::Config(format!(
                "temperature must be finite, got {}",
                self.temperature
            )));
        }
        Ok(self)
    }

    /// Overrides fields from variables found through `lookup`.
    ///
    /// Unset and blank variables leave the current value alone.
    pub fn merge_env<F>(mut self, lookup: F) -> Result<Self, BddflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(v) = get(ENV_TEMPERATURE) {
            self.temperature = parse(ENV_TEMPERATURE, &v)?;
        }
        if let Some(v) = get(ENV_STAGE_TIMEOUT) {
            self.stage_timeout_secs = Some(parse(ENV_STAGE_TIMEOUT, &v)?);
        }
        if let Some(v) = get(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = parse(ENV_MAX_CONCURRENCY, &v)?;
        }
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(v) = get(ENV_MIN_INPUT_CHARS) {
            self.min_input_chars = parse(ENV_MIN_INPUT_CHARS, &v)?;
        }
        if let Some(v) = get(ENV_FAIL_FAST) {
            self.fail_fast = parse_flag(ENV_FAIL_FAST, &v)?;
        }
        self.validate()
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    /// Sets the concurrency limit.
    #[must_use]
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the minimum input length.
    #[must_use]
    pub fn with_min_input_chars(mut self, n: usize) -> Self {
        self.min_input_chars = n;
        self
    }

    /// Enables or disables fail-fast mode.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Runner settings derived from this configuration.
    #[must_use]
    pub fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::default()
            .with_max_concurrency(self.max_concurrency)
            .with_min_input_chars(self.min_input_chars)
            .with_failure_mode(if self.fail_fast {
                FailureMode::FailFast
            } else {
                FailureMode::ContinueOnFailure
            });
        config.stage_timeout_secs = self.stage_timeout_secs;
        config
    }

    /// Generation options derived from this configuration.
    #[must_use]
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions::new(self.model.clone()).with_temperature(self.temperature)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, BddflowError> {
    value
        .parse()
        .map_err(|_| BddflowError::Config(format!("{key}: invalid value '{value}'")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, BddflowError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(BddflowError::Config(format!("{key}: invalid flag '{value}'"))),
    }
}
