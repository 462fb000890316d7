//! Scripted executors and capabilities for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::capability::{GenerationOptions, GenerativeCapability};
use crate::core::StageOutcome;
use crate::errors::{CapabilityError, ErrorDetail};
use crate::executor::StageExecutor;
use crate::pipeline::StageSpec;

/// A stage executor with per-stage scripted behavior.
///
/// Unscripted stages succeed with `"<stage id> output"`. Every call is
/// recorded with its composed input.
#[derive(Debug, Default)]
pub struct StubExecutor {
    outputs: HashMap<String, String>,
    failures: HashMap<String, ErrorDetail>,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    panics: HashSet<String>,
    preflight_error: Option<CapabilityError>,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubExecutor {
    /// Creates a stub where every stage succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the output of a stage.
    #[must_use]
    pub fn with_output(mut self, stage_id: impl Into<String>, output: impl Into<String>) -> Self {
        self.outputs.insert(stage_id.into(), output.into());
        self
    }

    /// Scripts a failure for a stage.
    #[must_use]
    pub fn fail_on(mut self, stage_id: impl Into<String>, error: ErrorDetail) -> Self {
        self.failures.insert(stage_id.into(), error);
        self
    }

    /// Delays a stage before it answers.
    #[must_use]
    pub fn with_delay(mut self, stage_id: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(stage_id.into(), delay);
        self
    }

    /// Delays every stage without its own delay.
    #[must_use]
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Makes a stage panic.
    #[must_use]
    pub fn panic_on(mut self, stage_id: impl Into<String>) -> Self {
        self.panics.insert(stage_id.into());
        self
    }

    /// Makes preflight fail.
    #[must_use]
    pub fn with_preflight_error(mut self, error: CapabilityError) -> Self {
        self.preflight_error = Some(error);
        self
    }

    /// Stage identifiers in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    /// The composed input a stage received.
    #[must_use]
    pub fn input_for(&self, stage_id: &str) -> Option<String> {
        self.calls
            .lock()
            .iter()
            .find(|(id, _)| id == stage_id)
            .map(|(_, input)| input.clone())
    }

    /// Highest number of concurrent executions observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StageExecutor for StubExecutor {
    async fn execute(&self, stage: &StageSpec, input: &str) -> StageOutcome {
        self.calls
            .lock()
            .push((stage.id.clone(), input.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delays.get(&stage.id).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }

        if self.panics.contains(&stage.id) {
            panic!("scripted panic in stage '{}'", stage.id);
        }

        if let Some(error) = self.failures.get(&stage.id) {
            return StageOutcome::failed(error.clone());
        }

        let output = self
            .outputs
            .get(&stage.id)
            .cloned()
            .unwrap_or_else(|| format!("{} output", stage.id));
        StageOutcome::succeeded(output)
    }

    async fn preflight(&self) -> Result<(), CapabilityError> {
        match &self.preflight_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// A generative capability that answers from a fixed script.
///
/// Responses are consumed in order; once the script is empty every call
/// fails with `Unavailable`.
#[derive(Debug, Default)]
pub struct ScriptedCapability {
    responses: Mutex<VecDeque<Result<String, CapabilityError>>>,
    prompts: Mutex<Vec<String>>,
    preflight_error: Option<CapabilityError>,
}

impl ScriptedCapability {
    /// Creates a capability with the given responses.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = Result<String, CapabilityError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Creates a capability that answers every prompt with the same text.
    #[must_use]
    pub fn repeating(text: &str, times: usize) -> Self {
        Self::new(std::iter::repeat_with(|| Ok(text.to_string())).take(times))
    }

    /// Makes preflight fail.
    #[must_use]
    pub fn with_preflight_error(mut self, error: CapabilityError) -> Self {
        self.preflight_error = Some(error);
        self
    }

    /// Prompts received, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl GenerativeCapability for ScriptedCapability {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, CapabilityError> {
        self.prompts.lock().push(prompt.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CapabilityError::Unavailable("script exhausted".into())))
    }

    async fn preflight(&self) -> Result<(), CapabilityError> {
        match &self.preflight_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[tokio::test]
    async fn test_stub_executor_scripts() {
        let stub = StubExecutor::new()
            .with_output("a", "A")
            .fail_on("b", ErrorDetail::new(ErrorKind::Transport, "down"));

        let a = stub.execute(&StageSpec::new("a", "p"), "in-a").await;
        let b = stub.execute(&StageSpec::new("b", "p"), "in-b").await;
        let c = stub.execute(&StageSpec::new("c", "p"), "in-c").await;

        assert_eq!(a.output(), Some("A"));
        assert_eq!(b.error().unwrap().kind, ErrorKind::Transport);
        assert_eq!(c.output(), Some("c output"));
        assert_eq!(stub.calls(), vec!["a", "b", "c"]);
        assert_eq!(stub.input_for("b").as_deref(), Some("in-b"));
        assert_eq!(stub.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_scripted_capability_sequence() {
        let cap = ScriptedCapability::new([
            Ok("first".to_string()),
            Err(CapabilityError::RateLimited("slow".into())),
        ]);
        let options = GenerationOptions::default();

        assert_eq!(cap.generate("p1", &options).await.unwrap(), "first");
        assert!(cap.generate("p2", &options).await.is_err());
        assert!(matches!(
            cap.generate("p3", &options).await,
            Err(CapabilityError::Unavailable(_))
        ));
        assert_eq!(cap.prompts(), vec!["p1", "p2", "p3"]);
    }
}
