//! Pipeline and stage specifications.

use crate::context::PromptTemplate;
use crate::core::OutputKind;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// The unique identifier of the stage.
    pub id: String,
    /// Display title; defaults to the identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The prompt template.
    pub prompt: PromptTemplate,
    /// Identifiers of the stages whose output feeds this one, in the order
    /// they are composed.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Declared output kind.
    #[serde(default)]
    pub output_kind: OutputKind,
    /// File name used when persisting the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_name: Option<String>,
    /// Per-stage timeout overriding the runner default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
}

impl StageSpec {
    /// Creates a new stage specification.
    #[must_use]
    pub fn new(id: impl Into<String>, prompt: impl Into<PromptTemplate>) -> Self {
        Self {
            id: id.into(),
            title: None,
            prompt: prompt.into(),
            dependencies: Vec::new(),
            output_kind: OutputKind::FreeText,
            artifact_name: None,
            timeout_secs: None,
        }
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a dependency. Repeated names are ignored.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        let dep = dep.into();
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
        self
    }

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the output kind.
    #[must_use]
    pub fn with_output_kind(mut self, kind: OutputKind) -> Self {
        self.output_kind = kind;
        self
    }

    /// Sets the artifact file name.
    #[must_use]
    pub fn with_artifact_name(mut self, name: impl Into<String>) -> Self {
        self.artifact_name = Some(name.into());
        self
    }

    /// Sets a per-stage timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    /// Returns the title, falling back to the identifier.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Returns the artifact file name, falling back to `<id>.md`.
    #[must_use]
    pub fn artifact_file_name(&self) -> String {
        self.artifact_name
            .clone()
            .unwrap_or_else(|| format!("{}.md", self.id))
    }

    /// Returns the per-stage timeout, if one is set.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Validates the stage in isolation.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is blank, if the stage depends on
    /// itself, if a dependency is listed twice, or if the prompt references
    /// a stage that is not a declared dependency, or if the timeout is not a
    /// positive duration.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.id.trim().is_empty() {
            return Err(PipelineValidationError::new("Stage identifier cannot be empty")
                .with_error_info(ContractErrorInfo::new(
                    "CONTRACT-004-EMPTY_ID",
                    "Stage identifier is blank",
                )));
        }

        if self.dependencies.contains(&self.id) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' cannot depend on itself",
                self.id
            ))
            .with_stages(vec![self.id.clone()]));
        }

        for (i, dep) in self.dependencies.iter().enumerate() {
            if self.dependencies[..i].contains(dep) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' lists dependency '{}' more than once",
                    self.id, dep
                ))
                .with_stages(vec![self.id.clone(), dep.clone()]));
            }
        }

        if let Some(secs) = self.timeout_secs {
            if self.timeout().is_none() {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' has an invalid timeout of {secs} seconds",
                    self.id
                ))
                .with_stages(vec![self.id.clone()])
                .with_error_info(ContractErrorInfo::new(
                    "CONTRACT-004-TIMEOUT",
                    "Timeout must be a positive, representable number of seconds",
                )));
            }
        }

        for name in self.prompt.placeholders() {
            if name != crate::context::INPUT_PLACEHOLDER && !self.dependencies.contains(&name) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' references '{{{{{}}}}}' which is not a declared dependency",
                    self.id, name
                ))
                .with_stages(vec![self.id.clone(), name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-004-UNDECLARED",
                        format!("Placeholder '{name}' has no matching dependency"),
                    )
                    .with_fix_hint("Declare the stage as a dependency or remove the placeholder."),
                ));
            }
        }

        Ok(())
    }
}

/// Serializable declaration of an entire pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// The pipeline name.
    pub name: String,
    /// Stage declarations, in insertion order.
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

impl PipelineSpec {
    /// Creates a new pipeline specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or whitespace-only.
    pub fn new(name: impl Into<String>) -> Result<Self, PipelineValidationError> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "Pipeline name cannot be empty or whitespace-only",
            ));
        }

        Ok(Self {
            name,
            stages: Vec::new(),
        })
    }

    /// Adds a stage declaration.
    #[must_use]
    pub fn with_stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    /// Parses a specification from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a pipeline.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_spec_creation() {
        let spec = StageSpec::new("scenarios", "Write scenarios.")
            .with_dependencies(["user_stories"])
            .with_output_kind(OutputKind::StructuredDocument)
            .with_artifact_name("scenarios.feature");

        assert_eq!(spec.id, "scenarios");
        assert_eq!(spec.dependencies, vec!["user_stories".to_string()]);
        assert_eq!(spec.output_kind, OutputKind::StructuredDocument);
        assert_eq!(spec.artifact_file_name(), "scenarios.feature");
        assert_eq!(spec.display_title(), "scenarios");
    }

    #[test]
    fn test_stage_spec_defaults() {
        let spec = StageSpec::new("review", "p").with_title("Code Review");
        assert_eq!(spec.artifact_file_name(), "review.md");
        assert_eq!(spec.display_title(), "Code Review");
        assert!(spec.timeout().is_none());
    }

    #[test]
    fn test_out_of_range_timeout_is_ignored() {
        let mut spec = StageSpec::new("review", "p");
        for secs in [1e20, f64::INFINITY, f64::NAN, -1.0, 0.0] {
            spec.timeout_secs = Some(secs);
            assert!(spec.timeout().is_none(), "{secs}");
            assert!(spec.validate().is_err(), "{secs}");
        }

        spec.timeout_secs = Some(1.5);
        assert_eq!(spec.timeout(), Some(Duration::from_millis(1500)));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_stage_spec_self_dependency() {
        let spec = StageSpec::new("test", "p").with_dependencies(["test"]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_stage_spec_duplicate_dependency() {
        let spec = StageSpec::new("c", "p").with_dependencies(["a", "a"]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_stage_spec_undeclared_placeholder() {
        let spec = StageSpec::new("c", "Use {{a}} and {{b}}").with_dependency("a");
        let err = spec.validate().unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-UNDECLARED"));
        assert!(err.message.contains("{{b}}"));
    }

    #[test]
    fn test_stage_spec_timeout() {
        let spec = StageSpec::new("a", "p").with_timeout(Duration::from_millis(1500));
        assert_eq!(spec.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_pipeline_spec_empty_name() {
        assert!(PipelineSpec::new("").is_err());
        assert!(PipelineSpec::new("   ").is_err());
    }

    #[test]
    fn test_pipeline_spec_from_json() {
        let json = r#"{
            "name": "two-step",
            "stages": [
                {"id": "a", "prompt": "Summarize {{input}}"},
                {"id": "b", "prompt": "Critique {{a}}", "dependencies": ["a"], "output_kind": "structured_document"}
            ]
        }"#;

        let spec = PipelineSpec::from_json(json).unwrap();
        assert_eq!(spec.name, "two-step");
        assert_eq!(spec.stages.len(), 2);
        assert_eq!(spec.stages[1].dependencies, vec!["a".to_string()]);
        assert_eq!(spec.stages[1].output_kind, OutputKind::StructuredDocument);
    }
}
