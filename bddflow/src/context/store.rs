//! Per-run store of succeeded stage results.

use super::template::INPUT_PLACEHOLDER;
use crate::core::{StageResult, StageStatus};
use crate::errors::{MissingDependencyError, OutputConflictError};
use crate::pipeline::StageSpec;
use std::collections::HashMap;

/// Holds the initial input of a run and the results of stages that
/// succeeded, keyed by stage identifier.
///
/// Only `succeeded` results are admitted, and each stage may be written once.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    initial_input: String,
    results: HashMap<String, StageResult>,
}

impl ContextStore {
    /// Creates a store seeded with the run's initial input.
    #[must_use]
    pub fn new(initial_input: impl Into<String>) -> Self {
        Self {
            initial_input: initial_input.into(),
            results: HashMap::new(),
        }
    }

    /// Returns the initial input of the run.
    #[must_use]
    pub fn initial_input(&self) -> &str {
        &self.initial_input
    }

    /// Stores a succeeded result.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflictError` if the result is not `succeeded` or if
    /// the stage already has a stored result.
    pub fn put(&mut self, stage_id: &str, result: &StageResult) -> Result<(), OutputConflictError> {
        if result.status() != StageStatus::Succeeded {
            return Err(OutputConflictError::new(
                stage_id,
                format!(
                    "only succeeded results enter the context (status: {})",
                    result.status()
                ),
            ));
        }
        if self.results.contains_key(stage_id) {
            return Err(OutputConflictError::new(stage_id, "output already stored"));
        }
        self.results.insert(stage_id.to_string(), result.clone());
        Ok(())
    }

    /// Returns the stored result for a stage.
    #[must_use]
    pub fn get(&self, stage_id: &str) -> Option<&StageResult> {
        self.results.get(stage_id)
    }

    /// Returns the stored output text for a stage.
    #[must_use]
    pub fn output(&self, stage_id: &str) -> Option<&str> {
        self.results.get(stage_id).and_then(StageResult::output)
    }

    /// Returns true if the stage has a stored result.
    #[must_use]
    pub fn contains(&self, stage_id: &str) -> bool {
        self.results.contains_key(stage_id)
    }

    /// Number of stored results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if nothing has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Builds the input for `stage`.
    ///
    /// Placeholders in the prompt are substituted first. Dependencies the
    /// prompt does not reference are appended as `## Context: <id>` sections
    /// in declaration order. A root stage whose prompt lacks `{{input}}` gets
    /// the initial input appended as an `## Input` section.
    ///
    /// # Errors
    ///
    /// Returns `MissingDependencyError` if any declared dependency has no
    /// stored output.
    pub fn compose(&self, stage: &StageSpec) -> Result<String, MissingDependencyError> {
        let mut bindings: Vec<(&str, &str)> = Vec::with_capacity(stage.dependencies.len() + 1);
        bindings.push((INPUT_PLACEHOLDER, self.initial_input.as_str()));

        for dep in &stage.dependencies {
            let output = self
                .output(dep)
                .ok_or_else(|| MissingDependencyError::new(&stage.id, dep))?;
            bindings.push((dep.as_str(), output));
        }

        let mut composed = stage.prompt.render(&bindings);

        if stage.dependencies.is_empty() && !stage.prompt.references(INPUT_PLACEHOLDER) {
            push_section(&mut composed, "## Input", &self.initial_input);
        }

        for (dep, output) in bindings.iter().skip(1) {
            if !stage.prompt.references(dep) {
                push_section(&mut composed, &format!("## Context: {dep}"), output);
            }
        }

        Ok(composed)
    }
}

fn push_section(buf: &mut String, heading: &str, body: &str) {
    if !buf.is_empty() {
        buf.push_str("\n\n");
    }
    buf.push_str(heading);
    buf.push_str("\n\n");
    buf.push_str(body);
}
