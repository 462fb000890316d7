//! Validated, immutable pipeline definitions.

use super::{PipelineSpec, StageSpec};
use crate::errors::{ContractErrorInfo, CycleDetectedError, PipelineValidationError};
use std::collections::{HashMap, HashSet};

/// Builder for creating validated pipeline definitions.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// The stage specifications, in insertion order.
    stages: Vec<StageSpec>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Adds a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is invalid on its own or its identifier
    /// is already taken.
    pub fn stage(mut self, spec: StageSpec) -> Result<Self, PipelineValidationError> {
        self.add_stage_spec(spec)?;
        Ok(self)
    }

    /// Adds a stage with a specification.
    ///
    /// Dependencies may name stages added later; they are resolved in
    /// [`build`](Self::build).
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is invalid or its identifier is taken.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.stages.iter().any(|s| s.id == spec.id) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is defined more than once",
                spec.id
            ))
            .with_stages(vec![spec.id.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-004-DUPLICATE",
                    format!("Duplicate stage identifier '{}'", spec.id),
                )
                .with_fix_hint("Stage identifiers must be unique within a pipeline."),
            ));
        }

        self.stages.push(spec);
        Ok(())
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline is empty, a dependency names an
    /// unknown stage, or the dependencies form a cycle.
    pub fn build(self) -> Result<PipelineDefinition, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "Pipeline name cannot be empty or whitespace-only",
            ));
        }

        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("CONTRACT-004-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        }

        let known: HashSet<&str> = self.stages.iter().map(|s| s.id.as_str()).collect();
        for spec in &self.stages {
            for dep in &spec.dependencies {
                if !known.contains(dep.as_str()) {
                    return Err(PipelineValidationError::new(format!(
                        "Stage '{}' depends on unknown stage '{}'",
                        spec.id, dep
                    ))
                    .with_stages(vec![spec.id.clone(), dep.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            "CONTRACT-004-MISSING_DEP",
                            format!("Dependency '{dep}' not found"),
                        )
                        .with_fix_hint("Check for typos in stage names."),
                    ));
                }
            }
        }

        detect_cycles(&self.stages)?;

        Ok(PipelineDefinition::from_validated(self.name, self.stages))
    }
}

/// An immutable directed acyclic graph of stages.
///
/// The execution order is computed once at construction: every stage appears
/// after all of its dependencies, and ties follow insertion order.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    name: String,
    /// Stages in execution order.
    stages: Vec<StageSpec>,
    /// Stage id to position in `stages`.
    index: HashMap<String, usize>,
}

impl PipelineDefinition {
    fn from_validated(name: String, stages: Vec<StageSpec>) -> Self {
        let order = topological_sort(&stages);
        let mut by_id: HashMap<String, StageSpec> =
            stages.into_iter().map(|s| (s.id.clone(), s)).collect();
        let stages: Vec<StageSpec> = order
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();
        let index = stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        Self {
            name,
            stages,
            index,
        }
    }

    /// Builds a definition from a serializable specification.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn from_spec(spec: PipelineSpec) -> Result<Self, PipelineValidationError> {
        let mut builder = PipelineBuilder::new(spec.name);
        for stage in spec.stages {
            builder.add_stage_spec(stage)?;
        }
        builder.build()
    }

    /// Returns a serializable specification of this definition.
    #[must_use]
    pub fn to_spec(&self) -> PipelineSpec {
        PipelineSpec {
            name: self.name.clone(),
            stages: self.stages.clone(),
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the definition has no stages. Never true for a built
    /// definition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the stage identifiers in execution order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id.as_str()).collect()
    }

    /// Looks up a stage by identifier.
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&StageSpec> {
        self.index.get(id).map(|&i| &self.stages[i])
    }

    /// Returns the position of a stage in the execution order.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Returns the stages that directly depend on `id`, in execution order.
    #[must_use]
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.dependencies.iter().any(|d| d == id))
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Groups stages into waves: each wave only depends on earlier waves, so
    /// the stages inside one wave may run concurrently.
    #[must_use]
    pub fn levels(&self) -> Vec<Vec<&str>> {
        let mut depth: HashMap<&str, usize> = HashMap::with_capacity(self.stages.len());
        let mut levels: Vec<Vec<&str>> = Vec::new();

        for stage in &self.stages {
            let level = stage
                .dependencies
                .iter()
                .filter_map(|d| depth.get(d.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(stage.id.as_str(), level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(stage.id.as_str());
        }

        levels
    }
}

/// Detects cycles in the dependency graph.
fn detect_cycles(stages: &[StageSpec]) -> Result<(), CycleDetectedError> {
    let by_id: HashMap<&str, &StageSpec> = stages.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for spec in stages {
        if !visited.contains(spec.id.as_str()) {
            if let Some(cycle) =
                dfs_cycle(&spec.id, &by_id, &mut visited, &mut rec_stack, &mut path)
            {
                return Err(CycleDetectedError::new(cycle));
            }
        }
    }

    Ok(())
}

fn dfs_cycle<'a>(
    node: &'a str,
    by_id: &HashMap<&'a str, &'a StageSpec>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(&spec) = by_id.get(node) {
        for dep in &spec.dependencies {
            let dep = dep.as_str();
            if !visited.contains(dep) {
                if let Some(cycle) = dfs_cycle(dep, by_id, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(dep) {
                let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| (*s).to_string()).collect();
                cycle.push(dep.to_string());
                return Some(cycle);
            }
        }
    }

    path.pop();
    rec_stack.remove(node);
    None
}

/// Depth-first topological sort, visiting roots in insertion order.
fn topological_sort(stages: &[StageSpec]) -> Vec<String> {
    fn visit<'a>(
        node: &'a str,
        by_id: &HashMap<&'a str, &'a StageSpec>,
        visited: &mut HashSet<&'a str>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(node) {
            return;
        }
        if let Some(&spec) = by_id.get(node) {
            for dep in &spec.dependencies {
                visit(dep, by_id, visited, result);
            }
        }
        result.push(node.to_string());
    }

    let by_id: HashMap<&str, &StageSpec> = stages.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut visited = HashSet::new();
    let mut result = Vec::with_capacity(stages.len());

    for spec in stages {
        visit(&spec.id, &by_id, &mut visited, &mut result);
    }

    result
}
