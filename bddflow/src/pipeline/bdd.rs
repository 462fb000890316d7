//! The fixed five-stage chain: business narrative to reviewed code.

use super::{PipelineBuilder, PipelineDefinition, StageSpec};
use crate::core::OutputKind;
use crate::errors::PipelineValidationError;

/// Name of the built-in pipeline.
pub const BDD_PIPELINE_NAME: &str = "bdd";

/// Identifiers of the built-in stages, in execution order.
pub mod stage_ids {
    /// Domain storytelling from the business narrative.
    pub const DOMAIN_STORY: &str = "domain_story";
    /// User stories with acceptance criteria.
    pub const USER_STORIES: &str = "user_stories";
    /// Gherkin behavior scenarios.
    pub const SCENARIOS: &str = "scenarios";
    /// Source code implementing the scenarios.
    pub const IMPLEMENTATION: &str = "implementation";
    /// Review report on the implementation.
    pub const REVIEW: &str = "review";

    /// All identifiers, in execution order.
    pub const ALL: [&str; 5] = [DOMAIN_STORY, USER_STORIES, SCENARIOS, IMPLEMENTATION, REVIEW];
}

const DOMAIN_STORY_PROMPT: &str = "\
You are a domain analyst experienced in Domain-Driven Design and Domain Storytelling.
Analyze the business description below and produce a Domain Story in Markdown with:
1. Actors
2. Sequential flow (Actor -> activity -> work object)
3. Domain entities
4. Business rules
5. Glossary of terms

Business description:
{{input}}";

const USER_STORIES_PROMPT: &str = "\
You are an agile Product Owner.
Turn the Domain Story below into User Stories in Markdown. For each flow give:
- Title
- As a / I want / So that
- Acceptance criteria (at least three)
- Definition of done

Domain Story:
{{domain_story}}";

const SCENARIOS_PROMPT: &str = "\
You are a QA engineer specialized in Behavior-Driven Development.
Write Gherkin scenarios for the User Stories below. For each story include a
success scenario, a failure scenario and an edge case. Output a valid .feature file.

User Stories:
{{user_stories}}";

const IMPLEMENTATION_PROMPT: &str = "\
You are a senior developer versed in Clean Architecture, DDD, TDD and SOLID.
Implement complete Python code for the scenarios below:
1. Entities (dataclasses)
2. Use cases
3. Step definitions
4. Unit tests
Use type hints and docstrings.

Scenarios:
{{scenarios}}";

const REVIEW_PROMPT: &str = "\
You are a senior architect reviewing code.
Review the implementation below and write a report covering:
- Adherence to the specification
- Quality (SOLID, Clean Code)
- Test coverage
- Suggested improvements

Implementation:
{{implementation}}";

/// Returns the stage specifications of the built-in chain.
#[must_use]
pub fn bdd_stages() -> Vec<StageSpec> {
    use stage_ids::{DOMAIN_STORY, IMPLEMENTATION, REVIEW, SCENARIOS, USER_STORIES};

    vec![
        StageSpec::new(DOMAIN_STORY, DOMAIN_STORY_PROMPT)
            .with_title("Domain Storytelling")
            .with_output_kind(OutputKind::StructuredDocument)
            .with_artifact_name("domain_storytelling.md"),
        StageSpec::new(USER_STORIES, USER_STORIES_PROMPT)
            .with_title("User Stories")
            .with_dependency(DOMAIN_STORY)
            .with_output_kind(OutputKind::StructuredDocument)
            .with_artifact_name("user_stories.md"),
        StageSpec::new(SCENARIOS, SCENARIOS_PROMPT)
            .with_title("BDD Scenarios")
            .with_dependency(USER_STORIES)
            .with_output_kind(OutputKind::StructuredDocument)
            .with_artifact_name("scenarios.feature"),
        StageSpec::new(IMPLEMENTATION, IMPLEMENTATION_PROMPT)
            .with_title("Implementation")
            .with_dependency(SCENARIOS)
            .with_output_kind(OutputKind::StructuredDocument)
            .with_artifact_name("implementation.py"),
        StageSpec::new(REVIEW, REVIEW_PROMPT)
            .with_title("Code Review")
            .with_dependency(IMPLEMENTATION)
            .with_output_kind(OutputKind::FreeText)
            .with_artifact_name("review_report.md"),
    ]
}

/// Builds the built-in five-stage definition.
///
/// # Errors
///
/// Never fails for the built-in stages; the `Result` mirrors
/// [`PipelineBuilder::build`].
pub fn bdd_pipeline() -> Result<PipelineDefinition, PipelineValidationError> {
    let mut builder = PipelineBuilder::new(BDD_PIPELINE_NAME);
    for stage in bdd_stages() {
        builder.add_stage_spec(stage)?;
    }
    builder.build()
}
