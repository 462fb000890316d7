//! Prompt templates with `{{name}}` placeholders.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Name of the placeholder bound to the run's initial input.
pub const INPUT_PLACEHOLDER: &str = "input";

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// A stage prompt.
///
/// `{{input}}` binds to the initial input of the run and `{{<stage_id>}}`
/// binds to the output of a declared dependency. Anything else between
/// double braces is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Creates a template from raw text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Returns the raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the placeholder names in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.text) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Returns true if the template references `name`.
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        PLACEHOLDER
            .captures_iter(&self.text)
            .any(|caps| &caps[1] == name)
    }

    /// Substitutes placeholders. `bindings` is searched in order; unknown
    /// placeholders are kept verbatim.
    #[must_use]
    pub fn render(&self, bindings: &[(&str, &str)]) -> String {
        PLACEHOLDER
            .replace_all(&self.text, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                bindings
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
            })
            .into_owned()
    }
}

impl From<&str> for PromptTemplate {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for PromptTemplate {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_in_order() {
        let template = PromptTemplate::new("{{input}} then {{ domain_story }} and {{input}}");
        assert_eq!(template.placeholders(), vec!["input", "domain_story"]);
        assert!(template.references("domain_story"));
        assert!(!template.references("review"));
    }

    #[test]
    fn test_render_substitutes_known_names() {
        let template = PromptTemplate::new("Narrative:\n{{input}}\nStory:\n{{domain_story}}");
        let rendered = template.render(&[("input", "N"), ("domain_story", "S")]);
        assert_eq!(rendered, "Narrative:\nN\nStory:\nS");
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let template = PromptTemplate::new("Hello {{who}}");
        assert_eq!(template.render(&[]), "Hello {{who}}");
    }

    #[test]
    fn test_rendered_values_are_not_rescanned() {
        let template = PromptTemplate::new("{{input}}");
        assert_eq!(template.render(&[("input", "{{input}}")]), "{{input}}");
    }

    #[test]
    fn test_serde_transparent() {
        let template = PromptTemplate::new("x {{input}}");
        let json = serde_json::to_string(&template).unwrap();
        assert_eq!(json, r#""x {{input}}""#);
    }
}
