//! Run-scoped context: prompt templates and the store that composes stage
//! inputs from upstream outputs.

mod store;
mod template;

pub use store::ContextStore;
pub use template::{PromptTemplate, INPUT_PLACEHOLDER};
