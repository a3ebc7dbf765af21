//! Prompt domain
//!
//! Templates for the prompts sent at each phase of a council round.

mod template;

pub use template::PromptTemplate;
