//! Question value object

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// The user prompt that opens a council round (Value Object)
///
/// Broadcast verbatim to the cohort and quoted again in the derived
/// vulnerability and judgment prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    content: String,
}

impl Question {
    /// Create a question, rejecting empty or whitespace-only content.
    pub fn new(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::InvalidPrompt(
                "prompt cannot be empty".to_string(),
            ));
        }
        Ok(Self { content })
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}
