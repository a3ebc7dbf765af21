//! Agent entities

use crate::core::error::DomainError;
use crate::core::model::Model;
use serde::{Deserialize, Serialize};

/// Unique agent name within a session (Value Object)
///
/// Also used as the stem of the agent's log file, so path separators are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentName(String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidAgentName(
                "agent name cannot be empty".to_string(),
            ));
        }
        if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
            return Err(DomainError::InvalidAgentName(format!(
                "'{}' cannot be used as a log file name",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AgentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generation parameters passed through to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: None,
            top_p: None,
            max_tokens: 4096,
        }
    }
}

impl GenerationParams {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// One configured council participant (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: AgentName,
    pub model: Model,
    /// Harmonizers synthesize peer critiques during the judgment phase and
    /// never take part in broadcast, vulnerability or reflection.
    pub is_harmonizer: bool,
    /// Inactive agents stay in the roster but receive no prompts.
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub params: GenerationParams,
}

fn active_by_default() -> bool {
    true
}

impl AgentSpec {
    pub fn new(name: AgentName, model: Model) -> Self {
        Self {
            name,
            model,
            is_harmonizer: false,
            active: true,
            params: GenerationParams::default(),
        }
    }

    pub fn harmonizer(mut self) -> Self {
        self.is_harmonizer = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}
