//! Model value object: which provider serves an agent, and with which model id.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Provider family that serves a model (Value Object)
///
/// Selected once at roster construction time; the application layer asks a
/// provider factory for one client per roster entry based on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini generateContent
    Gemini,
    /// OpenRouter (OpenAI-compatible, `vendor/model` ids)
    OpenRouter,
    /// Offline provider that echoes prompts back; used for dry runs
    Echo,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Echo => "echo",
        }
    }

    /// Infer the provider from a bare model id.
    ///
    /// `claude*` is served by Anthropic, `gemini*` by Gemini, ids of the form
    /// `vendor/model` by OpenRouter, and everything else by OpenAI.
    pub fn infer(model_id: &str) -> Self {
        let id = model_id.trim().to_ascii_lowercase();
        if id.starts_with("claude") {
            ProviderKind::Anthropic
        } else if id.starts_with("gemini") {
            ProviderKind::Gemini
        } else if id.contains('/') {
            ProviderKind::OpenRouter
        } else if id == "echo" {
            ProviderKind::Echo
        } else {
            ProviderKind::OpenAi
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "echo" => Ok(ProviderKind::Echo),
            other => Err(DomainError::Configuration(format!(
                "unknown provider '{}'",
                other
            ))),
        }
    }
}

/// A provider/model pair (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Model {
    provider: ProviderKind,
    id: String,
}

impl Model {
    pub fn new(provider: ProviderKind, id: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
        }
    }

    /// Create a model whose provider is inferred from the id.
    pub fn inferred(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            provider: ProviderKind::infer(&id),
            id,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}
