//! Provider client port
//!
//! Defines the interface for calling one model on one provider. Adapters for
//! each provider family live in the infrastructure layer.

use async_trait::async_trait;
use council_domain::{AgentSpec, CallFailure, DomainError, GenerationParams, Model};
use std::sync::Arc;
use thiserror::Error;

/// Errors a provider call can end with
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether another attempt could succeed. Auth errors never do.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Auth(_))
    }

    /// Map an HTTP status with its body to an error.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status, body.chars().take(300).collect::<String>());
        match status {
            401 | 403 => ProviderError::Auth(detail),
            429 => ProviderError::RateLimit(detail),
            _ => ProviderError::Network(detail),
        }
    }
}

impl From<ProviderError> for CallFailure {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::MalformedResponse(detail) => CallFailure::MalformedResponse(detail),
            other => CallFailure::ProviderError(other.to_string()),
        }
    }
}

/// Speaker of a prior turn sent as context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    User,
    Assistant,
}

/// One prior turn of the agent's own conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTurn {
    pub role: ContextRole,
    pub content: String,
}

impl ContextTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ContextRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ContextRole::Assistant,
            content: content.into(),
        }
    }
}

/// History handed to the provider along with the new prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderContext {
    pub system: String,
    pub turns: Vec<ContextTurn>,
}

/// Token accounting, when the provider reports it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    pub text: String,
    pub usage: Option<Usage>,
}

impl ProviderReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// Client for one provider/model pair
///
/// This port defines how the application layer talks to a model.
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn model(&self) -> &Model;

    /// Send `prompt` after `context` and return the reply text.
    async fn call(
        &self,
        prompt: &str,
        context: &ProviderContext,
        params: &GenerationParams,
    ) -> Result<ProviderReply, ProviderError>;
}

/// Builds one client per roster entry
pub trait ProviderFactory: Send + Sync {
    fn create(&self, spec: &AgentSpec) -> Result<Arc<dyn ProviderClient>, DomainError>;
}
