//! Provider adapters
//!
//! One [`ProviderClient`] per roster entry, selected by the entry's
//! [`ProviderKind`]. API keys come from the environment:
//!
//! | Provider   | Variable             |
//! |------------|----------------------|
//! | openai     | `OPENAI_API_KEY`     |
//! | anthropic  | `ANTHROPIC_API_KEY`  |
//! | gemini     | `GEMINI_API_KEY`     |
//! | openrouter | `OPENROUTER_API_KEY` |

mod anthropic;
mod echo;
mod gemini;
mod http;
mod openai;

pub use anthropic::AnthropicClient;
pub use echo::EchoClient;
pub use gemini::GeminiClient;
pub use openai::{OPENAI_API_URL, OPENROUTER_API_URL, OpenAiCompatClient};

use council_application::{ProviderClient, ProviderFactory};
use council_domain::{AgentSpec, DomainError, ProviderKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Environment variable holding the key for `kind`, if it needs one.
pub fn api_key_var(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
        ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
        ProviderKind::Gemini => Some("GEMINI_API_KEY"),
        ProviderKind::OpenRouter => Some("OPENROUTER_API_KEY"),
        ProviderKind::Echo => None,
    }
}

/// Builds HTTP clients for the configured providers.
///
/// In offline mode every agent gets an [`EchoClient`] regardless of its
/// provider, so a roster can be exercised without network access or keys.
#[derive(Debug, Clone, Default)]
pub struct HttpProviderFactory {
    keys: HashMap<ProviderKind, String>,
    offline: bool,
}

impl HttpProviderFactory {
    /// Read API keys from the process environment.
    pub fn from_env() -> Self {
        let keys = [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
            ProviderKind::OpenRouter,
        ]
        .into_iter()
        .filter_map(|kind| {
            let var = api_key_var(kind)?;
            let key = std::env::var(var).ok()?;
            (!key.trim().is_empty()).then(|| (kind, key.trim().to_string()))
        })
        .collect();
        Self {
            keys,
            offline: false,
        }
    }

    pub fn offline() -> Self {
        Self {
            keys: HashMap::new(),
            offline: true,
        }
    }

    pub fn with_key(mut self, kind: ProviderKind, key: impl Into<String>) -> Self {
        self.keys.insert(kind, key.into());
        self
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    fn key_for(&self, spec: &AgentSpec) -> Result<String, DomainError> {
        let kind = spec.model.provider();
        self.keys.get(&kind).cloned().ok_or_else(|| {
            DomainError::Configuration(format!(
                "agent '{}' uses {} but {} is not set",
                spec.name,
                kind,
                api_key_var(kind).unwrap_or("no key variable")
            ))
        })
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, spec: &AgentSpec) -> Result<Arc<dyn ProviderClient>, DomainError> {
        let model = spec.model.clone();
        debug!("Creating {} client for agent '{}'", model, spec.name);

        if self.offline {
            return Ok(Arc::new(EchoClient::new(model, spec.name.as_str())));
        }

        let client: Arc<dyn ProviderClient> = match model.provider() {
            ProviderKind::Echo => Arc::new(EchoClient::new(model, spec.name.as_str())),
            ProviderKind::OpenAi => {
                Arc::new(OpenAiCompatClient::new(model, OPENAI_API_URL, self.key_for(spec)?))
            }
            ProviderKind::OpenRouter => Arc::new(OpenAiCompatClient::new(
                model,
                OPENROUTER_API_URL,
                self.key_for(spec)?,
            )),
            ProviderKind::Anthropic => Arc::new(AnthropicClient::new(model, self.key_for(spec)?)),
            ProviderKind::Gemini => Arc::new(GeminiClient::new(model, self.key_for(spec)?)),
        };
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{AgentName, Model};

    fn spec(name: &str, model: &str) -> AgentSpec {
        AgentSpec::new(AgentName::new(name).unwrap(), Model::inferred(model))
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let factory = HttpProviderFactory::default();
        let err = factory.create(&spec("judge", "claude-sonnet-4")).err().unwrap();
        assert!(matches!(err, DomainError::Configuration(_)));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_key_selects_client() {
        let factory = HttpProviderFactory::default().with_key(ProviderKind::OpenRouter, "k");
        let client = factory.create(&spec("alpha", "meta-llama/llama-3-70b")).unwrap();
        assert_eq!(client.model().provider(), ProviderKind::OpenRouter);
        assert!(factory.create(&spec("beta", "gpt-4o")).is_err());
    }

    #[test]
    fn test_offline_needs_no_keys() {
        let factory = HttpProviderFactory::offline();
        assert!(factory.is_offline());
        for model in ["gpt-4o", "claude-sonnet-4", "gemini-1.5-pro", "echo"] {
            let client = factory.create(&spec("a", model)).unwrap();
            assert_eq!(client.model().id(), model);
        }
    }
}
