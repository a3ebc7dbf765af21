//! Offline client that answers every prompt locally.

use async_trait::async_trait;
use council_application::{ProviderClient, ProviderContext, ProviderError, ProviderReply};
use council_domain::{GenerationParams, Model, preview};

/// Replies with a short digest of the prompt. Used by `--offline` runs and
/// for agents configured with `provider = "echo"`.
pub struct EchoClient {
    model: Model,
    label: String,
}

impl EchoClient {
    pub fn new(model: Model, label: impl Into<String>) -> Self {
        Self {
            model,
            label: label.into(),
        }
    }
}

#[async_trait]
impl ProviderClient for EchoClient {
    fn model(&self) -> &Model {
        &self.model
    }

    async fn call(
        &self,
        prompt: &str,
        context: &ProviderContext,
        _params: &GenerationParams,
    ) -> Result<ProviderReply, ProviderError> {
        Ok(ProviderReply::text(format!(
            "[{} after {} prior turns] {}",
            self.label,
            context.turns.len(),
            preview(prompt, 160)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::ContextTurn;
    use council_domain::ProviderKind;

    #[tokio::test]
    async fn test_echo_reports_context_depth() {
        let client = EchoClient::new(Model::new(ProviderKind::Echo, "echo"), "alpha");
        let context = ProviderContext {
            system: String::new(),
            turns: vec![ContextTurn::user("a"), ContextTurn::assistant("b")],
        };
        let reply = client
            .call("What   is\nX?", &context, &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(reply.text, "[alpha after 2 prior turns] What is X?");
    }
}
