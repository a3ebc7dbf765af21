//! OpenAI-compatible chat completions (OpenAI and OpenRouter).

use super::http::{client, post_json, require_text};
use async_trait::async_trait;
use council_application::{
    ContextRole, ProviderClient, ProviderContext, ProviderError, ProviderReply, Usage,
};
use council_domain::{GenerationParams, Model};
use serde::{Deserialize, Serialize};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenAiCompatClient {
    http: reqwest::Client,
    model: Model,
    endpoint: String,
    api_key: String,
}

impl OpenAiCompatClient {
    pub fn new(model: Model, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: client(),
            model,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    fn build_request<'a>(
        &'a self,
        prompt: &'a str,
        context: &'a ProviderContext,
        params: &GenerationParams,
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(context.turns.len() + 2);
        if !context.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &context.system,
            });
        }
        for turn in &context.turns {
            messages.push(ChatMessage {
                role: match turn.role {
                    ContextRole::User => "user",
                    ContextRole::Assistant => "assistant",
                },
                content: &turn.content,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatRequest {
            model: self.model.id(),
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

impl ChatResponse {
    fn into_reply(self, provider: &str) -> Result<ProviderReply, ProviderError> {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        Ok(ProviderReply {
            text: require_text(text, provider)?,
            usage: self.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatClient {
    fn model(&self) -> &Model {
        &self.model
    }

    async fn call(
        &self,
        prompt: &str,
        context: &ProviderContext,
        params: &GenerationParams,
    ) -> Result<ProviderReply, ProviderError> {
        let body = self.build_request(prompt, context, params);
        let request = self.http.post(&self.endpoint).bearer_auth(&self.api_key);
        let provider = self.model.provider().as_str();
        let response: ChatResponse = post_json(request, &body, provider).await?;
        response.into_reply(provider)
    }
}
