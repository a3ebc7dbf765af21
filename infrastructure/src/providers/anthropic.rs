//! Anthropic messages API.

use super::http::{client, post_json, require_text};
use async_trait::async_trait;
use council_application::{
    ContextRole, ProviderClient, ProviderContext, ProviderError, ProviderReply, Usage,
};
use council_domain::{GenerationParams, Model};
use serde::{Deserialize, Serialize};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: reqwest::Client,
    model: Model,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(model: Model, api_key: impl Into<String>) -> Self {
        Self {
            http: client(),
            model,
            api_key: api_key.into(),
        }
    }

    fn build_request<'a>(
        &'a self,
        prompt: &'a str,
        context: &'a ProviderContext,
        params: &GenerationParams,
    ) -> MessagesRequest<'a> {
        let mut messages: Vec<AnthropicMessage<'a>> = context
            .turns
            .iter()
            .map(|turn| AnthropicMessage {
                role: match turn.role {
                    ContextRole::User => "user",
                    ContextRole::Assistant => "assistant",
                },
                content: &turn.content,
            })
            .collect();
        messages.push(AnthropicMessage {
            role: "user",
            content: prompt,
        });

        MessagesRequest {
            model: self.model.id(),
            max_tokens: params.max_tokens,
            system: (!context.system.is_empty()).then_some(context.system.as_str()),
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl MessagesResponse {
    fn into_reply(self) -> Result<ProviderReply, ProviderError> {
        let text: String = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        Ok(ProviderReply {
            text: require_text(Some(text), "anthropic")?,
            usage: self.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
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
        let request = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let response: MessagesResponse = post_json(request, &body, "anthropic").await?;
        response.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::ContextTurn;
    use council_domain::ProviderKind;

    #[test]
    fn test_system_goes_top_level() {
        let client = AnthropicClient::new(Model::new(ProviderKind::Anthropic, "claude-sonnet-4"), "k");
        let context = ProviderContext {
            system: "be precise".into(),
            turns: vec![ContextTurn::user("X?"), ContextTurn::assistant("42")],
        };
        let request =
            serde_json::to_value(client.build_request("Why?", &context, &GenerationParams::default()))
                .unwrap();
        assert_eq!(request["system"], "be precise");
        assert_eq!(request["messages"].as_array().unwrap().len(), 3);
        assert_eq!(request["max_tokens"], 4096);
    }

    #[test]
    fn test_text_blocks_joined() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Hello "},{"type":"text","text":"there"}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_reply().unwrap().text, "Hello there");

        let empty: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(empty.into_reply().is_err());
    }
}
