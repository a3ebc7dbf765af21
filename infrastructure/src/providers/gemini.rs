//! Google Gemini generateContent.

use super::http::{client, post_json, require_text};
use async_trait::async_trait;
use council_application::{
    ContextRole, ProviderClient, ProviderContext, ProviderError, ProviderReply, Usage,
};
use council_domain::{GenerationParams, Model};
use serde::{Deserialize, Serialize};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    http: reqwest::Client,
    model: Model,
    api_key: String,
}

impl GeminiClient {
    pub fn new(model: Model, api_key: impl Into<String>) -> Self {
        Self {
            http: client(),
            model,
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model.id())
    }

    fn build_request<'a>(
        &self,
        prompt: &'a str,
        context: &'a ProviderContext,
        params: &GenerationParams,
    ) -> GenerateRequest<'a> {
        let mut contents: Vec<Content<'a>> = context
            .turns
            .iter()
            .map(|turn| Content::new(
                match turn.role {
                    ContextRole::User => "user",
                    ContextRole::Assistant => "model",
                },
                &turn.content,
            ))
            .collect();
        contents.push(Content::new("user", prompt));

        GenerateRequest {
            system_instruction: (!context.system.is_empty()).then(|| SystemInstruction {
                parts: vec![Part {
                    text: &context.system,
                }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                max_output_tokens: params.max_tokens,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn new(role: &'static str, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

impl GenerateResponse {
    fn into_reply(self) -> Result<ProviderReply, ProviderError> {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            });
        Ok(ProviderReply {
            text: require_text(text, "gemini")?,
            usage: self.usage_metadata.map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            }),
        })
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
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
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key);
        let response: GenerateResponse = post_json(request, &body, "gemini").await?;
        response.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::ContextTurn;
    use council_domain::ProviderKind;

    #[test]
    fn test_assistant_turns_use_model_role() {
        let client = GeminiClient::new(Model::new(ProviderKind::Gemini, "gemini-1.5-pro"), "k");
        let context = ProviderContext {
            system: String::new(),
            turns: vec![ContextTurn::user("X?"), ContextTurn::assistant("42")],
        };
        let request =
            serde_json::to_value(client.build_request("Why?", &context, &GenerationParams::default()))
                .unwrap();
        assert!(request.get("systemInstruction").is_none());
        assert_eq!(request["contents"][1]["role"], "model");
        assert_eq!(request["contents"][2]["parts"][0]["text"], "Why?");
        assert_eq!(request["generationConfig"]["maxOutputTokens"], 4096);
        assert!(client.endpoint().ends_with("gemini-1.5-pro:generateContent"));
    }

    #[test]
    fn test_candidate_parts_joined() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}],
                "usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":2}}"#,
        )
        .unwrap();
        let reply = response.into_reply().unwrap();
        assert_eq!(reply.text, "ab");
        assert_eq!(reply.usage.unwrap().input_tokens, Some(5));

        let blocked: GenerateResponse = serde_json::from_str(r#"{"candidates":[{}]}"#).unwrap();
        assert!(blocked.into_reply().is_err());
    }
}
