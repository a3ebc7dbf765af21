//! Agent roster entries from TOML (`[[agents]]` array)

use council_domain::agent::validation::{ConfigIssue, ConfigIssueCode};
use council_domain::{AgentName, AgentSpec, GenerationParams, Model, ProviderKind};
use serde::{Deserialize, Deserializer, Serialize};

/// One raw roster entry
///
/// # Example
///
/// ```toml
/// [[agents]]
/// name = "alpha"
/// model = "gpt-4o"
/// provider = "openai"          # optional, inferred from the model id
/// harmonizer = false           # also accepts "true" / "false"
/// active = true                # inactive agents sit out every phase
/// temperature = 0.7
/// max_tokens = 2048
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    pub name: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(deserialize_with = "bool_or_string")]
    pub harmonizer: bool,
    #[serde(deserialize_with = "bool_or_string")]
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for FileAgentConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            model: String::new(),
            provider: None,
            harmonizer: false,
            active: true,
            temperature: None,
            top_p: None,
            max_tokens: None,
        }
    }
}

impl FileAgentConfig {
    /// Convert into a domain spec; every problem is reported as an error.
    pub fn to_spec(&self) -> Result<AgentSpec, Vec<ConfigIssue>> {
        let mut issues = Vec::new();

        let name = match AgentName::new(&self.name) {
            Ok(name) => Some(name),
            Err(_) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidName {
                        value: self.name.clone(),
                    },
                    "agents: every agent needs a non-empty name",
                ));
                None
            }
        };
        let label = if self.name.trim().is_empty() {
            "<unnamed>"
        } else {
            self.name.trim()
        };

        let model_id = self.model.trim();
        if model_id.is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyModel {
                    agent: label.to_string(),
                },
                format!("agents.{}: model cannot be empty", label),
            ));
        }

        let provider = match &self.provider {
            None => Some(ProviderKind::infer(model_id)),
            Some(raw) => match raw.parse::<ProviderKind>() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    issues.push(ConfigIssue::error(
                        ConfigIssueCode::UnknownProvider {
                            agent: label.to_string(),
                            provider: raw.clone(),
                        },
                        format!(
                            "agents.{}: unknown provider '{}' (expected openai, anthropic, gemini, openrouter or echo)",
                            label, raw
                        ),
                    ));
                    None
                }
            },
        };

        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: format!("agents.{}.temperature", label),
                },
                format!("agents.{}: temperature {} is outside 0.0..=2.0", label, t),
            ));
        }

        match (name, provider) {
            (Some(name), Some(provider)) if issues.is_empty() => {
                let mut spec = AgentSpec::new(name, Model::new(provider, model_id))
                    .with_params(self.params());
                spec.is_harmonizer = self.harmonizer;
                spec.active = self.active;
                Ok(spec)
            }
            _ => Err(issues),
        }
    }

    fn params(&self) -> GenerationParams {
        let defaults = GenerationParams::default();
        GenerationParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        }
    }
}

/// Accept `flag = true` as well as `flag = "true"`.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got '{}'",
                other
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Agents {
        agents: Vec<FileAgentConfig>,
    }

    fn parse(toml_str: &str) -> Vec<FileAgentConfig> {
        toml::from_str::<Agents>(toml_str).unwrap().agents
    }

    #[test]
    fn test_provider_inferred_from_model() {
        let agents = parse(
            r#"
[[agents]]
name = "claude"
model = "claude-sonnet-4"
harmonizer = "true"

[[agents]]
name = "mixtral"
model = "mistralai/mixtral-8x7b"
temperature = 0.2
"#,
        );
        let h = agents[0].to_spec().unwrap();
        assert!(h.is_harmonizer);
        assert_eq!(h.model.provider(), ProviderKind::Anthropic);

        let m = agents[1].to_spec().unwrap();
        assert!(!m.is_harmonizer);
        assert_eq!(m.model.provider(), ProviderKind::OpenRouter);
        assert_eq!(m.params.temperature, Some(0.2));
    }

    #[test]
    fn test_active_defaults_on() {
        let agents = parse(
            r#"
[[agents]]
name = "a"
model = "gpt-4o"

[[agents]]
name = "b"
model = "gpt-4o"
active = "no"

[[agents]]
name = "c"
model = "gpt-4o"
active = false
"#,
        );
        assert!(agents[0].to_spec().unwrap().active);
        assert!(!agents[1].to_spec().unwrap().active);
        assert!(!agents[2].to_spec().unwrap().active);
    }

    #[test]
    fn test_explicit_provider_wins() {
        let agent = FileAgentConfig {
            name: "local".into(),
            model: "llama3".into(),
            provider: Some("echo".into()),
            ..Default::default()
        };
        assert_eq!(agent.to_spec().unwrap().model.provider(), ProviderKind::Echo);
    }

    #[test]
    fn test_invalid_entry_reports_every_issue() {
        let agent = FileAgentConfig {
            name: " ".into(),
            model: "".into(),
            provider: Some("mistral".into()),
            temperature: Some(3.5),
            ..Default::default()
        };
        let issues = agent.to_spec().unwrap_err();
        assert_eq!(issues.len(), 4);
        assert!(issues.iter().all(|i| i.is_error()));
    }

    #[test]
    fn test_bad_harmonizer_text_rejected() {
        let result = toml::from_str::<Agents>(
            r#"
[[agents]]
name = "a"
model = "gpt-4o"
harmonizer = "sometimes"
"#,
        );
        assert!(result.is_err());
    }
}
