//! Session configuration from TOML (`[session]` section)

use council_application::{ExecutionParams, RetryPolicy};
use council_domain::agent::validation::{ConfigIssue, ConfigIssueCode};
use council_domain::SynthesisPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Raw session configuration from TOML
///
/// # Example
///
/// ```toml
/// [session]
/// user = "user"
/// instructions = "Answer precisely and cite sources."
/// working_dir = "./council-logs"
/// phase_timeout_secs = 120
/// max_retries = 2
/// backoff_ms = 500
/// context_window = 20          # 0 = full history
/// synthesis_policy = "independent"   # independent | first | manual
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    /// Display name of the human participant
    pub user: String,
    /// Instruction text sent to every agent as system preamble
    pub instructions: String,
    /// Directory holding one `<agent>.jsonl` log per agent
    pub working_dir: String,
    pub phase_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub context_window: usize,
    pub synthesis_policy: String,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        let params = ExecutionParams::default();
        Self {
            user: params.user,
            instructions: String::new(),
            working_dir: "council-logs".to_string(),
            phase_timeout_secs: params.phase_timeout.as_secs(),
            max_retries: params.retry.max_retries,
            backoff_ms: params.retry.backoff_base.as_millis() as u64,
            context_window: params.context_window,
            synthesis_policy: params.synthesis_policy.as_str().to_string(),
        }
    }
}

impl FileSessionConfig {
    /// Parse synthesis_policy, falling back to `independent` with a warning.
    pub fn parse_synthesis_policy(&self) -> (SynthesisPolicy, Vec<ConfigIssue>) {
        match self.synthesis_policy.parse::<SynthesisPolicy>() {
            Ok(policy) => (policy, vec![]),
            Err(_) => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "session.synthesis_policy".to_string(),
                        value: self.synthesis_policy.clone(),
                        valid_values: vec![
                            "independent".to_string(),
                            "first".to_string(),
                            "manual".to_string(),
                        ],
                    },
                    format!(
                        "session.synthesis_policy: unknown value '{}', falling back to 'independent'",
                        self.synthesis_policy
                    ),
                );
                (SynthesisPolicy::default(), vec![issue])
            }
        }
    }

    /// Build execution parameters, reporting every value that was replaced.
    pub fn execution_params(&self) -> (ExecutionParams, Vec<ConfigIssue>) {
        let defaults = ExecutionParams::default();
        let (policy, mut issues) = self.parse_synthesis_policy();

        let phase_timeout = if self.phase_timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "session.phase_timeout_secs".to_string(),
                },
                format!(
                    "session.phase_timeout_secs cannot be 0, using {}",
                    defaults.phase_timeout.as_secs()
                ),
            ));
            defaults.phase_timeout
        } else {
            Duration::from_secs(self.phase_timeout_secs)
        };

        let user = if self.user.trim().is_empty() {
            defaults.user
        } else {
            self.user.trim().to_string()
        };

        let params = ExecutionParams::default()
            .with_phase_timeout(phase_timeout)
            .with_retry(RetryPolicy {
                max_retries: self.max_retries,
                backoff_base: Duration::from_millis(self.backoff_ms),
            })
            .with_context_window(self.context_window)
            .with_synthesis_policy(policy)
            .with_instructions(self.instructions.clone())
            .with_user(user);
        (params, issues)
    }

    pub fn working_dir(&self) -> PathBuf {
        PathBuf::from(&self.working_dir)
    }
}
