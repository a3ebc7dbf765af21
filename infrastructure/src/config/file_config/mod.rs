//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain types by
//! [`FileConfig::into_roster`] and [`FileConfig::execution_params`].

mod agent;
mod display;
mod session;

pub use agent::FileAgentConfig;
pub use display::FileDisplayConfig;
pub use session::FileSessionConfig;

use council_application::ExecutionParams;
use council_domain::agent::validation::{ConfigIssue, ConfigIssueCode, Severity, has_errors};
use council_domain::{AgentSpec, DomainError, Roster};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Session-wide directives
    pub session: FileSessionConfig,
    /// The roster, in configuration order
    pub agents: Vec<FileAgentConfig>,
    /// Terminal output and chat settings
    pub display: FileDisplayConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Checks every roster entry, then the roster as a whole (unique names,
    /// at least one answering agent and one harmonizer), then the session
    /// section.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let (specs, mut issues) = self.parse_agents();

        if issues.is_empty() || !specs.is_empty() {
            issues.extend(Roster::validate(&specs));
        }
        // A council round needs judgment.
        for issue in issues
            .iter_mut()
            .filter(|i| i.code == ConfigIssueCode::NoHarmonizer)
        {
            issue.severity = Severity::Error;
        }

        issues.extend(self.session.execution_params().1);
        issues
    }

    /// Build the validated roster. Fails on the first configuration that
    /// could not run a full council round.
    pub fn into_roster(&self) -> Result<Roster, DomainError> {
        let issues = self.validate();
        if has_errors(&issues) {
            let message = issues
                .iter()
                .filter(|i| i.is_error())
                .map(|i| i.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DomainError::Configuration(message));
        }
        let (specs, _) = self.parse_agents();
        Roster::new(specs)
    }

    pub fn execution_params(&self) -> ExecutionParams {
        self.session.execution_params().0
    }

    pub fn working_dir(&self) -> PathBuf {
        self.session.working_dir()
    }

    fn parse_agents(&self) -> (Vec<AgentSpec>, Vec<ConfigIssue>) {
        let mut specs = Vec::new();
        let mut issues = Vec::new();
        for agent in &self.agents {
            match agent.to_spec() {
                Ok(spec) => specs.push(spec),
                Err(mut agent_issues) => issues.append(&mut agent_issues),
            }
        }
        (specs, issues)
    }
}
