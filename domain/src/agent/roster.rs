//! Roster entity: the validated set of agents for one session.

use crate::agent::entities::{AgentName, AgentSpec};
use crate::agent::validation::{ConfigIssue, ConfigIssueCode, has_errors};
use crate::core::error::DomainError;
use std::collections::BTreeSet;

/// Validated agent roster (Entity)
///
/// Names are unique and at least one active non-harmonizer exists. A roster
/// without harmonizers is accepted here (it can still broadcast); use
/// [`Roster::require_harmonizer`] where the judgment phase must be possible.
///
/// Inactive agents keep their place and their log but are left out of
/// [`Roster::cohort`] and [`Roster::harmonizers`], so no phase prompts them.
#[derive(Debug, Clone)]
pub struct Roster {
    agents: Vec<AgentSpec>,
}

impl Roster {
    pub fn new(agents: Vec<AgentSpec>) -> Result<Self, DomainError> {
        let issues = Self::validate(&agents);
        if has_errors(&issues) {
            let message = issues
                .iter()
                .filter(|i| i.is_error())
                .map(|i| i.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DomainError::Configuration(message));
        }
        Ok(Self { agents })
    }

    /// Report every issue with a prospective roster.
    pub fn validate(agents: &[AgentSpec]) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if agents.is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyRoster,
                "the roster has no agents",
            ));
            return issues;
        }

        let mut seen = BTreeSet::new();
        for spec in agents {
            if !seen.insert(&spec.name) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::DuplicateName {
                        name: spec.name.clone(),
                    },
                    format!("agent name '{}' is used more than once", spec.name),
                ));
            }
        }

        if !agents.iter().any(|a| a.active && !a.is_harmonizer) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::NoCohort,
                "no active agent outside the harmonizers; nobody would answer the broadcast",
            ));
        }

        if !agents.iter().any(|a| a.active && a.is_harmonizer) {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::NoHarmonizer,
                "no active harmonizer configured; the judgment phase cannot run",
            ));
        }

        issues
    }

    /// Fail with a configuration error when no active harmonizer exists.
    pub fn require_harmonizer(&self) -> Result<(), DomainError> {
        if self.harmonizers().next().is_none() {
            return Err(DomainError::Configuration(
                "no active harmonizer; mark an agent with harmonizer = true or enable one"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Fail with a configuration error when nobody would answer a broadcast.
    pub fn require_cohort(&self) -> Result<(), DomainError> {
        if self.cohort().next().is_none() {
            return Err(DomainError::Configuration(
                "no active agent to answer the broadcast".to_string(),
            ));
        }
        Ok(())
    }

    /// Switch `name` on or off. Returns the previous setting.
    pub fn set_active(&mut self, name: &AgentName, active: bool) -> Result<bool, DomainError> {
        let spec = self
            .agents
            .iter_mut()
            .find(|a| &a.name == name)
            .ok_or_else(|| DomainError::InvalidAgentName(name.to_string()))?;
        Ok(std::mem::replace(&mut spec.active, active))
    }

    pub fn is_active(&self, name: &AgentName) -> bool {
        self.get(name).is_some_and(|a| a.active)
    }

    pub fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    pub fn get(&self, name: &AgentName) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| &a.name == name)
    }

    pub fn contains(&self, name: &AgentName) -> bool {
        self.get(name).is_some()
    }

    /// Active agents flagged as harmonizers, in roster order.
    pub fn harmonizers(&self) -> impl Iterator<Item = &AgentSpec> {
        self.agents.iter().filter(|a| a.active && a.is_harmonizer)
    }

    /// Active non-harmonizer agents, in roster order. This is the broadcast
    /// cohort.
    pub fn cohort(&self) -> impl Iterator<Item = &AgentSpec> {
        self.agents.iter().filter(|a| a.active && !a.is_harmonizer)
    }

    pub fn names(&self) -> Vec<AgentName> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
