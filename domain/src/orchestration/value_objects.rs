//! Orchestration value objects: per-agent outcomes of one phase.
//!
//! - [`CallFailure`] - why an agent produced no message
//! - [`AgentOutcome`] - a message or a failure
//! - [`CohortResponse`] - every outcome of one phase, keyed by agent
//! - [`Exclusion`] - an agent dropped from later prompts of the round

use crate::agent::entities::AgentName;
use crate::orchestration::entities::WorkflowPhase;
use crate::session::entities::{FailureKind, Message};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reason a call produced no message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CallFailure {
    /// The phase deadline passed before the provider answered
    Timeout,
    /// Network, auth or rate-limit error after retries
    ProviderError(String),
    /// The provider answered with something that has no text
    MalformedResponse(String),
    /// The agent already had a call in flight; nothing was sent
    Busy,
    /// Nobody else answered the broadcast, so there was nothing to critique
    NoPeers,
}

impl CallFailure {
    /// Kind written to the agent's log, or `None` when the call never started.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CallFailure::Timeout => Some(FailureKind::Timeout),
            CallFailure::ProviderError(_) => Some(FailureKind::ProviderError),
            CallFailure::MalformedResponse(_) => Some(FailureKind::MalformedResponse),
            CallFailure::Busy | CallFailure::NoPeers => None,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            CallFailure::Timeout => "phase deadline exceeded".to_string(),
            CallFailure::ProviderError(d) | CallFailure::MalformedResponse(d) => d.clone(),
            CallFailure::Busy => "agent already has a call in flight".to_string(),
            CallFailure::NoPeers => "no other agent answered the broadcast".to_string(),
        }
    }
}

impl std::fmt::Display for CallFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallFailure::Timeout => write!(f, "timed out"),
            CallFailure::ProviderError(d) => write!(f, "provider error: {}", d),
            CallFailure::MalformedResponse(d) => write!(f, "malformed response: {}", d),
            CallFailure::Busy => write!(f, "busy"),
            CallFailure::NoPeers => write!(f, "no peer answers to critique"),
        }
    }
}

/// Terminal outcome of one agent in one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutcome {
    Responded(Message),
    Failed(CallFailure),
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Responded(_))
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            AgentOutcome::Responded(m) => Some(m),
            AgentOutcome::Failed(_) => None,
        }
    }
}

/// Outcomes of every expected agent in one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortResponse {
    pub phase: WorkflowPhase,
    outcomes: BTreeMap<AgentName, AgentOutcome>,
}

impl CohortResponse {
    pub fn new(phase: WorkflowPhase) -> Self {
        Self {
            phase,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, agent: AgentName, outcome: AgentOutcome) {
        self.outcomes.insert(agent, outcome);
    }

    pub fn get(&self, agent: &AgentName) -> Option<&AgentOutcome> {
        self.outcomes.get(agent)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&AgentName, &AgentOutcome)> {
        self.outcomes.iter()
    }

    /// Successful replies in agent-name order.
    pub fn successes(&self) -> impl Iterator<Item = (&AgentName, &Message)> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| outcome.message().map(|m| (name, m)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&AgentName, &CallFailure)> {
        self.outcomes.iter().filter_map(|(name, outcome)| match outcome {
            AgentOutcome::Failed(f) => Some((name, f)),
            AgentOutcome::Responded(_) => None,
        })
    }

    pub fn responded(&self, agent: &AgentName) -> bool {
        self.get(agent).is_some_and(AgentOutcome::is_success)
    }

    /// Some agents were expected and none of them answered.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.successes().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// An agent left out of derived prompts for the rest of a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub agent: AgentName,
    pub phase: WorkflowPhase,
    pub reason: CallFailure,
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} excluded after {} ({})",
            self.agent,
            self.phase.display_name(),
            self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::entities::MessageDraft;
    use crate::session::log::ConversationLog;

    fn name(s: &str) -> AgentName {
        AgentName::new(s).unwrap()
    }

    fn reply(agent: &str, text: &str) -> Message {
        ConversationLog::new(name(agent)).append(MessageDraft::agent_reply(agent, text))
    }

    #[test]
    fn test_cohort_partitions() {
        let mut cohort = CohortResponse::new(WorkflowPhase::Broadcast);
        cohort.record(name("b"), AgentOutcome::Failed(CallFailure::Timeout));
        cohort.record(name("a"), AgentOutcome::Responded(reply("a", "yes")));

        let successes: Vec<_> = cohort.successes().map(|(n, _)| n.as_str()).collect();
        let failures: Vec<_> = cohort.failures().map(|(n, _)| n.as_str()).collect();
        assert_eq!(successes, vec!["a"]);
        assert_eq!(failures, vec!["b"]);
        assert!(cohort.responded(&name("a")));
        assert!(!cohort.all_failed());
    }

    #[test]
    fn test_all_failed() {
        let mut cohort = CohortResponse::new(WorkflowPhase::Judgment);
        assert!(!cohort.all_failed());
        cohort.record(name("h"), AgentOutcome::Failed(CallFailure::ProviderError("500".into())));
        assert!(cohort.all_failed());
    }

    #[test]
    fn test_busy_is_never_logged() {
        assert_eq!(CallFailure::Busy.failure_kind(), None);
        assert_eq!(CallFailure::NoPeers.failure_kind(), None);
        assert_eq!(CallFailure::Timeout.failure_kind(), Some(FailureKind::Timeout));
    }

    #[test]
    fn test_failure_serializes_tagged() {
        let json = serde_json::to_string(&CallFailure::ProviderError("boom".into())).unwrap();
        assert_eq!(json, r#"{"kind":"provider_error","detail":"boom"}"#);
    }
}
