//! Presentation view of one council round.
//!
//! Every agent that was due to take part in a phase appears in that phase's
//! entries; the ones that produced nothing carry a "no response" entry
//! instead of being left out. Agents disabled in the roster are due only
//! where they still hold an outcome from the round.

use council_domain::{
    AgentName, AgentOutcome, AgentSpec, Exclusion, Roster, SessionState, WorkflowPhase,
    WorkflowState,
};
use serde::Serialize;

/// What one agent contributed to one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryResult {
    Responded { content: String },
    Failed { reason: String },
    /// Not asked, because the agent failed earlier in the round
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentEntry {
    pub agent: AgentName,
    #[serde(flatten)]
    pub result: EntryResult,
}

impl AgentEntry {
    pub fn content(&self) -> Option<&str> {
        match &self.result {
            EntryResult::Responded { content } => Some(content),
            _ => None,
        }
    }

    /// The line shown in place of a missing answer.
    pub fn marker(&self) -> Option<String> {
        match &self.result {
            EntryResult::Responded { .. } => None,
            EntryResult::Failed { reason } => {
                Some(format!("no response from {} ({})", self.agent, reason))
            }
            EntryResult::Excluded => Some(format!(
                "no response from {} (excluded earlier this round)",
                self.agent
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: WorkflowPhase,
    pub entries: Vec<AgentEntry>,
}

impl PhaseReport {
    /// Entries for every agent due in `phase`, in roster order.
    pub fn from_state(state: &WorkflowState, roster: &Roster, phase: WorkflowPhase) -> Option<Self> {
        let cohort = state.cohort(phase)?;
        let due = |agent: &&AgentSpec| {
            cohort.get(&agent.name).is_some()
                || (agent.active && (phase != WorkflowPhase::Judgment || agent.is_harmonizer))
        };
        let entries = roster
            .agents()
            .iter()
            .filter(due)
            .map(|agent| AgentEntry {
                agent: agent.name.clone(),
                result: match cohort.get(&agent.name) {
                    Some(AgentOutcome::Responded(message)) => EntryResult::Responded {
                        content: message.content().to_string(),
                    },
                    Some(AgentOutcome::Failed(failure)) => EntryResult::Failed {
                        reason: failure.to_string(),
                    },
                    None => Self::skipped(state, &agent.name, phase),
                },
            })
            .collect();
        Some(Self { phase, entries })
    }

    /// Not called in `phase`: either skipped there for a recorded reason,
    /// or left out after failing earlier.
    fn skipped(state: &WorkflowState, agent: &AgentName, phase: WorkflowPhase) -> EntryResult {
        state
            .exclusions()
            .iter()
            .find(|e| &e.agent == agent && e.phase == phase)
            .map(|e| EntryResult::Failed {
                reason: e.reason.to_string(),
            })
            .unwrap_or(EntryResult::Excluded)
    }

    pub fn responded(&self) -> usize {
        self.entries.iter().filter(|e| e.content().is_some()).count()
    }
}

/// Everything a round produced, ready for display or serialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundReport {
    pub question: Option<String>,
    pub round: u32,
    pub state: SessionState,
    pub phases: Vec<PhaseReport>,
    pub exclusions: Vec<Exclusion>,
}

impl RoundReport {
    pub fn from_state(state: &WorkflowState, roster: &Roster) -> Self {
        Self {
            question: state.question().map(|q| q.content().to_string()),
            round: state.round(),
            state: state.state(),
            phases: WorkflowPhase::ALL
                .iter()
                .filter_map(|phase| PhaseReport::from_state(state, roster, *phase))
                .collect(),
            exclusions: state.exclusions().to_vec(),
        }
    }

    pub fn phase(&self, phase: WorkflowPhase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{CallFailure, ConversationLog, MessageDraft, Model, Question};

    fn name(s: &str) -> AgentName {
        AgentName::new(s).unwrap()
    }

    fn roster() -> Roster {
        Roster::new(vec![
            AgentSpec::new(name("a"), Model::inferred("gpt-4o")),
            AgentSpec::new(name("b"), Model::inferred("gpt-4o")),
            AgentSpec::new(name("h"), Model::inferred("claude-sonnet-4")).harmonizer(),
        ])
        .unwrap()
    }

    fn reply(agent: &str, text: &str) -> AgentOutcome {
        AgentOutcome::Responded(
            ConversationLog::new(name(agent)).append(MessageDraft::agent_reply(agent, text)),
        )
    }

    fn state_after_broadcast() -> WorkflowState {
        let mut state = WorkflowState::new();
        state.start_round(Question::new("X?").unwrap()).unwrap();
        state.await_responses([name("a"), name("b")]).unwrap();
        state.record_outcome(name("a"), reply("a", "42"));
        state.record_outcome(name("b"), AgentOutcome::Failed(CallFailure::Timeout));
        state
    }

    #[test]
    fn test_failed_agent_gets_marker() {
        let report = RoundReport::from_state(&state_after_broadcast(), &roster());
        assert_eq!(report.question.as_deref(), Some("X?"));
        let broadcast = report.phase(WorkflowPhase::Broadcast).unwrap();
        assert_eq!(broadcast.entries.len(), 2);
        assert_eq!(broadcast.responded(), 1);
        assert_eq!(broadcast.entries[0].content(), Some("42"));
        assert_eq!(
            broadcast.entries[1].marker().unwrap(),
            "no response from b (timed out)"
        );
        assert!(report.phase(WorkflowPhase::Judgment).is_none());
    }

    #[test]
    fn test_skipped_critic_shows_its_reason() {
        let mut state = state_after_broadcast();
        state
            .begin_phase(WorkflowPhase::Vulnerability, "critique")
            .unwrap();
        state.exclude(name("a"), WorkflowPhase::Vulnerability, CallFailure::NoPeers);
        state.await_responses(Vec::<AgentName>::new()).unwrap();

        let report = RoundReport::from_state(&state, &roster());
        let vulnerability = report.phase(WorkflowPhase::Vulnerability).unwrap();
        assert_eq!(
            vulnerability.entries[0].marker().unwrap(),
            "no response from a (no peer answers to critique)"
        );
        assert_eq!(vulnerability.entries[1].result, EntryResult::Excluded);
        assert_eq!(report.exclusions.len(), 2);
    }

    #[test]
    fn test_inactive_agent_is_not_due() {
        let mut roster = roster();
        roster.set_active(&name("b"), false).unwrap();
        let mut state = WorkflowState::new();
        state.start_round(Question::new("X?").unwrap()).unwrap();
        state.await_responses([name("a")]).unwrap();
        state.record_outcome(name("a"), reply("a", "42"));

        let report = RoundReport::from_state(&state, &roster);
        let broadcast = report.phase(WorkflowPhase::Broadcast).unwrap();
        assert_eq!(broadcast.entries.len(), 1);
        assert_eq!(broadcast.entries[0].agent, name("a"));
    }

    #[test]
    fn test_report_serializes_status_tags() {
        let report = RoundReport::from_state(&state_after_broadcast(), &roster());
        let json = serde_json::to_value(&report).unwrap();
        let entries = &json["phases"][0]["entries"];
        assert_eq!(entries[0]["status"], "responded");
        assert_eq!(entries[0]["content"], "42");
        assert_eq!(entries[1]["status"], "failed");
        assert_eq!(json["state"], "awaiting_broadcast_responses");
    }
}
