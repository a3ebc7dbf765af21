//! Session-wide workflow state.
//!
//! Mutated only by the orchestrator. Holds the state machine position, the
//! barrier bookkeeping of the current phase and every cohort response of the
//! current round.

use crate::agent::entities::AgentName;
use crate::core::error::DomainError;
use crate::core::question::Question;
use crate::orchestration::entities::{SessionState, WorkflowPhase};
use crate::orchestration::value_objects::{AgentOutcome, CallFailure, CohortResponse, Exclusion};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// The one live workflow state of a session (Entity)
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    state: SessionState,
    round: u32,
    question: Option<Question>,
    expected: BTreeSet<AgentName>,
    responded: BTreeSet<AgentName>,
    failed: BTreeSet<AgentName>,
    responses: BTreeMap<WorkflowPhase, CohortResponse>,
    exclusions: Vec<Exclusion>,
    selected_synthesis: Option<AgentName>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            round: 0,
            question: None,
            expected: BTreeSet::new(),
            responded: BTreeSet::new(),
            failed: BTreeSet::new(),
            responses: BTreeMap::new(),
            exclusions: Vec::new(),
            selected_synthesis: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    /// Check a transition without performing it.
    pub fn ensure_can(
        &self,
        next: SessionState,
        requested: &'static str,
    ) -> Result<(), DomainError> {
        let allowed = self.state.can_transition_to(next)
            && (!self.state.is_awaiting() || self.is_settled());
        if allowed {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: self.state,
                requested,
            })
        }
    }

    /// Start a new round with `question`; previous round results are dropped.
    pub fn start_round(&mut self, question: Question) -> Result<(), DomainError> {
        self.ensure_can(SessionState::Broadcasting, "broadcast")?;
        self.round += 1;
        self.question = Some(question);
        self.responses.clear();
        self.exclusions.clear();
        self.selected_synthesis = None;
        self.clear_barrier();
        self.state = SessionState::Broadcasting;
        Ok(())
    }

    /// Enter the issuing state of a follow-up phase.
    pub fn begin_phase(
        &mut self,
        phase: WorkflowPhase,
        requested: &'static str,
    ) -> Result<(), DomainError> {
        let next = SessionState::issuing(phase);
        if phase == WorkflowPhase::Broadcast {
            return Err(DomainError::InvalidTransition {
                from: self.state,
                requested,
            });
        }
        self.ensure_can(next, requested)?;
        self.clear_barrier();
        self.state = next;
        Ok(())
    }

    /// Move from issuing to awaiting with the set of agents the barrier
    /// waits for.
    pub fn await_responses(
        &mut self,
        expected: impl IntoIterator<Item = AgentName>,
    ) -> Result<(), DomainError> {
        let phase = self.state.phase().filter(|_| self.state.is_issuing()).ok_or(
            DomainError::InvalidTransition {
                from: self.state,
                requested: "await responses",
            },
        )?;
        self.expected = expected.into_iter().collect();
        self.responded.clear();
        self.failed.clear();
        self.responses.insert(phase, CohortResponse::new(phase));
        self.state = SessionState::awaiting(phase);
        Ok(())
    }

    /// Record the terminal outcome of one expected agent. Outcomes for agents
    /// that are not expected, or that already settled, are ignored.
    pub fn record_outcome(&mut self, agent: AgentName, outcome: AgentOutcome) -> bool {
        let Some(phase) = self.state.phase().filter(|_| self.state.is_awaiting()) else {
            return false;
        };
        if !self.expected.contains(&agent)
            || self.responded.contains(&agent)
            || self.failed.contains(&agent)
        {
            return false;
        }
        match &outcome {
            AgentOutcome::Responded(_) => {
                self.responded.insert(agent.clone());
            }
            AgentOutcome::Failed(reason) => {
                self.failed.insert(agent.clone());
                self.exclusions.push(Exclusion {
                    agent: agent.clone(),
                    phase,
                    reason: reason.clone(),
                });
            }
        }
        self.responses
            .entry(phase)
            .or_insert_with(|| CohortResponse::new(phase))
            .record(agent, outcome);
        true
    }

    /// Leave `agent` out of the current phase without calling it.
    pub fn exclude(&mut self, agent: AgentName, phase: WorkflowPhase, reason: CallFailure) {
        self.exclusions.push(Exclusion {
            agent,
            phase,
            reason,
        });
    }

    /// Every expected agent has a terminal outcome.
    pub fn is_settled(&self) -> bool {
        self.expected
            .iter()
            .all(|a| self.responded.contains(a) || self.failed.contains(a))
    }

    /// Agents still without an outcome.
    pub fn pending(&self) -> Vec<AgentName> {
        self.expected
            .iter()
            .filter(|a| !self.responded.contains(*a) && !self.failed.contains(*a))
            .cloned()
            .collect()
    }

    /// Close the barrier: agents still pending are recorded as `reason`.
    pub fn settle(&mut self, reason: CallFailure) {
        for agent in self.pending() {
            self.record_outcome(agent, AgentOutcome::Failed(reason.clone()));
        }
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.ensure_can(SessionState::Complete, "complete the round")?;
        self.state = SessionState::Complete;
        Ok(())
    }

    /// Abort the round. Only valid mid-round; returns whether it applied.
    pub fn abort(&mut self) -> bool {
        if self.state.can_transition_to(SessionState::Aborted) {
            self.state = SessionState::Aborted;
            self.clear_barrier();
            true
        } else {
            false
        }
    }

    /// Back to `Idle` with no round history.
    pub fn reset(&mut self) -> Result<(), DomainError> {
        self.ensure_can(SessionState::Idle, "reset")?;
        *self = Self::new();
        Ok(())
    }

    pub fn cohort(&self, phase: WorkflowPhase) -> Option<&CohortResponse> {
        self.responses.get(&phase)
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    /// Agents excluded at some point of the current round.
    pub fn excluded(&self) -> BTreeSet<&AgentName> {
        self.exclusions.iter().map(|e| &e.agent).collect()
    }

    pub fn expected(&self) -> &BTreeSet<AgentName> {
        &self.expected
    }

    pub fn selected_synthesis(&self) -> Option<&AgentName> {
        self.selected_synthesis.as_ref()
    }

    pub fn select_synthesis(&mut self, harmonizer: AgentName) {
        self.selected_synthesis = Some(harmonizer);
    }

    fn clear_barrier(&mut self) {
        self.expected.clear();
        self.responded.clear();
        self.failed.clear();
    }
}
