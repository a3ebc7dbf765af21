//! Workflow observer port
//!
//! Defines the interface for reporting progress of a council round.

use crate::ports::log_persistence::PersistenceError;
use council_domain::{AgentName, CohortResponse, SessionState, WorkflowPhase};

/// Per-agent status within a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    /// A call is in flight
    Busy,
    /// The agent answered
    Succeeded,
    /// The agent produced no message
    Failed(String),
}

/// Callback for progress updates during a council round
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (progress bars, plain lines, etc.)
pub trait WorkflowObserver: Send + Sync {
    /// Called on every state machine transition
    fn on_state_change(&self, _from: SessionState, _to: SessionState) {}

    /// Called when the requests of a phase are about to be issued
    fn on_phase_start(&self, phase: WorkflowPhase, agents: &[AgentName]);

    /// Called when an agent becomes busy or settles
    fn on_agent_status(&self, phase: WorkflowPhase, agent: &AgentName, status: &AgentStatus);

    /// Called once the phase barrier settled
    fn on_phase_complete(&self, phase: WorkflowPhase, cohort: &CohortResponse);

    /// Called when a log write failed; the session continues
    fn on_persistence_warning(&self, _agent: &AgentName, _error: &PersistenceError) {}
}

/// No-op observer for when progress reporting is not needed
pub struct NoObserver;

impl WorkflowObserver for NoObserver {
    fn on_phase_start(&self, _phase: WorkflowPhase, _agents: &[AgentName]) {}
    fn on_agent_status(&self, _phase: WorkflowPhase, _agent: &AgentName, _status: &AgentStatus) {}
    fn on_phase_complete(&self, _phase: WorkflowPhase, _cohort: &CohortResponse) {}
}
