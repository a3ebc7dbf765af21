//! Run Council use case
//!
//! Drives the four-phase council flow over a fixed roster:
//!
//! 1. Broadcast: every active non-harmonizer answers the user prompt
//! 2. Vulnerability analysis: each respondent critiques the other answers
//! 3. Judgment: harmonizers organize the critiques into a synthesis
//! 4. Reflection: respondents revise their answer against the synthesis
//!
//! Each phase is one fan-out through the [`Dispatcher`] followed by a
//! barrier: the session stays in the phase's awaiting state until every
//! expected agent has settled or the phase deadline passed.

use crate::config::ExecutionParams;
use crate::ports::log_persistence::PersistenceError;
use crate::ports::progress::{NoObserver, WorkflowObserver};
use crate::use_cases::agent_proxy::{AgentProxy, CallSettings};
use crate::use_cases::conversation_store::{ConversationStore, IntegrityStatus, LoadSummary};
use crate::use_cases::dispatch::{Cancelled, DispatchRequest, Dispatcher, unsettled_failure};
use council_domain::{
    AgentName, AgentSpec, CallFailure, CohortResponse, DomainError, PromptTemplate, Question,
    Roster, SelectionError, SessionState, TimelineEntry, WorkflowPhase, WorkflowState,
};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors surfaced to the caller of the orchestrator
///
/// Per-agent failures never show up here; they are part of the
/// [`CohortResponse`] of their phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Every agent failed during {phase}")]
    AllAgentsFailed { phase: WorkflowPhase },

    #[error("Cannot {requested} while the session is {from}")]
    InvalidTransition {
        from: SessionState,
        requested: &'static str,
    },

    #[error("Several syntheses are available; select one before reflection")]
    SelectionRequired,

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("No active agent to answer the broadcast")]
    NoActiveCohort,

    #[error("Session aborted")]
    Aborted,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl OrchestratorError {
    /// Session-fatal errors leave the session in `Aborted`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Configuration(_)
                | OrchestratorError::AllAgentsFailed { .. }
                | OrchestratorError::Aborted
        )
    }
}

impl From<DomainError> for OrchestratorError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Configuration(msg) => OrchestratorError::Configuration(msg),
            DomainError::InvalidPrompt(msg) => OrchestratorError::InvalidPrompt(msg),
            DomainError::InvalidAgentName(name) => OrchestratorError::UnknownAgent(name),
            DomainError::InvalidTransition { from, requested } => {
                OrchestratorError::InvalidTransition { from, requested }
            }
            DomainError::Cancelled => OrchestratorError::Aborted,
        }
    }
}

impl From<SelectionError> for OrchestratorError {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::NoSynthesis => OrchestratorError::AllAgentsFailed {
                phase: WorkflowPhase::Judgment,
            },
            SelectionError::SelectionRequired => OrchestratorError::SelectionRequired,
            SelectionError::NotAvailable(name) => OrchestratorError::UnknownAgent(name.to_string()),
        }
    }
}

/// Cloneable handle that aborts the running phase from another task
/// (e.g. a Ctrl-C watcher).
#[derive(Clone, Default)]
pub struct AbortHandle {
    token: Arc<Mutex<CancellationToken>>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_cancelled()
    }

    fn token(&self) -> CancellationToken {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Arm a fresh token for a new round.
    fn rearm(&self) {
        let mut token = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
    }
}

/// Per-agent line of [`SessionStatus`]
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub name: AgentName,
    pub model: String,
    pub harmonizer: bool,
    pub active: bool,
    pub busy: bool,
    pub messages: usize,
    pub failures: usize,
    pub unsaved: usize,
    pub integrity_issues: usize,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub round: u32,
    pub agents: Vec<AgentSummary>,
}

/// The one orchestrator of a session
pub struct CouncilOrchestrator {
    roster: Roster,
    /// One proxy per roster entry, in roster order.
    proxies: Vec<Arc<AgentProxy>>,
    store: Arc<ConversationStore>,
    params: ExecutionParams,
    state: WorkflowState,
    observer: Arc<dyn WorkflowObserver>,
    abort: AbortHandle,
}

impl CouncilOrchestrator {
    pub fn new(
        roster: Roster,
        proxies: Vec<Arc<AgentProxy>>,
        store: Arc<ConversationStore>,
        params: ExecutionParams,
    ) -> Result<Self, OrchestratorError> {
        check_proxies(&roster, &proxies)?;
        Ok(Self {
            roster,
            proxies,
            store,
            params,
            state: WorkflowState::new(),
            observer: Arc::new(NoObserver),
            abort: AbortHandle::default(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn params(&self) -> &ExecutionParams {
        &self.params
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Load every agent's persisted log. Failures leave that agent with an
    /// empty in-memory log.
    pub fn load_histories(&self) -> Vec<(AgentName, Result<LoadSummary, PersistenceError>)> {
        self.proxies
            .iter()
            .map(|proxy| {
                let name = proxy.name().clone();
                let result = self.store.load(&name);
                if let Err(e) = &result {
                    warn!("Could not load history of {}: {}", name, e);
                    self.observer.on_persistence_warning(&name, e);
                }
                (name, result)
            })
            .collect()
    }

    // ==================== Phases ====================

    /// Start a new round: send `prompt` to every active non-harmonizer.
    pub async fn broadcast(&mut self, prompt: &str) -> Result<CohortResponse, OrchestratorError> {
        let question = Question::new(prompt)?;
        self.roster
            .require_cohort()
            .map_err(|_| OrchestratorError::NoActiveCohort)?;
        let from = self.state.state();
        self.state.start_round(question)?;
        self.abort.rearm();
        self.transitioned(from);

        let text = PromptTemplate::broadcast(prompt);
        let requests = self
            .proxies_of(self.roster.cohort())
            .into_iter()
            .map(|proxy| DispatchRequest {
                proxy,
                prompt: text.clone(),
            })
            .collect();

        self.run_phase(WorkflowPhase::Broadcast, requests).await
    }

    /// Ask each broadcast respondent to critique the other answers.
    ///
    /// A respondent with no peer answer is not called; it is recorded as
    /// excluded from this phase instead.
    pub async fn request_vulnerability(&mut self) -> Result<CohortResponse, OrchestratorError> {
        self.check_abort()?;
        let from = self.state.state();
        self.state
            .begin_phase(WorkflowPhase::Vulnerability, "request vulnerability analysis")?;
        self.transitioned(from);

        let question = self.question();
        let answers = self.replies(WorkflowPhase::Broadcast);
        let missing = self.failed(WorkflowPhase::Broadcast);
        let missing: Vec<&str> = missing.iter().map(AgentName::as_str).collect();

        let mut requests = Vec::new();
        let mut lone = Vec::new();
        for (critic, _) in &answers {
            let peers: Vec<(&str, &str)> = answers
                .iter()
                .filter(|(name, _)| name != critic)
                .map(|(name, answer)| (name.as_str(), answer.as_str()))
                .collect();
            if peers.is_empty() {
                lone.push(critic.clone());
                continue;
            }
            if let Some(proxy) = self.proxy(critic) {
                requests.push(DispatchRequest {
                    proxy: Arc::clone(proxy),
                    prompt: PromptTemplate::vulnerability(&question, &peers, &missing),
                });
            }
        }
        for critic in lone {
            info!("{} has no peer answer to critique; skipping it", critic);
            self.state
                .exclude(critic, WorkflowPhase::Vulnerability, CallFailure::NoPeers);
        }

        self.run_phase(WorkflowPhase::Vulnerability, requests).await
    }

    /// Ask every harmonizer for a synthesis of the critiques.
    pub async fn request_judgment(&mut self) -> Result<CohortResponse, OrchestratorError> {
        self.check_abort()?;
        self.state
            .ensure_can(SessionState::Judgment, "request judgment")?;

        if let Err(e) = self.roster.require_harmonizer() {
            warn!("Judgment impossible: {}", e);
            self.abort_session();
            return Err(e.into());
        }

        let from = self.state.state();
        self.state
            .begin_phase(WorkflowPhase::Judgment, "request judgment")?;
        self.transitioned(from);

        let question = self.question();
        let critiques = self.replies(WorkflowPhase::Vulnerability);
        let critiques: Vec<(&str, &str)> = critiques
            .iter()
            .map(|(name, text)| (name.as_str(), text.as_str()))
            .collect();
        let missing: Vec<&str> = self
            .roster
            .cohort()
            .map(|spec| spec.name.as_str())
            .filter(|name| !critiques.iter().any(|(critic, _)| critic == name))
            .collect();
        let prompt = PromptTemplate::judgment(&question, &critiques, &missing);

        let requests = self
            .proxies_of(self.roster.harmonizers())
            .into_iter()
            .map(|proxy| DispatchRequest {
                proxy,
                prompt: prompt.clone(),
            })
            .collect();

        self.run_phase(WorkflowPhase::Judgment, requests).await
    }

    /// Send the selected synthesis or syntheses back to the broadcast
    /// respondents. Completes the round.
    pub async fn request_reflection(&mut self) -> Result<CohortResponse, OrchestratorError> {
        self.check_abort()?;
        self.state
            .ensure_can(SessionState::Reflection, "request reflection")?;

        let harmonizers: Vec<AgentName> =
            self.roster.harmonizers().map(|s| s.name.clone()).collect();
        let judgment = self
            .state
            .cohort(WorkflowPhase::Judgment)
            .cloned()
            .unwrap_or_else(|| CohortResponse::new(WorkflowPhase::Judgment));
        let syntheses = self.params.synthesis_policy.select(
            &judgment,
            &harmonizers,
            self.state.selected_synthesis(),
        )?;

        let from = self.state.state();
        self.state
            .begin_phase(WorkflowPhase::Reflection, "request reflection")?;
        self.transitioned(from);

        let prompt = PromptTemplate::reflection(&syntheses);
        let requests = self
            .replies(WorkflowPhase::Broadcast)
            .iter()
            .filter_map(|(name, _)| self.proxy(name))
            .map(|proxy| DispatchRequest {
                proxy: Arc::clone(proxy),
                prompt: prompt.clone(),
            })
            .collect();

        let cohort = self.run_phase(WorkflowPhase::Reflection, requests).await?;

        let from = self.state.state();
        self.state.complete()?;
        self.transitioned(from);
        info!("Round {} complete", self.state.round());
        Ok(cohort)
    }

    /// Run all four phases for `prompt`.
    ///
    /// With the manual synthesis policy this stops with
    /// [`OrchestratorError::SelectionRequired`] after judgment.
    pub async fn run_round(&mut self, prompt: &str) -> Result<&WorkflowState, OrchestratorError> {
        self.broadcast(prompt).await?;
        self.request_vulnerability().await?;
        self.request_judgment().await?;
        self.request_reflection().await?;
        Ok(&self.state)
    }

    /// Choose the synthesis reflection carries under the manual policy.
    pub fn select_synthesis(&mut self, harmonizer: &str) -> Result<(), OrchestratorError> {
        if self.state.state() != SessionState::AwaitingJudgmentResponse {
            return Err(OrchestratorError::InvalidTransition {
                from: self.state.state(),
                requested: "select a synthesis",
            });
        }
        let name = AgentName::new(harmonizer)?;
        let answered = self
            .state
            .cohort(WorkflowPhase::Judgment)
            .is_some_and(|c| c.responded(&name));
        if !answered {
            return Err(OrchestratorError::UnknownAgent(harmonizer.to_string()));
        }
        info!("Selected synthesis of {}", name);
        self.state.select_synthesis(name);
        Ok(())
    }

    /// Abort the current round. Returns whether a round was in progress.
    pub fn abort(&mut self) -> bool {
        self.abort_session()
    }

    // ==================== Session management ====================

    pub fn status(&self) -> SessionStatus {
        let agents = self
            .proxies
            .iter()
            .map(|proxy| {
                let name = proxy.name();
                let (messages, failures) = self
                    .store
                    .read(name, |log| (log.messages().count(), log.failures().count()));
                AgentSummary {
                    name: name.clone(),
                    model: proxy.model().to_string(),
                    harmonizer: proxy.is_harmonizer(),
                    active: self.roster.is_active(name),
                    busy: proxy.is_busy(),
                    messages,
                    failures,
                    unsaved: self.store.unsaved(name),
                    integrity_issues: self.store.integrity(name).issues.len(),
                    location: self.store.location(name),
                }
            })
            .collect();

        SessionStatus {
            state: self.state.state(),
            round: self.state.round(),
            agents,
        }
    }

    /// Switch an agent on or off between rounds. Returns the previous
    /// setting.
    pub fn set_active(&mut self, agent: &str, active: bool) -> Result<bool, OrchestratorError> {
        self.ensure_resting(if active {
            "enable an agent"
        } else {
            "disable an agent"
        })?;
        let name = self.known_agent(agent)?;
        let was = self.roster.set_active(&name, active)?;
        if was != active {
            info!("{} {}", name, if active { "enabled" } else { "disabled" });
        }
        if self.roster.cohort().next().is_none() {
            warn!("No active agent left to answer a broadcast");
        }
        if self.roster.harmonizers().next().is_none() {
            warn!("No active harmonizer left; judgment will fail");
        }
        Ok(was)
    }

    /// Walk the persisted integrity chain of one agent, or of every agent.
    pub fn integrity(&self, agent: Option<&str>) -> Result<Vec<IntegrityStatus>, OrchestratorError> {
        let names = match agent {
            Some(raw) => vec![self.known_agent(raw)?],
            None => self.roster.names(),
        };
        names
            .iter()
            .map(|name| self.store.check_integrity(name).map_err(OrchestratorError::from))
            .collect()
    }

    /// Re-seal the log of `agent` and clear the integrity issues on record.
    /// Returns the status found before the rebuild.
    pub fn rebuild_integrity(&mut self, agent: &str) -> Result<IntegrityStatus, OrchestratorError> {
        self.ensure_resting("rebuild a log")?;
        let name = self.known_agent(agent)?;
        Ok(self.store.rebuild(&name)?)
    }

    /// Clear every log and return to `Idle`.
    pub fn reset(&mut self) -> Result<(), OrchestratorError> {
        self.state.ensure_can(SessionState::Idle, "reset")?;
        for proxy in &self.proxies {
            self.store.reset(proxy.name())?;
        }
        let from = self.state.state();
        self.state.reset()?;
        self.transitioned(from);
        Ok(())
    }

    /// Replace the roster between rounds.
    pub fn reload_roster(
        &mut self,
        roster: Roster,
        proxies: Vec<Arc<AgentProxy>>,
    ) -> Result<(), OrchestratorError> {
        self.ensure_resting("reload the roster")?;
        check_proxies(&roster, &proxies)?;
        info!("Roster reloaded with {} agents", roster.len());
        self.roster = roster;
        self.proxies = proxies;
        Ok(())
    }

    /// Adopt the logs found in `dir` as the agents' histories.
    pub fn import_histories(
        &mut self,
        dir: &Path,
    ) -> Result<Vec<(AgentName, LoadSummary)>, OrchestratorError> {
        self.ensure_resting("import histories")?;
        let mut imported = Vec::new();
        for proxy in &self.proxies {
            if let Some(summary) = self.store.import_from(dir, proxy.name())? {
                info!(
                    "Imported {} messages for {} from {}",
                    summary.messages,
                    proxy.name(),
                    dir.display()
                );
                imported.push((proxy.name().clone(), summary));
            }
        }
        Ok(imported)
    }

    /// Chronological view over every agent's log.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.store.merge(&self.roster.names())
    }

    /// Retry queued log writes; returns the agents still failing.
    pub fn flush(&self) -> Vec<(AgentName, PersistenceError)> {
        self.store.flush_all()
    }

    // ==================== Internals ====================

    fn proxy(&self, name: &AgentName) -> Option<&Arc<AgentProxy>> {
        self.proxies.iter().find(|p| p.name() == name)
    }

    /// Proxies of `specs`, in the order given.
    fn proxies_of<'a>(&self, specs: impl Iterator<Item = &'a AgentSpec>) -> Vec<Arc<AgentProxy>> {
        specs
            .filter_map(|spec| self.proxy(&spec.name).map(Arc::clone))
            .collect()
    }

    fn known_agent(&self, raw: &str) -> Result<AgentName, OrchestratorError> {
        AgentName::new(raw)
            .ok()
            .filter(|name| self.roster.contains(name))
            .ok_or_else(|| OrchestratorError::UnknownAgent(raw.to_string()))
    }

    async fn run_phase(
        &mut self,
        phase: WorkflowPhase,
        requests: Vec<DispatchRequest>,
    ) -> Result<CohortResponse, OrchestratorError> {
        let expected: Vec<AgentName> = requests.iter().map(|r| r.proxy.name().clone()).collect();
        let settings = self.call_settings(phase);

        let from = self.state.state();
        self.state.await_responses(expected.iter().cloned())?;
        self.transitioned(from);

        info!("{}: sending to {} agents", phase, expected.len());
        self.observer.on_phase_start(phase, &expected);

        let token = self.abort.token();
        let fan_out =
            match Dispatcher::fan_out(requests, &settings, &token, self.observer.as_ref()).await {
                Ok(fan_out) => fan_out,
                Err(Cancelled) => {
                    self.abort_session();
                    return Err(OrchestratorError::Aborted);
                }
            };

        let failure = unsettled_failure(&fan_out);
        for (agent, outcome) in fan_out.settled {
            self.state.record_outcome(agent, outcome);
        }
        if !self.state.is_settled() {
            warn!(
                "{}: no result from {:?}, marking as {}",
                phase,
                self.state.pending(),
                failure
            );
            self.state.settle(failure);
        }

        let cohort = self
            .state
            .cohort(phase)
            .cloned()
            .unwrap_or_else(|| CohortResponse::new(phase));
        self.observer.on_phase_complete(phase, &cohort);

        if cohort.all_failed() {
            warn!("{}: every agent failed", phase);
            self.abort_session();
            return Err(OrchestratorError::AllAgentsFailed { phase });
        }
        Ok(cohort)
    }

    fn call_settings(&self, phase: WorkflowPhase) -> CallSettings {
        CallSettings {
            phase,
            round: self.state.round(),
            deadline: Instant::now() + self.params.phase_timeout,
            retry: self.params.retry,
            context_window: self.params.context_window,
            system: PromptTemplate::system_preamble(&self.params.instructions),
        }
    }

    /// Successful replies of `phase` in roster order.
    fn replies(&self, phase: WorkflowPhase) -> Vec<(AgentName, String)> {
        let Some(cohort) = self.state.cohort(phase) else {
            return Vec::new();
        };
        self.roster
            .agents()
            .iter()
            .filter_map(|spec| {
                cohort
                    .get(&spec.name)
                    .and_then(|o| o.message())
                    .map(|m| (spec.name.clone(), m.content().to_string()))
            })
            .collect()
    }

    /// Agents that failed `phase`, in roster order.
    fn failed(&self, phase: WorkflowPhase) -> Vec<AgentName> {
        let Some(cohort) = self.state.cohort(phase) else {
            return Vec::new();
        };
        self.roster
            .agents()
            .iter()
            .filter(|spec| cohort.get(&spec.name).is_some_and(|o| !o.is_success()))
            .map(|spec| spec.name.clone())
            .collect()
    }

    fn question(&self) -> String {
        self.state
            .question()
            .map(|q| q.content().to_string())
            .unwrap_or_default()
    }

    /// An abort requested between phases takes effect at the next request.
    fn check_abort(&mut self) -> Result<(), OrchestratorError> {
        if self.abort.is_aborted() && self.state.state().is_awaiting() {
            self.abort_session();
            return Err(OrchestratorError::Aborted);
        }
        Ok(())
    }

    fn abort_session(&mut self) -> bool {
        let from = self.state.state();
        let aborted = self.state.abort();
        if aborted {
            warn!("Round {} aborted during {}", self.state.round(), from);
            self.transitioned(from);
        }
        aborted
    }

    fn ensure_resting(&self, requested: &'static str) -> Result<(), OrchestratorError> {
        if self.state.state().is_resting() {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: self.state.state(),
                requested,
            })
        }
    }

    fn transitioned(&self, from: SessionState) {
        let to = self.state.state();
        if from != to {
            info!("Session: {} -> {}", from, to);
            self.observer.on_state_change(from, to);
        }
    }
}

fn check_proxies(roster: &Roster, proxies: &[Arc<AgentProxy>]) -> Result<(), OrchestratorError> {
    let matches = proxies.len() == roster.len()
        && roster
            .agents()
            .iter()
            .zip(proxies)
            .all(|(spec, proxy)| {
                let built = proxy.spec();
                built.name == spec.name
                    && built.model == spec.model
                    && built.is_harmonizer == spec.is_harmonizer
            });
    if matches {
        Ok(())
    } else {
        Err(OrchestratorError::Configuration(
            "agent proxies do not match the roster".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::ports::log_persistence::MemoryLogPersistence;
    use crate::ports::provider_client::ProviderError;
    use crate::use_cases::test_support::{ScriptedClient, harmonizer, spec};
    use council_domain::{AgentOutcome, AgentSpec, CallFailure, SynthesisPolicy};
    use std::collections::HashMap;
    use std::time::Duration;

    struct Council {
        orchestrator: CouncilOrchestrator,
        clients: HashMap<String, Arc<ScriptedClient>>,
        persistence: Arc<MemoryLogPersistence>,
    }

    impl Council {
        fn client(&self, agent: &str) -> &ScriptedClient {
            &self.clients[agent]
        }

        fn log_len(&self, agent: &str) -> (usize, usize) {
            let log = self
                .orchestrator
                .store()
                .snapshot(&AgentName::new(agent).unwrap());
            (log.messages().count(), log.failures().count())
        }
    }

    fn params() -> ExecutionParams {
        ExecutionParams::default()
            .with_phase_timeout(Duration::from_secs(10))
            .with_retry(RetryPolicy::none())
    }

    fn council(agents: Vec<(AgentSpec, ScriptedClient)>, params: ExecutionParams) -> Council {
        let persistence = Arc::new(MemoryLogPersistence::new());
        let store = Arc::new(ConversationStore::new(persistence.clone()));
        let mut clients = HashMap::new();
        let mut specs = Vec::new();
        let mut proxies = Vec::new();
        for (spec, client) in agents {
            let client = Arc::new(client);
            clients.insert(spec.name.to_string(), Arc::clone(&client));
            proxies.push(Arc::new(AgentProxy::new(
                spec.clone(),
                client,
                Arc::clone(&store),
            )));
            specs.push(spec);
        }
        let roster = Roster::new(specs).unwrap();
        Council {
            orchestrator: CouncilOrchestrator::new(roster, proxies, store, params).unwrap(),
            clients,
            persistence,
        }
    }

    fn abh() -> Council {
        council(
            vec![
                (spec("a"), ScriptedClient::echo("a")),
                (spec("b"), ScriptedClient::echo("b")),
                (harmonizer("h"), ScriptedClient::echo("h")),
            ],
            params(),
        )
    }

    #[tokio::test]
    async fn test_full_round_with_two_agents_and_harmonizer() {
        let mut council = abh();
        let state = council.orchestrator.run_round("X?").await.unwrap();
        assert_eq!(state.state(), SessionState::Complete);
        assert!(state.exclusions().is_empty());

        // The harmonizer never receives the broadcast.
        let h_prompts = council.client("h").prompts();
        assert_eq!(h_prompts.len(), 1);
        assert!(h_prompts[0].contains("--- Agent a ---\na says:"));
        assert!(h_prompts[0].contains("--- Agent b ---\nb says:"));

        // Each critic sees only the other answer.
        let a_prompts = council.client("a").prompts();
        assert_eq!(a_prompts[0], "X?");
        assert!(a_prompts[1].contains("b says: X?"));
        assert!(!a_prompts[1].contains("a says: X?"));
        let b_prompts = council.client("b").prompts();
        assert!(b_prompts[1].contains("a says: X?"));
        assert!(!b_prompts[1].contains("b says: X?"));

        // Reflection carries the synthesis.
        assert!(a_prompts[2].contains("h says: The following statements"));
        assert!(b_prompts[2].contains("h says: The following statements"));

        assert_eq!(council.log_len("a"), (3, 0));
        assert_eq!(council.log_len("b"), (3, 0));
        assert_eq!(council.log_len("h"), (1, 0));
        assert_eq!(
            council
                .persistence
                .records(&AgentName::new("a").unwrap())
                .len(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_agent_is_excluded_for_the_round() {
        let mut council = council(
            vec![
                (spec("a"), ScriptedClient::echo("a")),
                (spec("b"), ScriptedClient::echo("b")),
                (
                    spec("c"),
                    ScriptedClient::echo("c").with_delay(Duration::from_secs(300)),
                ),
                (harmonizer("h"), ScriptedClient::echo("h")),
            ],
            params(),
        );

        let broadcast = council.orchestrator.broadcast("X?").await.unwrap();
        let c = AgentName::new("c").unwrap();
        assert_eq!(
            broadcast.get(&c),
            Some(&AgentOutcome::Failed(CallFailure::Timeout))
        );
        assert_eq!(
            council.orchestrator.state().state(),
            SessionState::AwaitingBroadcastResponses
        );

        council.orchestrator.request_vulnerability().await.unwrap();
        let a_prompts = council.client("a").prompts();
        assert!(a_prompts[1].contains("b says: X?"));
        assert!(a_prompts[1].contains("[no response from c]"));
        assert!(!a_prompts[1].contains("c says"));

        council.orchestrator.request_judgment().await.unwrap();
        let h_prompt = &council.client("h").prompts()[0];
        assert!(h_prompt.contains("--- Agent a ---"));
        assert!(h_prompt.contains("[no response from c]"));

        council.orchestrator.request_reflection().await.unwrap();
        assert_eq!(
            council.orchestrator.state().state(),
            SessionState::Complete
        );
        assert_eq!(council.client("c").calls(), 1);
        assert_eq!(council.log_len("a"), (3, 0));
        assert_eq!(council.log_len("c"), (0, 1));
        assert_eq!(council.log_len("h"), (1, 0));

        let exclusions = council.orchestrator.state().exclusions();
        assert_eq!(exclusions.len(), 1);
        assert_eq!(exclusions[0].agent, c);
        assert_eq!(exclusions[0].phase, WorkflowPhase::Broadcast);
    }

    #[tokio::test]
    async fn test_lone_respondent_is_not_asked_to_critique() {
        let mut council = council(
            vec![
                (spec("a"), ScriptedClient::echo("a")),
                (
                    spec("b"),
                    ScriptedClient::replying(|_| Err(ProviderError::Auth("bad key".into()))),
                ),
                (harmonizer("h"), ScriptedClient::echo("h")),
            ],
            params(),
        );

        council.orchestrator.broadcast("X?").await.unwrap();
        let vulnerability = council.orchestrator.request_vulnerability().await.unwrap();
        assert!(vulnerability.is_empty());
        assert_eq!(council.client("a").calls(), 1);

        let a = AgentName::new("a").unwrap();
        let skipped = council
            .orchestrator
            .state()
            .exclusions()
            .iter()
            .find(|e| e.agent == a)
            .unwrap();
        assert_eq!(skipped.phase, WorkflowPhase::Vulnerability);
        assert_eq!(skipped.reason, CallFailure::NoPeers);
        assert_eq!(council.log_len("a"), (1, 0));

        council.orchestrator.request_judgment().await.unwrap();
        council.orchestrator.request_reflection().await.unwrap();
        assert_eq!(council.client("a").calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_barrier_waits_for_slowest_agent() {
        let mut council = council(
            vec![
                (spec("a"), ScriptedClient::echo("a")),
                (
                    spec("b"),
                    ScriptedClient::echo("b").with_delay(Duration::from_secs(5)),
                ),
                (harmonizer("h"), ScriptedClient::echo("h")),
            ],
            params(),
        );

        let started = Instant::now();
        let broadcast = council.orchestrator.broadcast("X?").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(broadcast.successes().count(), 2);
        assert!(council.orchestrator.state().is_settled());
    }

    #[tokio::test]
    async fn test_out_of_order_requests_are_rejected() {
        let mut council = abh();
        let err = council.orchestrator.request_vulnerability().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        council.orchestrator.broadcast("X?").await.unwrap();
        let err = council.orchestrator.request_judgment().await.unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::InvalidTransition {
                from: SessionState::AwaitingBroadcastResponses,
                requested: "request judgment",
            }
        );
        let err = council.orchestrator.broadcast("Y?").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        council.orchestrator.request_vulnerability().await.unwrap();
        assert!(council.orchestrator.request_vulnerability().await.is_err());
        assert_eq!(council.client("a").calls(), 2);
    }

    #[tokio::test]
    async fn test_judgment_without_harmonizer_aborts_before_any_call() {
        let mut council = council(
            vec![
                (spec("a"), ScriptedClient::echo("a")),
                (spec("b"), ScriptedClient::echo("b")),
            ],
            params(),
        );
        council.orchestrator.broadcast("X?").await.unwrap();
        council.orchestrator.request_vulnerability().await.unwrap();

        let err = council.orchestrator.request_judgment().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
        assert!(err.is_fatal());
        assert_eq!(council.orchestrator.state().state(), SessionState::Aborted);
        assert_eq!(council.client("a").calls(), 2);
        assert_eq!(council.client("b").calls(), 2);
    }

    #[tokio::test]
    async fn test_every_agent_failing_aborts_the_session() {
        let failing = || ScriptedClient::replying(|_| Err(ProviderError::Auth("bad key".into())));
        let mut council = council(
            vec![
                (spec("a"), failing()),
                (spec("b"), failing()),
                (harmonizer("h"), ScriptedClient::echo("h")),
            ],
            params(),
        );

        let err = council.orchestrator.broadcast("X?").await.unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::AllAgentsFailed {
                phase: WorkflowPhase::Broadcast
            }
        );
        assert_eq!(council.orchestrator.state().state(), SessionState::Aborted);
        assert_eq!(council.log_len("a"), (0, 1));

        // A fresh round may start after an abort.
        assert!(council.orchestrator.broadcast("Y?").await.is_err());
        assert_eq!(council.orchestrator.state().round(), 2);
    }

    #[tokio::test]
    async fn test_manual_policy_requires_selection() {
        let mut council = council(
            vec![
                (spec("a"), ScriptedClient::echo("a")),
                (spec("b"), ScriptedClient::echo("b")),
                (harmonizer("h1"), ScriptedClient::echo("h1")),
                (harmonizer("h2"), ScriptedClient::echo("h2")),
            ],
            params().with_synthesis_policy(SynthesisPolicy::Manual),
        );

        let err = council.orchestrator.run_round("X?").await.unwrap_err();
        assert_eq!(err, OrchestratorError::SelectionRequired);
        assert_eq!(
            council.orchestrator.state().state(),
            SessionState::AwaitingJudgmentResponse
        );

        assert_eq!(
            council.orchestrator.select_synthesis("a").unwrap_err(),
            OrchestratorError::UnknownAgent("a".to_string())
        );
        council.orchestrator.select_synthesis("h2").unwrap();
        council.orchestrator.request_reflection().await.unwrap();

        let reflection = &council.client("a").prompts()[2];
        assert!(reflection.contains("h2 says:"));
        assert!(!reflection.contains("h1 says:"));
    }

    #[tokio::test]
    async fn test_independent_policy_forwards_every_synthesis() {
        let mut council = council(
            vec![
                (spec("a"), ScriptedClient::echo("a")),
                (spec("b"), ScriptedClient::echo("b")),
                (harmonizer("h1"), ScriptedClient::echo("h1")),
                (harmonizer("h2"), ScriptedClient::echo("h2")),
            ],
            params(),
        );
        council.orchestrator.run_round("X?").await.unwrap();

        let reflection = &council.client("b").prompts()[2];
        assert!(reflection.contains("--- Judgment by h1 ---\nh1 says:"));
        assert!(reflection.contains("--- Judgment by h2 ---\nh2 says:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_handle_cancels_running_phase() {
        let slow = |name: &str| ScriptedClient::echo(name).with_delay(Duration::from_secs(5));
        let mut council = council(
            vec![
                (spec("a"), slow("a")),
                (spec("b"), slow("b")),
                (harmonizer("h"), ScriptedClient::echo("h")),
            ],
            params(),
        );
        let handle = council.orchestrator.abort_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.abort();
        });

        let err = council.orchestrator.broadcast("X?").await.unwrap_err();
        assert_eq!(err, OrchestratorError::Aborted);
        assert_eq!(council.orchestrator.state().state(), SessionState::Aborted);
        let status = council.orchestrator.status();
        assert!(status.agents.iter().all(|a| !a.busy && a.messages == 0));

        council.orchestrator.broadcast("X?").await.unwrap();
        assert_eq!(council.log_len("a"), (1, 0));
    }

    #[tokio::test]
    async fn test_abort_between_phases() {
        let mut council = abh();
        assert!(!council.orchestrator.abort());

        council.orchestrator.broadcast("X?").await.unwrap();
        council.orchestrator.abort_handle().abort();
        let err = council.orchestrator.request_vulnerability().await.unwrap_err();
        assert_eq!(err, OrchestratorError::Aborted);
        assert_eq!(council.orchestrator.state().state(), SessionState::Aborted);
        assert_eq!(council.client("a").calls(), 1);
    }

    #[tokio::test]
    async fn test_next_round_replays_history() {
        let mut council = abh();
        council.orchestrator.run_round("X?").await.unwrap();
        council.orchestrator.broadcast("Y?").await.unwrap();

        assert_eq!(council.orchestrator.state().round(), 2);
        let contexts = council.client("a").contexts();
        assert_eq!(contexts.last().unwrap().turns.len(), 6);
        assert_eq!(council.log_len("a"), (4, 0));
    }

    #[tokio::test]
    async fn test_reset_clears_logs() {
        let mut council = abh();
        council.orchestrator.broadcast("X?").await.unwrap();
        assert!(council.orchestrator.reset().is_err());

        council.orchestrator.abort();
        council.orchestrator.reset().unwrap();
        assert_eq!(council.orchestrator.state().state(), SessionState::Idle);
        assert_eq!(council.log_len("a"), (0, 0));
        assert!(
            council
                .persistence
                .records(&AgentName::new("a").unwrap())
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_timeline_and_status() {
        let mut council = abh();
        council.orchestrator.run_round("X?").await.unwrap();

        let timeline = council.orchestrator.timeline();
        assert_eq!(timeline.len(), 7);
        assert!(
            timeline
                .windows(2)
                .all(|w| w[0].message.created_at() <= w[1].message.created_at())
        );

        let status = council.orchestrator.status();
        assert_eq!(status.state, SessionState::Complete);
        let h = status.agents.iter().find(|a| a.name.as_str() == "h").unwrap();
        assert!(h.harmonizer);
        assert_eq!(h.messages, 1);
        assert_eq!(h.location, "memory:h");
    }

    #[tokio::test]
    async fn test_inactive_agents_receive_no_prompts() {
        let mut council = council(
            vec![
                (spec("a"), ScriptedClient::echo("a")),
                (spec("b"), ScriptedClient::echo("b")),
                (spec("c").inactive(), ScriptedClient::echo("c")),
                (harmonizer("h1"), ScriptedClient::echo("h1")),
                (harmonizer("h2").inactive(), ScriptedClient::echo("h2")),
            ],
            params(),
        );

        council.orchestrator.run_round("X?").await.unwrap();
        assert_eq!(council.client("c").calls(), 0);
        assert_eq!(council.client("h2").calls(), 0);
        assert!(!council.client("a").prompts()[1].contains("c says"));
        assert!(!council.client("h1").prompts()[0].contains("no response from c"));

        let status = council.orchestrator.status();
        let c = status.agents.iter().find(|a| a.name.as_str() == "c").unwrap();
        assert!(!c.active);
        assert_eq!(c.messages, 0);

        assert!(!council.orchestrator.set_active("c", true).unwrap());
        assert!(council.orchestrator.set_active("a", false).unwrap());
        council.orchestrator.run_round("Y?").await.unwrap();
        assert_eq!(council.client("c").calls(), 3);
        assert_eq!(council.client("a").calls(), 3);
        assert!(council.orchestrator.status().agents[2].active);
    }

    #[tokio::test]
    async fn test_enable_and_disable_only_between_rounds() {
        let mut council = abh();
        assert_eq!(
            council.orchestrator.set_active("zed", false).unwrap_err(),
            OrchestratorError::UnknownAgent("zed".to_string())
        );

        council.orchestrator.broadcast("X?").await.unwrap();
        assert!(matches!(
            council.orchestrator.set_active("a", false).unwrap_err(),
            OrchestratorError::InvalidTransition { .. }
        ));

        council.orchestrator.abort();
        council.orchestrator.set_active("a", false).unwrap();
        council.orchestrator.set_active("b", false).unwrap();
        let err = council.orchestrator.broadcast("Y?").await.unwrap_err();
        assert_eq!(err, OrchestratorError::NoActiveCohort);
        assert_eq!(council.orchestrator.state().state(), SessionState::Aborted);
        assert_eq!(council.orchestrator.state().round(), 1);
    }

    #[tokio::test]
    async fn test_integrity_report_and_rebuild() {
        let mut council = abh();
        council.orchestrator.run_round("X?").await.unwrap();

        let statuses = council.orchestrator.integrity(None).unwrap();
        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().all(IntegrityStatus::is_intact));

        let a = AgentName::new("a").unwrap();
        let mut records = council.persistence.records(&a);
        records[1].content = Some("rewritten by hand".into());
        council.persistence.insert(a.clone(), records);

        let status = council.orchestrator.integrity(Some("a")).unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(
            status[0].on_disk.issues,
            vec![council_domain::IntegrityIssue::HashMismatch { index: 1 }]
        );
        assert!(council.orchestrator.integrity(Some("zed")).is_err());

        let before = council.orchestrator.rebuild_integrity("a").unwrap();
        assert!(!before.is_intact());
        assert!(council.orchestrator.integrity(Some("a")).unwrap()[0].is_intact());
    }

    #[tokio::test]
    async fn test_reload_roster_only_between_rounds() {
        let mut council = abh();
        council.orchestrator.broadcast("X?").await.unwrap();

        let store = Arc::clone(council.orchestrator.store());
        let specs = vec![spec("c"), harmonizer("h")];
        let proxies: Vec<_> = specs
            .iter()
            .map(|s| {
                Arc::new(AgentProxy::new(
                    s.clone(),
                    Arc::new(ScriptedClient::echo(s.name.as_str())),
                    Arc::clone(&store),
                ))
            })
            .collect();
        let roster = Roster::new(specs).unwrap();

        let err = council
            .orchestrator
            .reload_roster(roster.clone(), proxies.clone())
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        council.orchestrator.abort();
        council.orchestrator.reload_roster(roster, proxies).unwrap();
        assert_eq!(council.orchestrator.roster().len(), 2);
    }
}
