//! Agent proxy
//!
//! Wraps one roster entry and its provider client. The proxy owns the
//! agent's busy gate (a one-permit semaphore) and is the only writer of the
//! agent's conversation log.

use crate::config::RetryPolicy;
use crate::ports::log_persistence::PersistenceError;
use crate::ports::provider_client::{
    ContextTurn, ProviderClient, ProviderContext, ProviderError, ProviderReply,
};
use crate::use_cases::conversation_store::{AppendOutcome, ConversationStore};
use council_domain::{
    AgentName, AgentSpec, CallFailure, ConversationLog, Message, MessageDraft, Model, Role,
    WorkflowPhase,
};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, warn};

/// Exclusive right to call one agent. Dropping it frees the agent.
#[derive(Debug)]
pub struct BusyPermit {
    agent: AgentName,
    _permit: OwnedSemaphorePermit,
}

impl BusyPermit {
    pub fn agent(&self) -> &AgentName {
        &self.agent
    }
}

/// Per-phase call settings shared by every proxy in a fan-out
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub phase: WorkflowPhase,
    pub round: u32,
    /// Every call of the phase must settle before this instant.
    pub deadline: Instant,
    pub retry: RetryPolicy,
    pub context_window: usize,
    pub system: String,
}

/// Result of one `send`
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub result: Result<Message, CallFailure>,
    pub warning: Option<PersistenceError>,
}

pub struct AgentProxy {
    spec: AgentSpec,
    client: Arc<dyn ProviderClient>,
    store: Arc<ConversationStore>,
    gate: Arc<Semaphore>,
}

impl std::fmt::Debug for AgentProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentProxy")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl AgentProxy {
    pub fn new(
        spec: AgentSpec,
        client: Arc<dyn ProviderClient>,
        store: Arc<ConversationStore>,
    ) -> Self {
        Self {
            spec,
            client,
            store,
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn name(&self) -> &AgentName {
        &self.spec.name
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn model(&self) -> &Model {
        self.client.model()
    }

    pub fn is_harmonizer(&self) -> bool {
        self.spec.is_harmonizer
    }

    /// Take the agent's busy gate without waiting.
    pub fn try_acquire(&self) -> Result<BusyPermit, CallFailure> {
        Arc::clone(&self.gate)
            .try_acquire_owned()
            .map(|permit| BusyPermit {
                agent: self.spec.name.clone(),
                _permit: permit,
            })
            .map_err(|_| CallFailure::Busy)
    }

    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }

    pub fn load_history(&self) -> ConversationLog {
        self.store.snapshot(self.name())
    }

    pub fn append(&self, draft: MessageDraft) -> AppendOutcome<Message> {
        self.store.append(self.name(), draft)
    }

    /// Send `prompt` and log exactly one message or one failure record.
    ///
    /// The permit is held for the whole call and released on every exit,
    /// including when this future is dropped. A dropped call logs nothing.
    pub async fn send(
        &self,
        permit: BusyPermit,
        prompt: &str,
        settings: &CallSettings,
    ) -> SendOutcome {
        debug_assert_eq!(permit.agent(), self.name());

        let context = self.build_context(settings);
        debug!(
            "Sending {} prompt to {} ({} chars, {} context turns)",
            settings.phase.as_str(),
            self.name(),
            prompt.len(),
            context.turns.len()
        );

        let call = self.call_with_retry(prompt, &context, settings.retry);
        let result = match timeout_at(settings.deadline, call).await {
            Ok(Ok(reply)) if reply.text.trim().is_empty() => Err(CallFailure::MalformedResponse(
                "provider returned no text".to_string(),
            )),
            Ok(Ok(reply)) => Ok(reply.text),
            Ok(Err(e)) => Err(CallFailure::from(e)),
            Err(_) => Err(CallFailure::Timeout),
        };

        let outcome = match result {
            Ok(text) => {
                let draft = MessageDraft::agent_reply(self.name().as_str(), text)
                    .with_phase(settings.phase)
                    .with_round(settings.round)
                    .with_prompt(prompt);
                let appended = self.store.append(self.name(), draft);
                SendOutcome {
                    result: Ok(appended.value),
                    warning: appended.warning,
                }
            }
            Err(failure) => {
                warn!(
                    "{} failed during {}: {}",
                    self.name(),
                    settings.phase.as_str(),
                    failure
                );
                let warning = self
                    .store
                    .record_failure(self.name(), &failure, settings.phase, settings.round)
                    .and_then(|o| o.warning);
                SendOutcome {
                    result: Err(failure),
                    warning,
                }
            }
        };

        drop(permit);
        outcome
    }

    async fn call_with_retry(
        &self,
        prompt: &str,
        context: &ProviderContext,
        retry: RetryPolicy,
    ) -> Result<ProviderReply, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.client.call(prompt, context, &self.spec.params).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    let delay = retry.backoff(attempt);
                    warn!(
                        "{} attempt {} failed ({}), retrying in {:?}",
                        self.name(),
                        attempt + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Rebuild provider context from this agent's own log.
    fn build_context(&self, settings: &CallSettings) -> ProviderContext {
        let turns = self.store.read(self.name(), |log| {
            let mut turns = Vec::new();
            for message in log.recent_messages(settings.context_window) {
                match message.role() {
                    Role::User => turns.push(ContextTurn::user(message.content())),
                    Role::Agent => {
                        if let Some(prompt) = message.prompt() {
                            turns.push(ContextTurn::user(prompt));
                        }
                        turns.push(ContextTurn::assistant(message.content()));
                    }
                    Role::System => {}
                }
            }
            turns
        });
        ProviderContext {
            system: settings.system.clone(),
            turns,
        }
    }
}
