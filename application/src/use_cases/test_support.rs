//! Scripted provider clients for use case tests.

use crate::ports::provider_client::{
    ProviderClient, ProviderContext, ProviderError, ProviderFactory, ProviderReply,
};
use async_trait::async_trait;
use council_domain::{
    AgentName, AgentSpec, DomainError, GenerationParams, Model, ProviderKind,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

pub fn spec(name: &str) -> AgentSpec {
    AgentSpec::new(
        AgentName::new(name).unwrap(),
        Model::new(ProviderKind::Echo, "scripted"),
    )
}

pub fn harmonizer(name: &str) -> AgentSpec {
    spec(name).harmonizer()
}

/// Provider client that answers from a closure and records every call
pub struct ScriptedClient {
    model: Model,
    responder: Responder,
    failures: Mutex<VecDeque<ProviderError>>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    contexts: Mutex<Vec<ProviderContext>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn replying(
        responder: impl Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            model: Model::new(ProviderKind::Echo, "scripted"),
            responder: Box::new(responder),
            failures: Mutex::new(VecDeque::new()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Replies `"<agent> says: <first line of prompt>"`.
    pub fn echo(agent: &str) -> Self {
        let agent = agent.to_string();
        Self::replying(move |prompt| {
            Ok(format!(
                "{} says: {}",
                agent,
                prompt.lines().next().unwrap_or_default()
            ))
        })
    }

    /// Fail the first calls with `failures`, in order.
    pub fn with_failures(self, failures: Vec<ProviderError>) -> Self {
        *self.failures.lock().unwrap() = failures.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn contexts(&self) -> Vec<ProviderContext> {
        self.contexts.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    fn model(&self) -> &Model {
        &self.model
    }

    async fn call(
        &self,
        prompt: &str,
        context: &ProviderContext,
        _params: &GenerationParams,
    ) -> Result<ProviderReply, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.prompts.lock().unwrap().push(prompt.to_string());
        self.contexts.lock().unwrap().push(context.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted_failure = self.failures.lock().unwrap().pop_front();
        if let Some(error) = scripted_failure {
            return Err(error);
        }
        (self.responder)(prompt).map(ProviderReply::text)
    }
}

/// Factory handing out pre-built scripted clients by agent name
#[derive(Default)]
pub struct ScriptedFactory {
    clients: Mutex<HashMap<AgentName, Arc<ScriptedClient>>>,
    created: AtomicUsize,
}

impl ScriptedFactory {
    pub fn with(self, agent: &str, client: ScriptedClient) -> Self {
        self.clients
            .lock()
            .unwrap()
            .insert(AgentName::new(agent).unwrap(), Arc::new(client));
        self
    }

    pub fn client(&self, agent: &str) -> Arc<ScriptedClient> {
        self.clients.lock().unwrap()[&AgentName::new(agent).unwrap()].clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, spec: &AgentSpec) -> Result<Arc<dyn ProviderClient>, DomainError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let mut clients = self.clients.lock().unwrap();
        let client = clients
            .entry(spec.name.clone())
            .or_insert_with(|| Arc::new(ScriptedClient::echo(spec.name.as_str())));
        Ok(client.clone())
    }
}
