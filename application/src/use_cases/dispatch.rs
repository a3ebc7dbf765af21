//! Dispatch layer
//!
//! Fans one prompt per agent out to the agents' proxies, at most one call
//! per agent, and collects the settled outcomes. Per-agent failures are
//! absorbed here and returned as [`AgentOutcome::Failed`]; only cancellation
//! ends a fan-out early.

use crate::ports::progress::{AgentStatus, WorkflowObserver};
use crate::use_cases::agent_proxy::{AgentProxy, CallSettings};
use council_domain::{AgentName, AgentOutcome, CallFailure};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long after the phase deadline the dispatcher stops waiting for a
/// call that has not settled on its own.
const DEADLINE_GRACE: Duration = Duration::from_secs(1);

/// One request of a fan-out
pub struct DispatchRequest {
    pub proxy: Arc<AgentProxy>,
    pub prompt: String,
}

/// Settled outcomes of a fan-out, in settle order
#[derive(Debug, Default)]
pub struct FanOut {
    pub settled: Vec<(AgentName, AgentOutcome)>,
    /// The deadline backstop fired and unsettled calls were aborted.
    pub deadline_hit: bool,
}

/// The fan-out was cancelled; every call was aborted and every permit freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

pub struct Dispatcher;

impl Dispatcher {
    pub async fn fan_out(
        requests: Vec<DispatchRequest>,
        settings: &CallSettings,
        cancel: &CancellationToken,
        observer: &dyn WorkflowObserver,
    ) -> Result<FanOut, Cancelled> {
        let phase = settings.phase;
        let mut result = FanOut::default();
        let mut join_set = JoinSet::new();

        for request in requests {
            let name = request.proxy.name().clone();
            let permit = match request.proxy.try_acquire() {
                Ok(permit) => permit,
                Err(busy) => {
                    warn!("{} is busy; skipping it for {}", name, phase.as_str());
                    observer.on_agent_status(phase, &name, &AgentStatus::Failed(busy.to_string()));
                    result.settled.push((name, AgentOutcome::Failed(busy)));
                    continue;
                }
            };

            observer.on_agent_status(phase, &name, &AgentStatus::Busy);
            let proxy = request.proxy;
            let prompt = request.prompt;
            let settings = settings.clone();
            join_set.spawn(async move {
                let outcome = proxy.send(permit, &prompt, &settings).await;
                (proxy.name().clone(), outcome)
            });
        }

        let backstop = settings.deadline + DEADLINE_GRACE;
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("{} cancelled; aborting {} calls", phase.display_name(), join_set.len());
                    join_set.abort_all();
                    while join_set.join_next().await.is_some() {}
                    return Err(Cancelled);
                }

                _ = sleep_until(backstop) => {
                    warn!("{} calls still running past the deadline; aborting", join_set.len());
                    join_set.abort_all();
                    while join_set.join_next().await.is_some() {}
                    result.deadline_hit = true;
                    break;
                }

                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((name, outcome)) => {
                            if let Some(warning) = &outcome.warning {
                                observer.on_persistence_warning(&name, warning);
                            }
                            let (status, outcome) = match outcome.result {
                                Ok(message) => (AgentStatus::Succeeded, AgentOutcome::Responded(message)),
                                Err(failure) => (
                                    AgentStatus::Failed(failure.to_string()),
                                    AgentOutcome::Failed(failure),
                                ),
                            };
                            debug!("{} settled for {}", name, phase.as_str());
                            observer.on_agent_status(phase, &name, &status);
                            result.settled.push((name, outcome));
                        }
                        Err(e) => {
                            warn!("Task join error: {}", e);
                        }
                    }
                }
            }
        }

        Ok(result)
    }
}

/// Failure assigned to agents that never settled.
pub fn unsettled_failure(fan_out: &FanOut) -> CallFailure {
    if fan_out.deadline_hit {
        CallFailure::Timeout
    } else {
        CallFailure::ProviderError("call ended without a result".to_string())
    }
}
