//! Builds one agent proxy per roster entry.

use crate::ports::provider_client::ProviderFactory;
use crate::use_cases::agent_proxy::AgentProxy;
use crate::use_cases::conversation_store::ConversationStore;
use council_domain::{DomainError, Roster};
use std::sync::Arc;
use tracing::debug;

/// Validate the roster for a full council round, then create the proxies in
/// roster order. No client is created when validation fails.
pub fn build_proxies(
    roster: &Roster,
    factory: &dyn ProviderFactory,
    store: &Arc<ConversationStore>,
) -> Result<Vec<Arc<AgentProxy>>, DomainError> {
    roster.require_harmonizer()?;

    roster
        .agents()
        .iter()
        .map(|spec| {
            let client = factory.create(spec)?;
            debug!("Created {} client for {}", client.model(), spec.name);
            Ok(Arc::new(AgentProxy::new(
                spec.clone(),
                client,
                Arc::clone(store),
            )))
        })
        .collect()
}
