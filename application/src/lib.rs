//! Application layer for agent-council
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ExecutionParams, RetryPolicy};
pub use ports::{
    log_persistence::{LoadedRecords, LogPersistence, MemoryLogPersistence, PersistenceError},
    progress::{AgentStatus, NoObserver, WorkflowObserver},
    provider_client::{
        ContextRole, ContextTurn, ProviderClient, ProviderContext, ProviderError, ProviderFactory,
        ProviderReply, Usage,
    },
};
pub use use_cases::agent_factory::build_proxies;
pub use use_cases::agent_proxy::AgentProxy;
pub use use_cases::conversation_store::{ConversationStore, IntegrityStatus, LoadSummary};
pub use use_cases::run_council::{
    AbortHandle, AgentSummary, CouncilOrchestrator, OrchestratorError, SessionStatus,
};
