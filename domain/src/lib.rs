//! Domain layer for agent-council
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Council
//!
//! A roster of independent agents answers a question, critiques each other
//! and revises its answers against a harmonizer's synthesis:
//!
//! - **Broadcast**: every non-harmonizer answers the user prompt
//! - **Vulnerability analysis**: each respondent critiques the *other* answers
//! - **Judgment**: harmonizers organize the critiques into a synthesis
//! - **Reflection**: respondents revise their answer against the synthesis
//!
//! ## Conversation logs
//!
//! Each agent owns an append-only log with strictly increasing turn ids.
//! Persisted logs may be hand-edited; loading repairs them.

pub mod agent;
pub mod config;
pub mod core;
pub mod orchestration;
pub mod prompt;
pub mod session;

// Re-export commonly used types
pub use agent::{
    entities::{AgentName, AgentSpec, GenerationParams},
    roster::Roster,
    validation::{ConfigIssue, ConfigIssueCode, Severity},
};
pub use config::OutputFormat;
pub use core::{
    error::DomainError,
    model::{Model, ProviderKind},
    question::Question,
    string::preview,
};
pub use orchestration::{
    entities::{SessionState, WorkflowPhase},
    policy::{SelectionError, Synthesis, SynthesisPolicy},
    state::WorkflowState,
    value_objects::{AgentOutcome, CallFailure, CohortResponse, Exclusion},
};
pub use prompt::PromptTemplate;
pub use session::{
    entities::{FailureKind, FailureRecord, LogEntry, Message, MessageDraft, Role, TurnId},
    integrity::{IntegrityIssue, IntegrityReport},
    log::ConversationLog,
    merge::{TimelineEntry, merge},
    record::PersistedRecord,
    repair::{RepairReport, repair},
};
