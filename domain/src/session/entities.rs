//! Conversation entities: messages, failure records and log entries.

use crate::orchestration::entities::WorkflowPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::System => "system",
        }
    }

    /// Lenient parse used for hand-edited log files.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Some(Role::User),
            "agent" | "assistant" | "model" => Some(Role::Agent),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

/// Monotonic sequence number within one agent's log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(u64);

impl TurnId {
    pub const FIRST: TurnId = TurnId(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An immutable conversation record (Entity)
///
/// Only constructed by [`ConversationLog`](super::log::ConversationLog), which
/// guarantees `turn_id` is strictly increasing within the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    author: String,
    content: String,
    created_at: DateTime<Utc>,
    turn_id: TurnId,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<WorkflowPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    round: Option<u32>,
    /// Prompt that produced this reply; rebuilds provider context.
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
}

impl Message {
    pub(crate) fn from_parts(
        draft: MessageDraft,
        created_at: DateTime<Utc>,
        turn_id: TurnId,
    ) -> Self {
        Self {
            role: draft.role,
            author: draft.author,
            content: draft.content,
            created_at,
            turn_id,
            phase: draft.phase,
            round: draft.round,
            prompt: draft.prompt,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }

    pub fn phase(&self) -> Option<WorkflowPhase> {
        self.phase
    }

    pub fn round(&self) -> Option<u32> {
        self.round
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }
}

/// A message about to be appended; `turn_id` and `created_at` may be missing
/// and are filled in by the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub role: Role,
    pub author: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub turn_id: Option<TurnId>,
    pub phase: Option<WorkflowPhase>,
    pub round: Option<u32>,
    pub prompt: Option<String>,
}

impl MessageDraft {
    pub fn new(role: Role, author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            author: author.into(),
            content: content.into(),
            created_at: None,
            turn_id: None,
            phase: None,
            round: None,
            prompt: None,
        }
    }

    /// Reply produced by an agent
    pub fn agent_reply(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Agent, author, content)
    }

    pub fn with_phase(mut self, phase: WorkflowPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_turn_id(mut self, turn_id: TurnId) -> Self {
        self.turn_id = Some(turn_id);
        self
    }
}

/// Category of a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    ProviderError,
    MalformedResponse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ProviderError => "provider_error",
            FailureKind::MalformedResponse => "malformed_response",
        }
    }

    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "timeout" => Some(FailureKind::Timeout),
            "provider_error" | "provider" | "error" => Some(FailureKind::ProviderError),
            "malformed_response" | "malformed" => Some(FailureKind::MalformedResponse),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed call recorded in the log. Not a [`Message`]; it shares the
/// turn-id sequence so the log stays totally ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub turn_id: TurnId,
    pub phase: Option<WorkflowPhase>,
    pub round: Option<u32>,
}

/// One entry of a conversation log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Message(Message),
    Failure(FailureRecord),
}

impl LogEntry {
    pub fn turn_id(&self) -> TurnId {
        match self {
            LogEntry::Message(m) => m.turn_id,
            LogEntry::Failure(f) => f.turn_id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            LogEntry::Message(m) => m.created_at,
            LogEntry::Failure(f) => f.created_at,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            LogEntry::Message(m) => Some(m),
            LogEntry::Failure(_) => None,
        }
    }
}
