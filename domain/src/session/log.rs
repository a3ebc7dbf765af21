//! Per-agent append-only conversation log.

use crate::agent::entities::AgentName;
use crate::orchestration::entities::WorkflowPhase;
use crate::session::entities::{
    FailureKind, FailureRecord, LogEntry, Message, MessageDraft, Role, TurnId,
};
use chrono::{DateTime, Utc};

/// Ordered, append-only history owned by exactly one agent (Entity)
///
/// Invariant: `turn_id` is strictly increasing across all entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationLog {
    owner: AgentName,
    entries: Vec<LogEntry>,
}

impl ConversationLog {
    pub fn new(owner: AgentName) -> Self {
        Self {
            owner,
            entries: Vec::new(),
        }
    }

    /// Build from entries already known to be ordered (output of repair).
    pub(crate) fn from_ordered(owner: AgentName, entries: Vec<LogEntry>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].turn_id() < w[1].turn_id()));
        Self { owner, entries }
    }

    pub fn owner(&self) -> &AgentName {
        &self.owner
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(LogEntry::as_message)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Failure(f) => Some(f),
            LogEntry::Message(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_turn_id(&self) -> Option<TurnId> {
        self.entries.last().map(LogEntry::turn_id)
    }

    pub fn next_turn_id(&self) -> TurnId {
        self.last_turn_id()
            .map(|t| t.next())
            .unwrap_or(TurnId::FIRST)
    }

    /// Append a draft, filling a missing or stale `turn_id` and a missing
    /// `created_at`. Returns the stored message.
    pub fn append(&mut self, draft: MessageDraft) -> Message {
        let next = self.next_turn_id();
        let turn_id = match draft.turn_id {
            Some(id) if id >= next => id,
            _ => next,
        };
        let created_at = draft.created_at.unwrap_or_else(Utc::now);
        let message = Message::from_parts(draft, created_at, turn_id);
        self.entries.push(LogEntry::Message(message.clone()));
        message
    }

    /// Append a failure record for a call that did not produce a message.
    pub fn record_failure(
        &mut self,
        kind: FailureKind,
        detail: impl Into<String>,
        phase: Option<WorkflowPhase>,
        round: Option<u32>,
    ) -> FailureRecord {
        let record = FailureRecord {
            kind,
            detail: detail.into(),
            created_at: Utc::now(),
            turn_id: self.next_turn_id(),
            phase,
            round,
        };
        self.entries.push(LogEntry::Failure(record.clone()));
        record
    }

    /// Most recent agent-authored message.
    pub fn latest_reply(&self) -> Option<&Message> {
        self.messages().filter(|m| m.role() == Role::Agent).last()
    }

    /// Most recent agent-authored message tagged with `phase` in `round`.
    pub fn reply_for(&self, phase: WorkflowPhase, round: u32) -> Option<&Message> {
        self.messages()
            .filter(|m| {
                m.role() == Role::Agent && m.phase() == Some(phase) && m.round() == Some(round)
            })
            .last()
    }

    /// The last `window` messages, or every message when `window` is 0.
    pub fn recent_messages(&self, window: usize) -> Vec<&Message> {
        let messages: Vec<&Message> = self.messages().collect();
        if window == 0 || messages.len() <= window {
            return messages;
        }
        messages[messages.len() - window..].to_vec()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(LogEntry::created_at)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
