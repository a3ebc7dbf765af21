//! Conversation logs.
//!
//! - [`entities::Message`]: one immutable record in an agent's log
//! - [`log::ConversationLog`]: one agent's append-only history
//! - [`record::PersistedRecord`]: the lenient on-disk line format
//! - [`repair::repair`]: turns loaded records back into a valid log
//! - [`merge::merge`]: chronological view across agents
//! - [`integrity`]: hash chain over persisted records

pub mod entities;
pub mod integrity;
pub mod log;
pub mod merge;
pub mod record;
pub mod repair;
