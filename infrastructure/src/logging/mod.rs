//! Conversation log storage.
//!
//! Provides [`JsonlLogStore`], a one-file-per-agent JSONL store that
//! implements the [`LogPersistence`](council_application::LogPersistence)
//! port.

mod jsonl_store;

pub use jsonl_store::JsonlLogStore;
