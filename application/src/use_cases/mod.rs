//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod agent_factory;
pub mod agent_proxy;
pub mod conversation_store;
pub mod dispatch;
pub mod run_council;

#[cfg(test)]
pub(crate) mod test_support;
