//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod log_persistence;
pub mod progress;
pub mod provider_client;
