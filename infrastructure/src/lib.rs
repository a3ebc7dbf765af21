//! Infrastructure layer for agent-council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: configuration file loading, JSONL
//! conversation logs and HTTP provider clients.

pub mod config;
pub mod logging;
pub mod providers;

// Re-export commonly used types
pub use config::{
    ConfigLoader, FileAgentConfig, FileConfig, FileDisplayConfig, FileSessionConfig,
};
pub use logging::JsonlLogStore;
pub use providers::{
    AnthropicClient, EchoClient, GeminiClient, HttpProviderFactory, OpenAiCompatClient,
};
