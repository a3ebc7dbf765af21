//! Presentation layer for agent-council
//!
//! This crate contains CLI definitions, output formatters,
//! progress reporters, and interactive chat interface.

pub mod chat;
pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use chat::{ChatRepl, ReplCommand, with_interrupt};
pub use cli::commands::{Cli, OutputFormatArg};
pub use output::console::ConsoleFormatter;
pub use output::formatter::OutputFormatter;
pub use output::report::{AgentEntry, EntryResult, PhaseReport, RoundReport};
pub use progress::reporter::{ProgressReporter, SimpleProgress};
