//! Interactive chat module
//!
//! Provides a readline-based interactive chat interface for the council.

mod command;
mod repl;

pub use command::ReplCommand;
pub use repl::{ChatRepl, with_interrupt};
