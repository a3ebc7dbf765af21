//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for round reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    /// Every phase, agent by agent
    Full,
    /// Only the syntheses and revised answers
    Synthesis,
    /// JSON output
    Json,
}

impl From<OutputFormatArg> for council_domain::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Full => council_domain::OutputFormat::Full,
            OutputFormatArg::Synthesis => council_domain::OutputFormat::Synthesis,
            OutputFormatArg::Json => council_domain::OutputFormat::Json,
        }
    }
}

/// CLI arguments for agent-council
#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(author, version, about = "Agent Council - LLM agents critique each other before answering")]
#[command(long_about = r#"
Agent Council sends one prompt to several LLM agents and runs a four-phase round:

1. Broadcast: every agent answers the prompt independently
2. Vulnerability analysis: each agent critiques the other answers
3. Judgment: harmonizer agents synthesize the critiques
4. Reflection: every agent revises its answer against the synthesis

Each agent keeps its own conversation log (<working_dir>/<agent>.jsonl) and
sees its own history in later rounds.

Configuration files are loaded from (in priority order):
1. COUNCIL_* environment variables
2. --config <path>     Explicit config file
3. ./council.toml      Project-level config
4. ~/.config/agent-council/config.toml   Global config

Example:
  council "Is the Collatz conjecture proven?"
  council --output full "Compare Raft and Paxos"
  council --chat
"#)]
pub struct Cli {
    /// The prompt to put to the council (not required in chat mode)
    pub prompt: Option<String>,

    /// Start interactive chat mode
    #[arg(short, long)]
    pub chat: bool,

    /// Output format (defaults to the configured one)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormatArg>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Directory holding the agents' conversation logs
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Per-phase deadline in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Answer locally with echo agents instead of calling providers
    #[arg(long)]
    pub offline: bool,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
