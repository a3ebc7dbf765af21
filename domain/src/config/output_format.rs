//! Output format value object

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the report of a council round is rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Every phase, agent by agent
    Full,
    /// Harmonizer syntheses and the revised answers (default)
    #[default]
    Synthesis,
    /// Machine-readable round state
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(OutputFormat::Full),
            "synthesis" | "summary" => Ok(OutputFormat::Synthesis),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}
