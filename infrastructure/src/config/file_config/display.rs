//! How results reach the terminal (`[display]` section)

use council_domain::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw `[display]` table
///
/// ```toml
/// [display]
/// format = "synthesis"     # full | synthesis | json
/// color = false            # NO_COLOR in the environment also turns it off
/// show_progress = true
/// history_file = "~/.council_history"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDisplayConfig {
    pub format: Option<OutputFormat>,
    pub color: bool,
    /// Per-agent spinners while a phase runs
    pub show_progress: bool,
    pub history_file: Option<String>,
}

impl Default for FileDisplayConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
            show_progress: true,
            history_file: None,
        }
    }
}

impl FileDisplayConfig {
    /// Colored output unless disabled here or through `NO_COLOR`.
    pub fn use_color(&self) -> bool {
        self.color_with(std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()))
    }

    fn color_with(&self, no_color: bool) -> bool {
        self.color && !no_color
    }

    /// The `--output` flag wins over the configured format.
    pub fn resolve_format(&self, flag: Option<OutputFormat>) -> OutputFormat {
        flag.or(self.format).unwrap_or_default()
    }

    pub fn progress_enabled(&self, quiet: bool) -> bool {
        self.show_progress && !quiet
    }

    /// Line-editor history location, `~` expanded. Falls back to the
    /// platform data directory.
    pub fn history_path(&self) -> Option<PathBuf> {
        match self.history_file.as_deref().map(str::trim) {
            Some("") => None,
            Some(path) => match path.strip_prefix("~/") {
                Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
                None => Some(PathBuf::from(path)),
            },
            None => dirs::data_dir().map(|d| d.join("agent-council").join("history.txt")),
        }
    }
}
