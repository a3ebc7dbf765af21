//! Roster validation issues.
//!
//! Validation runs before any agent proxy is constructed. Each problem is
//! reported as a [`ConfigIssue`] with a severity, so callers can decide
//! whether a roster is merely unusual or cannot work at all.

use crate::agent::entities::AgentName;

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the roster cannot run a session.
    Error,
    /// Non-fatal: the roster loads but some phase will fail later.
    Warning,
}

/// Identifies a specific roster issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// The roster has no agents at all.
    EmptyRoster,
    /// Two agents share a name.
    DuplicateName { name: AgentName },
    /// Every agent is a harmonizer, so nobody answers the broadcast.
    NoCohort,
    /// No agent is a harmonizer, so the judgment phase cannot run.
    NoHarmonizer,
    /// An agent entry has an empty or unusable name.
    InvalidName { value: String },
    /// An agent entry has no model id.
    EmptyModel { agent: String },
    /// An agent entry names a provider nobody implements.
    UnknownProvider { agent: String, provider: String },
    /// A field holds a value outside its accepted set.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// A numeric setting is out of range.
    OutOfRange { field: String },
}

/// A detected roster issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Check whether any issue is fatal.
pub fn has_errors(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(ConfigIssue::is_error)
}
