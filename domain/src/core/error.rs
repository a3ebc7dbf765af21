//! Domain error types

use crate::orchestration::entities::SessionState;
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Roster or session configuration cannot work (duplicate names, no
    /// harmonizer, unknown provider, ...). Fatal before any call is made.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Invalid agent name: {0}")]
    InvalidAgentName(String),

    #[error("Cannot {requested} while the session is {from}")]
    InvalidTransition {
        from: SessionState,
        requested: &'static str,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }

    /// Check if this error is a configuration problem
    pub fn is_configuration(&self) -> bool {
        matches!(self, DomainError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_display() {
        let error = DomainError::InvalidTransition {
            from: SessionState::Idle,
            requested: "request judgment",
        };
        assert_eq!(
            error.to_string(),
            "Cannot request judgment while the session is idle"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(DomainError::Configuration("x".into()).is_configuration());
        assert!(!DomainError::InvalidPrompt("x".into()).is_configuration());
    }
}
