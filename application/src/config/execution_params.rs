//! Execution parameters: orchestrator and proxy control.
//!
//! [`ExecutionParams`] groups the static parameters that control a council
//! session: phase deadline, retry policy, context window and how syntheses
//! reach the reflection phase. These are application-layer concerns, not
//! domain policy.

use council_domain::SynthesisPolicy;
use std::time::Duration;

/// Retry policy for provider calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Session control parameters.
#[derive(Debug, Clone)]
pub struct ExecutionParams {
    /// Upper bound on one phase, measured from fan-out.
    pub phase_timeout: Duration,
    pub retry: RetryPolicy,
    /// Number of prior exchanges sent as context; 0 sends the full log.
    pub context_window: usize,
    pub synthesis_policy: SynthesisPolicy,
    /// Session instruction text, sent as system preamble.
    pub instructions: String,
    /// Display name of the human participant.
    pub user: String,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            phase_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            context_window: 20,
            synthesis_policy: SynthesisPolicy::default(),
            instructions: String::new(),
            user: "user".to_string(),
        }
    }
}

impl ExecutionParams {
    // ==================== Builder Methods ====================

    pub fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    pub fn with_synthesis_policy(mut self, policy: SynthesisPolicy) -> Self {
        self.synthesis_policy = policy;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}
