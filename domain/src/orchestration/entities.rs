//! Orchestration domain entities: workflow phases and the session state machine.

use serde::{Deserialize, Serialize};

/// One stage of a council round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    /// Every non-harmonizer answers the user prompt
    Broadcast,
    /// Each respondent critiques the other respondents' answers
    Vulnerability,
    /// Harmonizers synthesize the critiques
    Judgment,
    /// Respondents revise their answer against the synthesis
    Reflection,
}

impl WorkflowPhase {
    pub const ALL: [WorkflowPhase; 4] = [
        WorkflowPhase::Broadcast,
        WorkflowPhase::Vulnerability,
        WorkflowPhase::Judgment,
        WorkflowPhase::Reflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Broadcast => "broadcast",
            WorkflowPhase::Vulnerability => "vulnerability",
            WorkflowPhase::Judgment => "judgment",
            WorkflowPhase::Reflection => "reflection",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WorkflowPhase::Broadcast => "Broadcast",
            WorkflowPhase::Vulnerability => "Vulnerability Analysis",
            WorkflowPhase::Judgment => "Judgment",
            WorkflowPhase::Reflection => "Reflection",
        }
    }

    pub fn next(&self) -> Option<WorkflowPhase> {
        match self {
            WorkflowPhase::Broadcast => Some(WorkflowPhase::Vulnerability),
            WorkflowPhase::Vulnerability => Some(WorkflowPhase::Judgment),
            WorkflowPhase::Judgment => Some(WorkflowPhase::Reflection),
            WorkflowPhase::Reflection => None,
        }
    }

    /// Lenient parse used for hand-edited log files.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcast" | "initial" => Some(WorkflowPhase::Broadcast),
            "vulnerability" | "vulnerability_analysis" | "critique" => {
                Some(WorkflowPhase::Vulnerability)
            }
            "judgment" | "judgement" | "synthesis" => Some(WorkflowPhase::Judgment),
            "reflection" | "reflect" => Some(WorkflowPhase::Reflection),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Session state machine
///
/// ```text
/// Idle -> Broadcasting -> AwaitingBroadcastResponses
///      -> VulnerabilityAnalysis -> AwaitingVulnerabilityResponses
///      -> Judgment -> AwaitingJudgmentResponse
///      -> Reflection -> AwaitingReflectionResponses -> Complete
/// ```
///
/// `Aborted` is reachable from every issuing and awaiting state. A new round
/// starts from `Idle`, `Complete` or `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Broadcasting,
    AwaitingBroadcastResponses,
    VulnerabilityAnalysis,
    AwaitingVulnerabilityResponses,
    Judgment,
    AwaitingJudgmentResponse,
    Reflection,
    AwaitingReflectionResponses,
    Complete,
    Aborted,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Broadcasting => "broadcasting",
            SessionState::AwaitingBroadcastResponses => "awaiting_broadcast_responses",
            SessionState::VulnerabilityAnalysis => "vulnerability_analysis",
            SessionState::AwaitingVulnerabilityResponses => "awaiting_vulnerability_responses",
            SessionState::Judgment => "judgment",
            SessionState::AwaitingJudgmentResponse => "awaiting_judgment_response",
            SessionState::Reflection => "reflection",
            SessionState::AwaitingReflectionResponses => "awaiting_reflection_responses",
            SessionState::Complete => "complete",
            SessionState::Aborted => "aborted",
        }
    }

    /// State entered while the requests of `phase` are being issued.
    pub fn issuing(phase: WorkflowPhase) -> Self {
        match phase {
            WorkflowPhase::Broadcast => SessionState::Broadcasting,
            WorkflowPhase::Vulnerability => SessionState::VulnerabilityAnalysis,
            WorkflowPhase::Judgment => SessionState::Judgment,
            WorkflowPhase::Reflection => SessionState::Reflection,
        }
    }

    /// State held until the barrier of `phase` settles.
    pub fn awaiting(phase: WorkflowPhase) -> Self {
        match phase {
            WorkflowPhase::Broadcast => SessionState::AwaitingBroadcastResponses,
            WorkflowPhase::Vulnerability => SessionState::AwaitingVulnerabilityResponses,
            WorkflowPhase::Judgment => SessionState::AwaitingJudgmentResponse,
            WorkflowPhase::Reflection => SessionState::AwaitingReflectionResponses,
        }
    }

    /// Phase this state belongs to, if any.
    pub fn phase(&self) -> Option<WorkflowPhase> {
        match self {
            SessionState::Broadcasting | SessionState::AwaitingBroadcastResponses => {
                Some(WorkflowPhase::Broadcast)
            }
            SessionState::VulnerabilityAnalysis | SessionState::AwaitingVulnerabilityResponses => {
                Some(WorkflowPhase::Vulnerability)
            }
            SessionState::Judgment | SessionState::AwaitingJudgmentResponse => {
                Some(WorkflowPhase::Judgment)
            }
            SessionState::Reflection | SessionState::AwaitingReflectionResponses => {
                Some(WorkflowPhase::Reflection)
            }
            SessionState::Idle | SessionState::Complete | SessionState::Aborted => None,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.phase().is_some_and(|p| *self == SessionState::awaiting(p))
    }

    pub fn is_issuing(&self) -> bool {
        self.phase().is_some_and(|p| *self == SessionState::issuing(p))
    }

    /// No round is in progress; a broadcast, reset or roster reload may start.
    pub fn is_resting(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Complete | SessionState::Aborted
        )
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        if next == SessionState::Aborted {
            return self.is_awaiting() || self.is_issuing();
        }
        if next == SessionState::Idle {
            return self.is_resting();
        }
        if next == SessionState::Broadcasting {
            return self.is_resting();
        }
        match (self.phase(), next.phase()) {
            (Some(current), Some(target)) if self.is_issuing() => {
                current == target && next == SessionState::awaiting(target)
            }
            (Some(current), Some(target)) if self.is_awaiting() => {
                current.next() == Some(target) && next == SessionState::issuing(target)
            }
            (Some(WorkflowPhase::Reflection), None) => {
                *self == SessionState::AwaitingReflectionResponses
                    && next == SessionState::Complete
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().replace('_', " "))
    }
}
