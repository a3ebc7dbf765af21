//! How harmonizer syntheses reach the reflection phase.

use crate::agent::entities::AgentName;
use crate::core::error::DomainError;
use crate::orchestration::value_objects::CohortResponse;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which synthesis (or syntheses) the reflection prompt carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisPolicy {
    /// Every successful synthesis, each attributed to its harmonizer
    #[default]
    Independent,
    /// Only the first harmonizer in roster order that answered
    First,
    /// The one chosen with `select_synthesis`
    Manual,
}

impl SynthesisPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisPolicy::Independent => "independent",
            SynthesisPolicy::First => "first",
            SynthesisPolicy::Manual => "manual",
        }
    }

    /// Pick the syntheses for reflection from the judgment cohort.
    ///
    /// `roster_order` lists harmonizers in configuration order; `chosen` is
    /// the manual selection, if any.
    pub fn select(
        &self,
        judgment: &CohortResponse,
        roster_order: &[AgentName],
        chosen: Option<&AgentName>,
    ) -> Result<Vec<Synthesis>, SelectionError> {
        let ordered: Vec<Synthesis> = roster_order
            .iter()
            .filter_map(|name| {
                judgment.get(name).and_then(|o| o.message()).map(|m| Synthesis {
                    harmonizer: name.clone(),
                    content: m.content().to_string(),
                })
            })
            .collect();

        if ordered.is_empty() {
            return Err(SelectionError::NoSynthesis);
        }

        match self {
            SynthesisPolicy::Independent => Ok(ordered),
            SynthesisPolicy::First => Ok(ordered.into_iter().take(1).collect()),
            SynthesisPolicy::Manual => {
                let chosen = chosen.ok_or(SelectionError::SelectionRequired)?;
                ordered
                    .into_iter()
                    .find(|s| &s.harmonizer == chosen)
                    .map(|s| vec![s])
                    .ok_or_else(|| SelectionError::NotAvailable(chosen.clone()))
            }
        }
    }
}

impl std::fmt::Display for SynthesisPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SynthesisPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" | "all" => Ok(SynthesisPolicy::Independent),
            "first" => Ok(SynthesisPolicy::First),
            "manual" => Ok(SynthesisPolicy::Manual),
            other => Err(DomainError::Configuration(format!(
                "unknown synthesis policy '{}' (expected independent, first or manual)",
                other
            ))),
        }
    }
}

/// A harmonizer's synthesis as forwarded to reflection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    pub harmonizer: AgentName,
    pub content: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no harmonizer produced a synthesis")]
    NoSynthesis,

    #[error("a synthesis must be selected before reflection")]
    SelectionRequired,

    #[error("no synthesis from '{0}' is available in this round")]
    NotAvailable(AgentName),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::entities::WorkflowPhase;
    use crate::orchestration::value_objects::{AgentOutcome, CallFailure};
    use crate::session::entities::MessageDraft;
    use crate::session::log::ConversationLog;

    fn name(s: &str) -> AgentName {
        AgentName::new(s).unwrap()
    }

    fn judgment() -> CohortResponse {
        let mut cohort = CohortResponse::new(WorkflowPhase::Judgment);
        for (agent, text) in [("h2", "second view"), ("h1", "first view")] {
            let message =
                ConversationLog::new(name(agent)).append(MessageDraft::agent_reply(agent, text));
            cohort.record(name(agent), AgentOutcome::Responded(message));
        }
        cohort.record(name("h0"), AgentOutcome::Failed(CallFailure::Timeout));
        cohort
    }

    fn order() -> Vec<AgentName> {
        vec![name("h0"), name("h2"), name("h1")]
    }

    #[test]
    fn test_independent_keeps_roster_order() {
        let picked = SynthesisPolicy::Independent
            .select(&judgment(), &order(), None)
            .unwrap();
        let names: Vec<_> = picked.iter().map(|s| s.harmonizer.as_str()).collect();
        assert_eq!(names, vec!["h2", "h1"]);
    }

    #[test]
    fn test_first_skips_failed_harmonizers() {
        let picked = SynthesisPolicy::First.select(&judgment(), &order(), None).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].content, "second view");
    }

    #[test]
    fn test_manual_requires_selection() {
        let policy = SynthesisPolicy::Manual;
        assert_eq!(
            policy.select(&judgment(), &order(), None),
            Err(SelectionError::SelectionRequired)
        );
        assert_eq!(
            policy.select(&judgment(), &order(), Some(&name("h0"))),
            Err(SelectionError::NotAvailable(name("h0")))
        );
        let picked = policy.select(&judgment(), &order(), Some(&name("h1"))).unwrap();
        assert_eq!(picked[0].content, "first view");
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("FIRST".parse::<SynthesisPolicy>().unwrap(), SynthesisPolicy::First);
        assert!("merge".parse::<SynthesisPolicy>().is_err());
    }
}
