//! Chronological view across several agents' logs.

use crate::agent::entities::AgentName;
use crate::session::entities::Message;
use crate::session::log::ConversationLog;

/// One message of the merged timeline, tagged with the log it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub agent: AgentName,
    pub message: Message,
}

/// Merge messages from `logs` ordered by `(created_at, turn_id, agent)`.
///
/// Failure records are not part of the timeline. The result is a copy; the
/// logs themselves are not touched.
pub fn merge<'a>(logs: impl IntoIterator<Item = &'a ConversationLog>) -> Vec<TimelineEntry> {
    let mut timeline: Vec<TimelineEntry> = logs
        .into_iter()
        .flat_map(|log| {
            log.messages().map(|m| TimelineEntry {
                agent: log.owner().clone(),
                message: m.clone(),
            })
        })
        .collect();

    timeline.sort_by(|a, b| {
        a.message
            .created_at()
            .cmp(&b.message.created_at())
            .then_with(|| a.message.turn_id().cmp(&b.message.turn_id()))
            .then_with(|| a.agent.cmp(&b.agent))
    });
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::entities::{MessageDraft, TurnId};
    use chrono::{TimeZone, Utc};

    fn log(name: &str, items: &[(i64, u64)]) -> ConversationLog {
        let mut log = ConversationLog::new(AgentName::new(name).unwrap());
        for (secs, turn) in items {
            log.append(
                MessageDraft::agent_reply(name, format!("{name}-{turn}"))
                    .with_created_at(Utc.timestamp_opt(*secs, 0).unwrap())
                    .with_turn_id(TurnId::new(*turn)),
            );
        }
        log
    }

    #[test]
    fn test_merge_orders_by_time_turn_and_name() {
        let a = log("a", &[(10, 1), (30, 2)]);
        let b = log("b", &[(10, 1), (20, 2)]);
        let c = log("c", &[(10, 1), (10, 2)]);

        let merged = merge([&c, &b, &a]);
        let labels: Vec<&str> = merged.iter().map(|e| e.message.content()).collect();
        assert_eq!(labels, vec!["a-1", "b-1", "c-1", "c-2", "b-2", "a-2"]);
    }

    #[test]
    fn test_merge_is_sorted_for_any_subset() {
        let a = log("a", &[(5, 1), (7, 2), (9, 3)]);
        let b = log("b", &[(6, 1), (7, 2)]);
        for subset in [vec![&a], vec![&b], vec![&a, &b], vec![&b, &a]] {
            let merged = merge(subset);
            assert!(merged.windows(2).all(|w| {
                let key = |e: &TimelineEntry| {
                    (e.message.created_at(), e.message.turn_id(), e.agent.clone())
                };
                key(&w[0]) <= key(&w[1])
            }));
        }
    }

    #[test]
    fn test_failures_are_not_merged() {
        let mut a = log("a", &[(1, 1)]);
        a.record_failure(crate::session::entities::FailureKind::Timeout, "t", None, None);
        assert_eq!(merge([&a]).len(), 1);
    }
}
