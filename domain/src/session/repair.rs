//! Repair of loaded log records.
//!
//! Rules, applied in file order:
//! - a record with neither content nor failure information is dropped
//! - a missing or unparsable timestamp is taken from the preceding record,
//!   else from the next record that has one, else the Unix epoch
//! - a missing, zero or non-increasing `turn_id` becomes `last + 1`
//! - a missing role is inferred from the author, a missing author from the
//!   role (`user`, the log owner, or `system`)
//! - a failure record without a known category becomes `provider_error`
//!
//! Repair is idempotent: feeding the records of a repaired log back through
//! [`repair`] yields the same log and a clean [`RepairReport`].

use crate::agent::entities::AgentName;
use crate::orchestration::entities::WorkflowPhase;
use crate::session::entities::{
    FailureKind, FailureRecord, LogEntry, Message, MessageDraft, Role, TurnId,
};
use crate::session::log::ConversationLog;
use crate::session::record::PersistedRecord;
use chrono::{DateTime, Utc};

/// What repair had to change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub dropped_empty: usize,
    pub turn_ids_assigned: usize,
    pub timestamps_synthesized: usize,
    pub roles_inferred: usize,
    pub authors_inferred: usize,
    pub phases_cleared: usize,
    pub failures_defaulted: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.dropped_empty
            + self.turn_ids_assigned
            + self.timestamps_synthesized
            + self.roles_inferred
            + self.authors_inferred
            + self.phases_cleared
            + self.failures_defaulted
    }
}

impl std::fmt::Display for RepairReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} turn ids, {} timestamps, {} roles, {} authors repaired; {} empty records dropped",
            self.turn_ids_assigned,
            self.timestamps_synthesized,
            self.roles_inferred,
            self.authors_inferred,
            self.dropped_empty
        )
    }
}

/// Rebuild a well-formed log for `owner` from loaded records.
pub fn repair(owner: &AgentName, records: &[PersistedRecord]) -> (ConversationLog, RepairReport) {
    let mut report = RepairReport::default();

    let kept: Vec<&PersistedRecord> = records
        .iter()
        .filter(|r| {
            let keep = if r.is_failure() {
                true
            } else {
                r.content.as_deref().is_some_and(|c| !c.trim().is_empty())
            };
            if !keep {
                report.dropped_empty += 1;
            }
            keep
        })
        .collect();

    let timestamps = resolve_timestamps(&kept, &mut report);

    let mut entries = Vec::with_capacity(kept.len());
    let mut last: Option<TurnId> = None;
    for (record, created_at) in kept.into_iter().zip(timestamps) {
        let turn_id = match (record.turn_id, last) {
            (Some(id), Some(prev)) if id > prev.value() => TurnId::new(id),
            (Some(id), None) if id > 0 => TurnId::new(id),
            _ => {
                report.turn_ids_assigned += 1;
                last.map(|t| t.next()).unwrap_or(TurnId::FIRST)
            }
        };
        last = Some(turn_id);

        let phase = match record.phase.as_deref() {
            None => None,
            Some(raw) => {
                let parsed = WorkflowPhase::parse_lenient(raw);
                if parsed.is_none() {
                    report.phases_cleared += 1;
                }
                parsed
            }
        };

        let entry = if record.is_failure() {
            let kind = match record.failure.as_deref().and_then(FailureKind::parse_lenient) {
                Some(kind) => kind,
                None => {
                    report.failures_defaulted += 1;
                    FailureKind::ProviderError
                }
            };
            LogEntry::Failure(FailureRecord {
                kind,
                detail: record.detail.clone().unwrap_or_default(),
                created_at,
                turn_id,
                phase,
                round: record.round,
            })
        } else {
            LogEntry::Message(repair_message(owner, record, created_at, turn_id, phase, &mut report))
        };
        entries.push(entry);
    }

    (ConversationLog::from_ordered(owner.clone(), entries), report)
}

fn repair_message(
    owner: &AgentName,
    record: &PersistedRecord,
    created_at: DateTime<Utc>,
    turn_id: TurnId,
    phase: Option<WorkflowPhase>,
    report: &mut RepairReport,
) -> Message {
    let author = record
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());

    let role = match record.role.as_deref().and_then(Role::parse_lenient) {
        Some(role) => role,
        None => {
            report.roles_inferred += 1;
            match author {
                Some(a) if a.eq_ignore_ascii_case("user") => Role::User,
                Some(a) if a.eq_ignore_ascii_case("system") => Role::System,
                _ => Role::Agent,
            }
        }
    };

    let author = match author {
        Some(a) => a.to_string(),
        None => {
            report.authors_inferred += 1;
            match role {
                Role::User => "user".to_string(),
                Role::Agent => owner.to_string(),
                Role::System => "system".to_string(),
            }
        }
    };

    let mut draft = MessageDraft::new(role, author, record.content.clone().unwrap_or_default());
    draft.phase = phase;
    draft.round = record.round;
    draft.prompt = record.prompt.clone();
    Message::from_parts(draft, created_at, turn_id)
}

fn resolve_timestamps(records: &[&PersistedRecord], report: &mut RepairReport) -> Vec<DateTime<Utc>> {
    let parsed: Vec<Option<DateTime<Utc>>> =
        records.iter().map(|r| r.parsed_timestamp()).collect();

    let mut resolved = Vec::with_capacity(parsed.len());
    let mut previous: Option<DateTime<Utc>> = None;
    for (i, at) in parsed.iter().enumerate() {
        let at = match at {
            Some(at) => *at,
            None => {
                report.timestamps_synthesized += 1;
                previous
                    .or_else(|| parsed[i + 1..].iter().flatten().next().copied())
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            }
        };
        previous = Some(at);
        resolved.push(at);
    }
    resolved
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::{Map, Value, json};

    fn field(choices: Vec<Value>) -> impl Strategy<Value = Option<Value>> {
        prop::option::of(prop::sample::select(choices))
    }

    /// One log line as a hand editor might leave it: any field may be
    /// missing, mistyped or nonsensical.
    fn arb_line() -> impl Strategy<Value = Value> {
        let turn_id = prop::option::of(prop_oneof![
            (0u64..20).prop_map(Value::from),
            (0u64..20).prop_map(|n| Value::from(n.to_string())),
            prop::sample::select(vec![json!(-4), json!(1.5), json!("x"), json!(null)]),
        ]);
        let created_at = prop::option::of(prop_oneof![
            (0i64..2_000_000_000).prop_map(|s| {
                Value::from(Utc.timestamp_opt(s, 0).unwrap().to_rfc3339())
            }),
            prop::sample::select(vec![
                json!("2024-02-02T10:00:00"),
                json!("2024-02-02 10:00:00.250"),
                json!("yesterday"),
                json!(12345),
            ]),
        ]);
        let content = prop::option::of(prop_oneof![
            "[a-z ]{0,12}".prop_map(Value::from),
            prop::sample::select(vec![json!(42), json!(["a"]), json!(true)]),
        ]);
        let round = prop::option::of(prop_oneof![
            (0u64..5).prop_map(Value::from),
            prop::sample::select(vec![json!("2"), json!(-1), json!({})]),
        ]);
        (
            field(vec![json!("message"), json!("failure"), json!("FAILURE"), json!(7)]),
            turn_id,
            created_at,
            field(vec![json!("user"), json!("assistant"), json!("system"), json!("robot"), json!(3)]),
            field(vec![json!("user"), json!(" "), json!("alpha"), json!("bob"), json!(false)]),
            content,
            field(vec![json!("broadcast"), json!("critique"), json!("sideways"), json!(1)]),
            round,
            field(vec![json!("timeout"), json!("bogus"), json!(true)]),
        )
            .prop_map(|(kind, turn_id, created_at, role, author, content, phase, round, failure)| {
                let mut object = Map::new();
                let named = [
                    ("kind", kind),
                    ("turn_id", turn_id),
                    ("created_at", created_at),
                    ("role", role),
                    ("author", author),
                    ("content", content),
                    ("phase", phase),
                    ("round", round),
                    ("failure", failure),
                ];
                for (key, value) in named {
                    if let Some(value) = value {
                        object.insert(key.to_string(), value);
                    }
                }
                Value::Object(object)
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Repairing the written-back result of a repair changes nothing.
        #[test]
        fn prop_repair_is_idempotent(lines in prop::collection::vec(arb_line(), 0..12)) {
            let owner = AgentName::new("alpha").unwrap();
            let records: Vec<PersistedRecord> = lines
                .iter()
                .map(|line| PersistedRecord::from_json(line).unwrap())
                .collect();

            let (first, _) = repair(&owner, &records);
            let written: Vec<PersistedRecord> =
                first.entries().iter().map(PersistedRecord::from).collect();
            let (second, report) = repair(&owner, &written);

            prop_assert!(report.is_clean(), "{:?}", report);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.entries().windows(2).all(|w| w[0].turn_id() < w[1].turn_id()));
        }

        /// A line is only ever dropped for having no content; every failure
        /// and every non-blank message survives, in order.
        #[test]
        fn prop_repair_keeps_every_line_with_content(lines in prop::collection::vec(arb_line(), 0..12)) {
            let owner = AgentName::new("alpha").unwrap();
            let records: Vec<PersistedRecord> = lines
                .iter()
                .map(|line| PersistedRecord::from_json(line).unwrap())
                .collect();
            let expected: Vec<Option<String>> = records
                .iter()
                .filter(|r| r.is_failure() || r.content.as_deref().is_some_and(|c| !c.trim().is_empty()))
                .map(|r| if r.is_failure() { None } else { r.content.clone() })
                .collect();

            let (log, report) = repair(&owner, &records);

            let kept: Vec<Option<String>> = log
                .entries()
                .iter()
                .map(|e| e.as_message().map(|m| m.content().to_string()))
                .collect();
            prop_assert_eq!(kept, expected);
            prop_assert_eq!(report.dropped_empty, records.len() - log.len());
        }
    }
}
