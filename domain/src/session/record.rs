//! On-disk shape of a conversation log entry.
//!
//! Every field is optional: log files may be hand-edited or cut short, and
//! [`repair`](super::repair::repair) is what turns these records back into a
//! well-formed [`ConversationLog`](super::log::ConversationLog).

use crate::session::entities::{FailureRecord, LogEntry, Message};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Record discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Message,
    Failure,
}

/// A single JSONL line of an agent's log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RecordKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<u64>,
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Failure category (`timeout`, `provider_error`, `malformed_response`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl PersistedRecord {
    /// Read a record out of any JSON value, one field at a time.
    ///
    /// A field of the wrong type (`"turn_id": "2"`, a negative round, a
    /// number where text was expected) is read leniently or treated as
    /// missing, so repair can fill it in and the rest of the line survives.
    /// Returns `None` only when `value` is not a JSON object.
    pub fn from_json(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        Some(Self {
            kind: text(fields, "kind").and_then(|k| match k.trim().to_ascii_lowercase().as_str() {
                "message" => Some(RecordKind::Message),
                "failure" => Some(RecordKind::Failure),
                _ => None,
            }),
            turn_id: number(fields, "turn_id"),
            created_at: text(fields, "created_at").or_else(|| text(fields, "timestamp")),
            role: text(fields, "role"),
            author: text(fields, "author"),
            content: text(fields, "content"),
            phase: text(fields, "phase"),
            round: number(fields, "round").and_then(|r| u32::try_from(r).ok()),
            prompt: text(fields, "prompt"),
            failure: text(fields, "failure"),
            detail: text(fields, "detail"),
            prev_hash: text(fields, "prev_hash"),
            hash: text(fields, "hash"),
        })
    }

    /// Parse one JSONL line. `None` when the line is not a JSON object.
    pub fn from_line(line: &str) -> Option<Self> {
        serde_json::from_str::<Value>(line)
            .ok()
            .as_ref()
            .and_then(Self::from_json)
    }

    /// Whether this line describes a failed call rather than a message.
    pub fn is_failure(&self) -> bool {
        match self.kind {
            Some(RecordKind::Failure) => true,
            Some(RecordKind::Message) => false,
            None => self.failure.is_some() && self.content.is_none(),
        }
    }

    /// Parse `created_at`, accepting RFC 3339 or a naive ISO timestamp
    /// (interpreted as UTC).
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    /// Copy without the integrity fields.
    pub fn unsealed(&self) -> Self {
        Self {
            prev_hash: None,
            hash: None,
            ..self.clone()
        }
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number(fields: &Map<String, Value>, key: &str) -> Option<u64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl From<&Message> for PersistedRecord {
    fn from(message: &Message) -> Self {
        Self {
            kind: Some(RecordKind::Message),
            turn_id: Some(message.turn_id().value()),
            created_at: Some(format_timestamp(message.created_at())),
            role: Some(message.role().as_str().to_string()),
            author: Some(message.author().to_string()),
            content: Some(message.content().to_string()),
            phase: message.phase().map(|p| p.as_str().to_string()),
            round: message.round(),
            prompt: message.prompt().map(str::to_string),
            ..Self::default()
        }
    }
}

impl From<&FailureRecord> for PersistedRecord {
    fn from(failure: &FailureRecord) -> Self {
        Self {
            kind: Some(RecordKind::Failure),
            turn_id: Some(failure.turn_id.value()),
            created_at: Some(format_timestamp(failure.created_at)),
            phase: failure.phase.map(|p| p.as_str().to_string()),
            round: failure.round,
            failure: Some(failure.kind.as_str().to_string()),
            detail: Some(failure.detail.clone()),
            ..Self::default()
        }
    }
}

impl From<&LogEntry> for PersistedRecord {
    fn from(entry: &LogEntry) -> Self {
        match entry {
            LogEntry::Message(m) => m.into(),
            LogEntry::Failure(f) => f.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_timestamp_alias_and_missing_fields() {
        let record: PersistedRecord =
            serde_json::from_str(r#"{"role":"assistant","content":"hi","timestamp":"2024-01-01T00:00:00"}"#)
                .unwrap();
        assert_eq!(record.created_at.as_deref(), Some("2024-01-01T00:00:00"));
        assert!(record.turn_id.is_none());
        assert!(!record.is_failure());
    }

    #[test]
    fn test_failure_detection_without_kind() {
        let record: PersistedRecord =
            serde_json::from_str(r#"{"failure":"timeout","detail":"slow"}"#).unwrap();
        assert!(record.is_failure());
    }

    #[test]
    fn test_wrong_typed_fields_do_not_lose_the_line() {
        let record =
            PersistedRecord::from_line(r#"{"content":"keep me","turn_id":"2","round":"1"}"#)
                .unwrap();
        assert_eq!(record.content.as_deref(), Some("keep me"));
        assert_eq!(record.turn_id, Some(2));
        assert_eq!(record.round, Some(1));

        let record = PersistedRecord::from_line(
            r#"{"content":42,"turn_id":-3,"round":[1],"role":null,"kind":"bogus"}"#,
        )
        .unwrap();
        assert_eq!(record.content.as_deref(), Some("42"));
        assert!(record.turn_id.is_none());
        assert!(record.round.is_none());
        assert!(record.role.is_none());
        assert!(record.kind.is_none());
    }

    #[test]
    fn test_only_non_objects_are_rejected() {
        assert!(PersistedRecord::from_line("not json").is_none());
        assert!(PersistedRecord::from_line("[1,2]").is_none());
        assert!(PersistedRecord::from_line("\"text\"").is_none());
        assert_eq!(PersistedRecord::from_line("{}"), Some(PersistedRecord::default()));
    }

    #[test]
    fn test_lenient_read_matches_strict_read_of_written_records() {
        let line = r#"{"kind":"failure","turn_id":3,"timestamp":"2024-01-01T00:00:00Z","failure":"timeout","round":2,"hash":"ab"}"#;
        let strict: PersistedRecord = serde_json::from_str(line).unwrap();
        assert_eq!(PersistedRecord::from_line(line), Some(strict));
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&PersistedRecord::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
