//! SHA-256 hash chain over persisted log records.
//!
//! Each sealed record stores the hash of its predecessor (`prev_hash`) and its
//! own `hash = sha256(prev_hash || canonical record json)`. The first record
//! links to a per-agent genesis hash. Verification never blocks loading: a
//! broken chain is reported, new records keep chaining onto whatever is on
//! disk, and only an explicit rebuild seals the whole file again.

use crate::agent::entities::AgentName;
use crate::session::record::PersistedRecord;
use sha2::{Digest, Sha256};

/// Problem found while walking the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// Record carries no hash at all (written by hand or by an older build).
    Unsealed { index: usize },
    /// `prev_hash` does not match the preceding record.
    BrokenLink { index: usize },
    /// The record content does not match its own hash.
    HashMismatch { index: usize },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::Unsealed { index } => write!(f, "record {} is unsealed", index),
            IntegrityIssue::BrokenLink { index } => {
                write!(f, "record {} does not link to its predecessor", index)
            }
            IntegrityIssue::HashMismatch { index } => {
                write!(f, "record {} was modified after it was written", index)
            }
        }
    }
}

/// Result of verifying one log file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub checked: usize,
    pub issues: Vec<IntegrityIssue>,
    /// Hash the next appended record links to; `None` for an empty log.
    pub tip: Option<String>,
}

impl IntegrityReport {
    pub fn is_intact(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn genesis_hash(owner: &AgentName) -> String {
    format!(
        "{:x}",
        Sha256::digest(format!("agent-council:genesis:{}", owner).as_bytes())
    )
}

/// Hash of `record` chained onto `prev`.
pub fn record_hash(prev: &str, record: &PersistedRecord) -> String {
    let canonical = serde_json::to_vec(&record.unsealed()).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(prev.as_bytes());
    hasher.update(&canonical);
    format!("{:x}", hasher.finalize())
}

/// Seal `records` in place, continuing from `tip` (or the genesis hash).
/// Returns the new chain tip.
pub fn seal(owner: &AgentName, tip: Option<&str>, records: &mut [PersistedRecord]) -> String {
    let mut prev = tip.map(str::to_string).unwrap_or_else(|| genesis_hash(owner));
    for record in records.iter_mut() {
        let hash = record_hash(&prev, record);
        record.prev_hash = Some(prev);
        record.hash = Some(hash.clone());
        prev = hash;
    }
    prev
}

/// Walk the chain of `records` as loaded from disk.
pub fn verify(owner: &AgentName, records: &[PersistedRecord]) -> IntegrityReport {
    let mut report = IntegrityReport {
        checked: records.len(),
        ..IntegrityReport::default()
    };
    let mut expected_prev = genesis_hash(owner);
    for (index, record) in records.iter().enumerate() {
        let (Some(prev), Some(hash)) = (&record.prev_hash, &record.hash) else {
            report.issues.push(IntegrityIssue::Unsealed { index });
            expected_prev = record_hash(&expected_prev, record);
            continue;
        };
        if *prev != expected_prev {
            report.issues.push(IntegrityIssue::BrokenLink { index });
        }
        if record_hash(prev, record) != *hash {
            report.issues.push(IntegrityIssue::HashMismatch { index });
        }
        expected_prev = hash.clone();
    }
    if !records.is_empty() {
        report.tip = Some(expected_prev);
    }
    report
}
