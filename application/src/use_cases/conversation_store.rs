//! Conversation store use case
//!
//! Owns every agent's in-memory [`ConversationLog`] and keeps the persisted
//! copy in sync. The in-memory log is authoritative during a session: a
//! failed write is queued and retried on the next append or flush, and is
//! reported as a warning rather than an error.
//!
//! A broken integrity chain found at load is kept on record. New records keep
//! chaining onto the file as it is; a rewrite forced by repair seals over the
//! old chain but the issues it found stay listed until [`ConversationStore::rebuild`].

use crate::ports::log_persistence::{LogPersistence, PersistenceError};
use council_domain::session::integrity;
use council_domain::{
    AgentName, CallFailure, ConversationLog, FailureRecord, IntegrityIssue, IntegrityReport, Message,
    MessageDraft, PersistedRecord, RepairReport, TimelineEntry, WorkflowPhase, merge, repair,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// What loading one agent's log found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub messages: usize,
    pub repair: RepairReport,
    pub integrity: IntegrityReport,
    pub undecodable_lines: usize,
    pub found: bool,
}

impl LoadSummary {
    /// The loaded log differs from what is on disk and will be rewritten.
    pub fn needs_rewrite(&self) -> bool {
        !self.repair.is_clean() || self.undecodable_lines > 0
    }
}

/// Integrity of one agent's log as it stands now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityStatus {
    pub agent: AgentName,
    /// Fresh walk over the persisted records.
    pub on_disk: IntegrityReport,
    /// Issues found at load that a repair rewrite has sealed over since.
    pub resealed: Vec<IntegrityIssue>,
}

impl IntegrityStatus {
    pub fn is_intact(&self) -> bool {
        self.on_disk.is_intact() && self.resealed.is_empty()
    }
}

/// Result of appending to a log
#[derive(Debug, Clone)]
pub struct AppendOutcome<T> {
    pub value: T,
    /// Set when the write failed; the record stays queued.
    pub warning: Option<PersistenceError>,
}

struct LogSlot {
    log: ConversationLog,
    /// Entries appended in memory but not yet written.
    pending: Vec<PersistedRecord>,
    /// The whole file must be rewritten (repair, failed append, import).
    dirty: bool,
    /// Hash of the last record written to disk.
    tip: Option<String>,
    /// Chain issues found at load, kept until an explicit rebuild.
    integrity: IntegrityReport,
    /// A rewrite sealed over `integrity.issues`.
    resealed: bool,
}

impl LogSlot {
    fn empty(agent: &AgentName) -> Self {
        Self {
            log: ConversationLog::new(agent.clone()),
            pending: Vec::new(),
            dirty: false,
            tip: None,
            integrity: IntegrityReport::default(),
            resealed: false,
        }
    }
}

/// Per-agent conversation logs backed by a [`LogPersistence`]
pub struct ConversationStore {
    persistence: Arc<dyn LogPersistence>,
    slots: RwLock<HashMap<AgentName, Arc<Mutex<LogSlot>>>>,
}

impl ConversationStore {
    pub fn new(persistence: Arc<dyn LogPersistence>) -> Self {
        Self {
            persistence,
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, agent: &AgentName) -> Arc<Mutex<LogSlot>> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(agent)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            slots
                .entry(agent.clone())
                .or_insert_with(|| Arc::new(Mutex::new(LogSlot::empty(agent)))),
        )
    }

    /// Load and repair the persisted log of `agent`, replacing whatever is
    /// in memory.
    pub fn load(&self, agent: &AgentName) -> Result<LoadSummary, PersistenceError> {
        let loaded = self.persistence.load(agent)?;
        let summary = self.adopt(agent, loaded.records, loaded.undecodable_lines, loaded.found, false);
        Ok(summary)
    }

    /// Adopt the log of `agent` found in `source` as its history. Returns
    /// `None` when `source` holds no log for the agent.
    pub fn import_from(
        &self,
        source: &Path,
        agent: &AgentName,
    ) -> Result<Option<LoadSummary>, PersistenceError> {
        let loaded = self.persistence.load_external(source, agent)?;
        if !loaded.found {
            return Ok(None);
        }
        let summary = self.adopt(agent, loaded.records, loaded.undecodable_lines, true, true);
        if let Some(error) = self.flush(agent) {
            warn!("Imported history for {} not yet persisted: {}", agent, error);
        }
        Ok(Some(summary))
    }

    fn adopt(
        &self,
        agent: &AgentName,
        records: Vec<PersistedRecord>,
        undecodable_lines: usize,
        found: bool,
        force_rewrite: bool,
    ) -> LoadSummary {
        // Imported files never belonged to this agent's chain.
        let integrity = if force_rewrite {
            IntegrityReport::default()
        } else {
            integrity::verify(agent, &records)
        };
        let (log, repair) = repair(agent, &records);

        let summary = LoadSummary {
            messages: log.messages().count(),
            repair,
            integrity: integrity.clone(),
            undecodable_lines,
            found,
        };

        if !summary.repair.is_clean() {
            info!("Repaired log of {}: {}", agent, summary.repair);
        }
        for issue in &integrity.issues {
            warn!("Integrity check for {}: {}", agent, issue);
        }
        if undecodable_lines > 0 {
            warn!("Skipped {} undecodable lines in log of {}", undecodable_lines, agent);
        }

        let dirty = force_rewrite || summary.needs_rewrite();
        let tip = if dirty { None } else { integrity.tip.clone() };

        let slot = self.slot(agent);
        let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = LogSlot {
            log,
            pending: Vec::new(),
            dirty,
            tip,
            integrity,
            resealed: false,
        };
        summary
    }

    /// Append a message draft. Missing `turn_id` or `created_at` are filled
    /// in before the record is persisted.
    pub fn append(&self, agent: &AgentName, draft: MessageDraft) -> AppendOutcome<Message> {
        let slot = self.slot(agent);
        let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        let message = slot.log.append(draft);
        slot.pending.push(PersistedRecord::from(&message));
        let warning = self.flush_slot(agent, &mut slot);
        AppendOutcome {
            value: message,
            warning,
        }
    }

    /// Record a failed call. `Busy` failures never reach the log.
    pub fn record_failure(
        &self,
        agent: &AgentName,
        failure: &CallFailure,
        phase: WorkflowPhase,
        round: u32,
    ) -> Option<AppendOutcome<FailureRecord>> {
        let kind = failure.failure_kind()?;
        let slot = self.slot(agent);
        let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        let record = slot
            .log
            .record_failure(kind, failure.detail(), Some(phase), Some(round));
        slot.pending.push(PersistedRecord::from(&record));
        let warning = self.flush_slot(agent, &mut slot);
        Some(AppendOutcome {
            value: record,
            warning,
        })
    }

    /// Write anything still queued for `agent`.
    pub fn flush(&self, agent: &AgentName) -> Option<PersistenceError> {
        let slot = self.slot(agent);
        let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        self.flush_slot(agent, &mut slot)
    }

    /// Flush every known log; returns the agents whose write failed.
    pub fn flush_all(&self) -> Vec<(AgentName, PersistenceError)> {
        self.agents()
            .into_iter()
            .filter_map(|agent| self.flush(&agent).map(|e| (agent, e)))
            .collect()
    }

    fn flush_slot(&self, agent: &AgentName, slot: &mut LogSlot) -> Option<PersistenceError> {
        if slot.dirty {
            return match self.rewrite_sealed(agent, slot) {
                Ok(written) => {
                    debug!("Rewrote log of {} ({} records)", agent, written);
                    if !slot.integrity.is_intact() && !slot.resealed {
                        warn!(
                            "Rewrite of {} sealed over {} integrity issues found at load",
                            agent,
                            slot.integrity.issues.len()
                        );
                        slot.resealed = true;
                    }
                    None
                }
                Err(e) => {
                    warn!("Failed to rewrite log of {}: {}", agent, e);
                    Some(e)
                }
            };
        }

        if slot.pending.is_empty() {
            return None;
        }

        let mut records = slot.pending.clone();
        let tip = integrity::seal(agent, slot.tip.as_deref(), &mut records);
        match self.persistence.append(agent, &records) {
            Ok(()) => {
                slot.pending.clear();
                slot.integrity.checked += records.len();
                slot.integrity.tip = Some(tip.clone());
                slot.tip = Some(tip);
                None
            }
            Err(e) => {
                // A partial append may have reached the file; rewrite it whole
                // on the next attempt.
                warn!("Failed to persist log of {}: {}", agent, e);
                slot.dirty = true;
                Some(e)
            }
        }
    }

    /// Seal the whole in-memory log from genesis and replace the file.
    fn rewrite_sealed(&self, agent: &AgentName, slot: &mut LogSlot) -> Result<usize, PersistenceError> {
        let mut records: Vec<PersistedRecord> =
            slot.log.entries().iter().map(PersistedRecord::from).collect();
        let tip = integrity::seal(agent, None, &mut records);
        self.persistence.rewrite(agent, &records)?;
        slot.dirty = false;
        slot.pending.clear();
        slot.integrity.checked = records.len();
        slot.integrity.tip = Some(tip.clone());
        slot.tip = Some(tip);
        Ok(records.len())
    }

    /// Walk the persisted chain of `agent` again.
    pub fn check_integrity(&self, agent: &AgentName) -> Result<IntegrityStatus, PersistenceError> {
        let loaded = self.persistence.load(agent)?;
        let on_disk = integrity::verify(agent, &loaded.records);
        let slot = self.slot(agent);
        let slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        let resealed = if slot.resealed {
            slot.integrity.issues.clone()
        } else {
            Vec::new()
        };
        Ok(IntegrityStatus {
            agent: agent.clone(),
            on_disk,
            resealed,
        })
    }

    /// Re-seal the log of `agent` from genesis and forget the issues on
    /// record. Returns the status as it was before the rebuild.
    pub fn rebuild(&self, agent: &AgentName) -> Result<IntegrityStatus, PersistenceError> {
        let before = self.check_integrity(agent)?;
        let slot = self.slot(agent);
        let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        let written = self.rewrite_sealed(agent, &mut slot)?;
        slot.integrity.issues.clear();
        slot.resealed = false;
        info!(
            "Rebuilt integrity chain of {} ({} records, {} issues cleared)",
            agent,
            written,
            before.on_disk.issues.len() + before.resealed.len()
        );
        Ok(before)
    }

    /// Clear the log of `agent` in memory and on disk.
    pub fn reset(&self, agent: &AgentName) -> Result<(), PersistenceError> {
        let slot = self.slot(agent);
        let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.log.clear();
        slot.pending.clear();
        slot.tip = None;
        slot.integrity = IntegrityReport::default();
        slot.resealed = false;
        match self.persistence.clear(agent) {
            Ok(()) => {
                slot.dirty = false;
                Ok(())
            }
            Err(e) => {
                slot.dirty = true;
                Err(e)
            }
        }
    }

    /// Run `f` against the current log of `agent` under its lock.
    pub fn read<R>(&self, agent: &AgentName, f: impl FnOnce(&ConversationLog) -> R) -> R {
        let slot = self.slot(agent);
        let slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        f(&slot.log)
    }

    pub fn snapshot(&self, agent: &AgentName) -> ConversationLog {
        self.read(agent, ConversationLog::clone)
    }

    /// Chronological view over `agents`. Each log is copied under its own
    /// lock, so no half-written entry is ever observed.
    pub fn merge(&self, agents: &[AgentName]) -> Vec<TimelineEntry> {
        let logs: Vec<ConversationLog> = agents.iter().map(|a| self.snapshot(a)).collect();
        merge(&logs)
    }

    /// Integrity issues on record for `agent` (found at load, kept until
    /// [`rebuild`](Self::rebuild)).
    pub fn integrity(&self, agent: &AgentName) -> IntegrityReport {
        let slot = self.slot(agent);
        let slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.integrity.clone()
    }

    /// Entries not yet on disk (a pending full rewrite counts every entry).
    pub fn unsaved(&self, agent: &AgentName) -> usize {
        let slot = self.slot(agent);
        let slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.dirty {
            slot.log.len()
        } else {
            slot.pending.len()
        }
    }

    pub fn location(&self, agent: &AgentName) -> String {
        self.persistence.location(agent)
    }

    pub fn agents(&self) -> Vec<AgentName> {
        let mut agents: Vec<AgentName> = self
            .slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        agents.sort();
        agents
    }
}
