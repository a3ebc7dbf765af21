//! Port for persisted conversation logs.
//!
//! One log per agent. Records are written in the lenient
//! [`PersistedRecord`] shape so hand-edited files still load.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port holds the conversation
//! transcripts the agents are given back as context.

use council_domain::{AgentName, PersistedRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Could not encode record: {0}")]
    Encode(String),
}

/// Raw contents of one persisted log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedRecords {
    pub records: Vec<PersistedRecord>,
    /// Lines that were not valid records and were skipped.
    pub undecodable_lines: usize,
    /// Whether a log existed at all.
    pub found: bool,
}

/// Storage for per-agent conversation logs
///
/// Calls are synchronous; each agent's log is only ever written by that
/// agent's own proxy.
pub trait LogPersistence: Send + Sync {
    fn load(&self, agent: &AgentName) -> Result<LoadedRecords, PersistenceError>;

    /// Read a log for `agent` kept in another directory.
    fn load_external(
        &self,
        source: &Path,
        agent: &AgentName,
    ) -> Result<LoadedRecords, PersistenceError>;

    fn append(&self, agent: &AgentName, records: &[PersistedRecord])
    -> Result<(), PersistenceError>;

    /// Replace the whole log atomically.
    fn rewrite(
        &self,
        agent: &AgentName,
        records: &[PersistedRecord],
    ) -> Result<(), PersistenceError>;

    fn clear(&self, agent: &AgentName) -> Result<(), PersistenceError>;

    /// Human-readable location of the agent's log.
    fn location(&self, agent: &AgentName) -> String;
}

/// In-memory implementation for tests.
#[derive(Default)]
pub struct MemoryLogPersistence {
    logs: Mutex<HashMap<AgentName, Vec<PersistedRecord>>>,
    external: Mutex<HashMap<(PathBuf, AgentName), Vec<PersistedRecord>>>,
    failing: AtomicBool,
}

impl MemoryLogPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self, agent: &AgentName) -> Vec<PersistedRecord> {
        self.logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(agent)
            .cloned()
            .unwrap_or_default()
    }

    pub fn insert(&self, agent: AgentName, records: Vec<PersistedRecord>) {
        self.logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(agent, records);
    }

    pub fn insert_external(&self, source: &Path, agent: AgentName, records: Vec<PersistedRecord>) {
        self.external
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((source.to_path_buf(), agent), records);
    }

    fn check_writable(&self, agent: &AgentName) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io {
                path: self.location(agent),
                message: "write refused".to_string(),
            });
        }
        Ok(())
    }
}

impl LogPersistence for MemoryLogPersistence {
    fn load(&self, agent: &AgentName) -> Result<LoadedRecords, PersistenceError> {
        let logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(match logs.get(agent) {
            Some(records) => LoadedRecords {
                records: records.clone(),
                undecodable_lines: 0,
                found: true,
            },
            None => LoadedRecords::default(),
        })
    }

    fn load_external(
        &self,
        source: &Path,
        agent: &AgentName,
    ) -> Result<LoadedRecords, PersistenceError> {
        let external = self.external.lock().unwrap_or_else(|e| e.into_inner());
        Ok(match external.get(&(source.to_path_buf(), agent.clone())) {
            Some(records) => LoadedRecords {
                records: records.clone(),
                undecodable_lines: 0,
                found: true,
            },
            None => LoadedRecords::default(),
        })
    }

    fn append(
        &self,
        agent: &AgentName,
        records: &[PersistedRecord],
    ) -> Result<(), PersistenceError> {
        self.check_writable(agent)?;
        self.logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(agent.clone())
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    fn rewrite(
        &self,
        agent: &AgentName,
        records: &[PersistedRecord],
    ) -> Result<(), PersistenceError> {
        self.check_writable(agent)?;
        self.insert(agent.clone(), records.to_vec());
        Ok(())
    }

    fn clear(&self, agent: &AgentName) -> Result<(), PersistenceError> {
        self.check_writable(agent)?;
        self.logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(agent);
        Ok(())
    }

    fn location(&self, agent: &AgentName) -> String {
        format!("memory:{}", agent)
    }
}
