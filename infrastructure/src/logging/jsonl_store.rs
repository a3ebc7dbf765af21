//! JSONL files for per-agent conversation logs.
//!
//! Each agent's log lives at `<working_dir>/<agent>.jsonl`, one
//! [`PersistedRecord`] per line. Reads are lenient: fields of the wrong type
//! are dropped from their record, and only a line that is not a JSON object
//! is skipped and counted so the caller can report it.

use council_application::{LoadedRecords, LogPersistence, PersistenceError};
use council_domain::{AgentName, PersistedRecord};
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "jsonl";

/// Older single-document logs: `{"history": [record, ...]}`.
#[derive(Debug, Deserialize)]
struct HistoryDocument {
    #[serde(default)]
    history: Vec<serde_json::Value>,
}

/// File-backed conversation log storage.
pub struct JsonlLogStore {
    dir: PathBuf,
}

impl JsonlLogStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, agent: &AgentName) -> PathBuf {
        log_path(&self.dir, agent.as_str())
    }

    fn write_all(path: &Path, file: File, records: &[PersistedRecord]) -> Result<(), PersistenceError> {
        let mut writer = BufWriter::new(file);
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| PersistenceError::Encode(e.to_string()))?;
            writeln!(writer, "{}", line).map_err(|e| io_error(path, e))?;
        }
        writer.flush().map_err(|e| io_error(path, e))?;
        writer
            .get_ref()
            .sync_data()
            .map_err(|e| io_error(path, e))
    }
}

impl LogPersistence for JsonlLogStore {
    fn load(&self, agent: &AgentName) -> Result<LoadedRecords, PersistenceError> {
        read_jsonl(&self.path_for(agent))
    }

    fn load_external(
        &self,
        source: &Path,
        agent: &AgentName,
    ) -> Result<LoadedRecords, PersistenceError> {
        for stem in name_variants(agent.as_str()) {
            let path = log_path(source, &stem);
            if path.exists() {
                debug!("Importing log for '{}' from {}", agent, path.display());
                return read_jsonl(&path);
            }
            let legacy = source.join(format!("{}.json", stem));
            if legacy.exists() {
                debug!("Importing log for '{}' from {}", agent, legacy.display());
                return read_history_document(&legacy);
            }
        }
        Ok(LoadedRecords::default())
    }

    fn append(
        &self,
        agent: &AgentName,
        records: &[PersistedRecord],
    ) -> Result<(), PersistenceError> {
        if records.is_empty() {
            return Ok(());
        }
        let path = self.path_for(agent);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;
        Self::write_all(&path, file, records)
    }

    fn rewrite(
        &self,
        agent: &AgentName,
        records: &[PersistedRecord],
    ) -> Result<(), PersistenceError> {
        let path = self.path_for(agent);
        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));
        let file = File::create(&tmp).map_err(|e| io_error(&tmp, e))?;
        if let Err(e) = Self::write_all(&tmp, file, records) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))
    }

    fn clear(&self, agent: &AgentName) -> Result<(), PersistenceError> {
        let path = self.path_for(agent);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn location(&self, agent: &AgentName) -> String {
        self.path_for(agent).display().to_string()
    }
}

fn log_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.{}", stem, EXTENSION))
}

/// File stems tried when importing a log written under a slightly different
/// naming convention.
fn name_variants(name: &str) -> Vec<String> {
    let lower = name.to_lowercase();
    let mut variants = vec![
        name.to_string(),
        lower.clone(),
        lower.replace(' ', "_"),
        lower.replace(' ', "-"),
    ];
    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| seen.insert(v.clone()));
    variants
}

fn read_jsonl(path: &Path) -> Result<LoadedRecords, PersistenceError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LoadedRecords::default());
        }
        Err(e) => return Err(io_error(path, e)),
    };

    let mut loaded = LoadedRecords {
        found: true,
        ..LoadedRecords::default()
    };
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match PersistedRecord::from_line(line) {
            Some(record) => loaded.records.push(record),
            None => {
                warn!("{}:{}: skipping line that is not a JSON object", path.display(), index + 1);
                loaded.undecodable_lines += 1;
            }
        }
    }
    Ok(loaded)
}

fn read_history_document(path: &Path) -> Result<LoadedRecords, PersistenceError> {
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let document: HistoryDocument = serde_json::from_str(&content).map_err(|e| {
        PersistenceError::Io {
            path: path.display().to_string(),
            message: format!("not a history document: {}", e),
        }
    })?;

    let mut loaded = LoadedRecords {
        found: true,
        ..LoadedRecords::default()
    };
    for value in &document.history {
        match PersistedRecord::from_json(value) {
            Some(record) => loaded.records.push(record),
            None => loaded.undecodable_lines += 1,
        }
    }
    Ok(loaded)
}

fn io_error(path: &Path, error: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}
