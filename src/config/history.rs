//! Append-only JSONL log of configuration lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ConfgateError, Result};

/// Lifecycle event recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Save,
    Rollback,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Save => write!(f, "save"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// One history line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    /// Action-specific fields, flattened into the line.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// The history file.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry. `details` must be a JSON object; other values are
    /// recorded under `details`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be opened or written.
    pub fn append(&self, action: HistoryAction, details: Value) -> Result<HistoryEntry> {
        let details = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("details".to_string(), other);
                map
            }
        };
        let entry = HistoryEntry {
            timestamp: Utc::now(),
            action,
            details,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfgateError::file(parent, "create directory", e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ConfgateError::file(&self.path, "open history", e))?;

        let json = serde_json::to_string(&entry)?;
        writeln!(file, "{}", json).map_err(|e| ConfgateError::file(&self.path, "append history", e))?;

        debug!(action = %action, path = %self.path.display(), "Appended history entry");
        Ok(entry)
    }

    /// Entries newest first, truncated to `limit` when given.
    ///
    /// A missing log yields an empty list; malformed lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing log cannot be read.
    pub fn read(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfgateError::file(&self.path, "read history", e)),
        };

        let mut entries = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = line_num + 1,
                    error = %e,
                    "Skipping malformed history entry"
                ),
            }
        }

        entries.reverse();
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_log_reads_empty() {
        let temp = TempDir::new().unwrap();
        let log = HistoryLog::new(temp.path().join("history.jsonl"));
        assert!(log.read(None).unwrap().is_empty());
    }

    #[test]
    fn test_append_then_read_newest_first() {
        let temp = TempDir::new().unwrap();
        let log = HistoryLog::new(temp.path().join("nested/history.jsonl"));
        log.append(HistoryAction::Save, json!({"version": "1.0.0"})).unwrap();
        log.append(HistoryAction::Save, json!({"version": "1.1.0"})).unwrap();
        log.append(HistoryAction::Rollback, json!({"version": "1.0.0"})).unwrap();

        let entries = log.read(None).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, HistoryAction::Rollback);
        assert_eq!(entries[2].details["version"], "1.0.0");

        let limited = log.read(Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[1].details["version"], "1.1.0");
    }

    #[test]
    fn test_lines_carry_timestamp_and_action() {
        let temp = TempDir::new().unwrap();
        let log = HistoryLog::new(temp.path().join("history.jsonl"));
        log.append(HistoryAction::Save, json!({"backup": null})).unwrap();

        let line = fs::read_to_string(log.path()).unwrap();
        let value: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["action"], "save");
        assert!(value["timestamp"].is_string());
        assert!(value["backup"].is_null());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let temp = TempDir::new().unwrap();
        let log = HistoryLog::new(temp.path().join("history.jsonl"));
        log.append(HistoryAction::Save, json!({})).unwrap();
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"timestamp": "2026-01-01T00:00:00Z", "action": "explode"}}"#).unwrap();

        assert_eq!(log.read(None).unwrap().len(), 1);
    }
}
