//! Timestamped, version-tagged backups of the configuration file.
//!
//! Backups are byte-identical copies named
//! `config-<YYYYMMDDTHHMMSSffffffZ>-<version>.json`, so lexical order of the
//! file names is chronological order.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfgateError, Result};

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%6f";
const SECONDS_FORMAT: &str = "%Y%m%dT%H%M%S";
const SECONDS_LEN: usize = 15;
const TIMESTAMP_LEN: usize = 21;

/// Metadata of one backup file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub path: PathBuf,
    /// Version of the configuration captured in the backup.
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Size in bytes.
    pub size: u64,
}

/// Directory of backups for one configuration file.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    prefix: String,
    max_backups: usize,
}

/// Replace characters that are unsafe in file names.
pub(crate) fn sanitize_version(version: &str) -> String {
    let cleaned: String = version
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, max_backups: usize) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            max_backups,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    fn file_name(&self, timestamp: DateTime<Utc>, version: &str) -> String {
        format!(
            "{}-{}Z-{}.json",
            self.prefix,
            timestamp.format(TIMESTAMP_FORMAT),
            sanitize_version(version)
        )
    }

    /// Parse a backup file name into `(timestamp, version)`.
    fn parse_name(&self, name: &str) -> Option<(DateTime<Utc>, String)> {
        let rest = name
            .strip_prefix(&self.prefix)?
            .strip_prefix('-')?
            .strip_suffix(".json")?;
        let stamp = rest.get(..TIMESTAMP_LEN)?;
        let version = rest.get(TIMESTAMP_LEN..)?.strip_prefix("Z-")?;
        let micros: i64 = stamp.get(SECONDS_LEN..)?.parse().ok()?;
        let naive = NaiveDateTime::parse_from_str(stamp.get(..SECONDS_LEN)?, SECONDS_FORMAT).ok()?;
        Some((
            naive.and_utc() + Duration::microseconds(micros),
            version.to_string(),
        ))
    }

    /// Copy `source` into the store tagged with `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the copy fails.
    pub fn create(&self, source: &Path, version: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| ConfgateError::file(&self.dir, "create directory", e))?;

        let mut timestamp = Utc::now();
        let mut target = self.dir.join(self.file_name(timestamp, version));
        while target.exists() {
            timestamp += Duration::microseconds(1);
            target = self.dir.join(self.file_name(timestamp, version));
        }

        fs::copy(source, &target).map_err(|e| ConfgateError::file(&target, "create backup", e))?;
        info!(backup = %target.display(), version, "Created configuration backup");
        Ok(target)
    }

    /// Every backup on disk, newest first.
    ///
    /// A missing directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing directory cannot be read.
    pub fn list_all(&self) -> Result<Vec<BackupRecord>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfgateError::file(&self.dir, "read directory", e)),
        };

        let mut records: Vec<BackupRecord> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let (timestamp, version) = self.parse_name(&name)?;
                let size = entry.metadata().ok()?.len();
                Some(BackupRecord {
                    path: entry.path(),
                    version,
                    timestamp,
                    size,
                })
            })
            .collect();

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.path.cmp(&a.path)));
        Ok(records)
    }

    /// The newest `max_backups` backups.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing directory cannot be read.
    pub fn list(&self) -> Result<Vec<BackupRecord>> {
        let mut records = self.list_all()?;
        records.truncate(self.max_backups);
        Ok(records)
    }

    /// Delete backups beyond `max_backups`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if a backup cannot be deleted.
    pub fn prune(&self) -> Result<usize> {
        let records = self.list_all()?;
        let mut removed = 0;
        for record in records.iter().skip(self.max_backups) {
            fs::remove_file(&record.path)
                .map_err(|e| ConfgateError::file(&record.path, "delete backup", e))?;
            debug!(backup = %record.path.display(), "Pruned backup");
            removed += 1;
        }
        if removed > 0 {
            info!("Pruned {} backups, {} remaining", removed, records.len() - removed);
        }
        Ok(removed)
    }
}
