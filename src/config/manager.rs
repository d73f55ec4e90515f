//! Versioned persistence of the primary configuration document.
//!
//! # Layout
//!
//! ```text
//! <config_dir>/
//! ├── config.json              # primary document
//! ├── config-history.jsonl     # append-only history
//! └── backups/
//!     └── config-<timestamp>-<version>.json
//! ```
//!
//! There is no file locking: concurrent invocations against the same
//! configuration directory may race.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::backup::{sanitize_version, BackupRecord, BackupStore};
use super::diff::{diff, DiffCounts, DiffEntry};
use super::env::expand_env;
use super::history::{HistoryAction, HistoryEntry, HistoryLog};
use crate::error::{ConfgateError, Result};
use crate::schema::{SchemaName, ValidationOutcome, Validator};

/// Name of the configuration directory inside a project or home directory.
pub const CONFIG_DIR_NAME: &str = ".claude";

/// Default primary configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Version recorded when a document carries none.
const UNKNOWN_VERSION: &str = "unknown";

// ============================================================================
// Options
// ============================================================================

/// Options for constructing a [`ConfigManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigManagerOptions {
    /// Maximum number of backups to retain.
    pub max_backups: usize,
    /// Primary configuration file name.
    pub file_name: String,
}

impl Default for ConfigManagerOptions {
    fn default() -> Self {
        Self {
            max_backups: 10,
            file_name: DEFAULT_CONFIG_FILE.to_string(),
        }
    }
}

impl ConfigManagerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_backups(mut self, max: usize) -> Self {
        self.max_backups = max;
        self
    }

    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }
}

/// Options for [`ConfigManager::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Return built-in defaults when the file is absent.
    pub use_defaults: bool,
    /// Interpolate `${VAR}` tokens.
    pub expand_env: bool,
    /// Validate against the config schema.
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            use_defaults: true,
            expand_env: true,
            strict: false,
        }
    }
}

impl LoadOptions {
    #[must_use]
    pub fn with_use_defaults(mut self, enabled: bool) -> Self {
        self.use_defaults = enabled;
        self
    }

    #[must_use]
    pub fn with_expand_env(mut self, enabled: bool) -> Self {
        self.expand_env = enabled;
        self
    }

    #[must_use]
    pub fn with_strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }
}

/// Options for [`ConfigManager::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Back up the previous file first.
    pub backup: bool,
    /// Validate the document first.
    pub validate: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            backup: true,
            validate: true,
        }
    }
}

impl SaveOptions {
    #[must_use]
    pub fn with_backup(mut self, enabled: bool) -> Self {
        self.backup = enabled;
        self
    }

    #[must_use]
    pub fn with_validate(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }
}

/// Result of [`ConfigManager::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub success: bool,
    /// Backup of the previous file, `None` when there was none.
    pub backup: Option<PathBuf>,
}

/// Result of [`ConfigManager::rollback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    pub success: bool,
    pub restored_from: PathBuf,
    /// Version of the restored document.
    pub version: String,
    /// Backup of the file that was replaced.
    pub safety_backup: Option<PathBuf>,
}

/// One side of a [`ConfigManager::diff`].
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    Document(Value),
    Path(PathBuf),
}

impl From<Value> for DocumentSource {
    fn from(value: Value) -> Self {
        Self::Document(value)
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for DocumentSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

// ============================================================================
// Config Manager
// ============================================================================

/// Loads, saves, backs up and rolls back the primary configuration.
#[derive(Debug)]
pub struct ConfigManager {
    config_dir: PathBuf,
    options: ConfigManagerOptions,
    backups: BackupStore,
    history: HistoryLog,
    validator: Validator,
}

impl ConfigManager {
    /// Create a manager for the configuration directory `config_dir`.
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self::with_options(config_dir, ConfigManagerOptions::default())
    }

    /// Create a manager with custom options.
    pub fn with_options(config_dir: impl AsRef<Path>, options: ConfigManagerOptions) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        let stem = Path::new(&options.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("config")
            .to_string();
        let backups = BackupStore::new(config_dir.join("backups"), stem.clone(), options.max_backups);
        let history = HistoryLog::new(config_dir.join(format!("{}-history.jsonl", stem)));
        Self {
            config_dir,
            options,
            backups,
            history,
            validator: Validator::new(),
        }
    }

    /// Manager for `<project_dir>/.claude`.
    pub fn for_project(project_dir: impl AsRef<Path>) -> Self {
        Self::new(project_dir.as_ref().join(CONFIG_DIR_NAME))
    }

    /// Manager for `~/.claude`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn global() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfgateError::config("Cannot determine home directory"))?;
        Ok(Self::new(home.join(CONFIG_DIR_NAME)))
    }

    /// Use a specific validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(&self.options.file_name)
    }

    pub fn backups_dir(&self) -> &Path {
        self.backups.dir()
    }

    pub fn history_path(&self) -> &Path {
        self.history.path()
    }

    /// Built-in default configuration document.
    #[must_use]
    pub fn default_document() -> Value {
        json!({
            "version": "1.0.0",
            "agents": {},
            "skills": [],
            "hooks": {
                "preTask": [],
                "postTask": []
            },
            "qualityGate": {
                "enabled": true,
                "severity": "warn"
            }
        })
    }

    // ------------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------------

    /// Load the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfgateError::Config`] when the file is absent and defaults
    /// are disabled, when it is not valid JSON, or when strict validation
    /// fails.
    pub fn load(&self, options: LoadOptions) -> Result<Value> {
        let path = self.config_path();
        let document = match self.read_current()? {
            Some(document) => document,
            None if options.use_defaults => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                return Ok(Self::default_document());
            }
            None => {
                return Err(ConfgateError::config_invalid(
                    "Configuration file not found",
                    Some(path.clone()),
                    Vec::new(),
                    vec![format!("create config at {}", path.display())],
                ))
            }
        };

        let document = if options.expand_env {
            expand_env(&document)
        } else {
            document
        };

        if options.strict {
            let outcome = self.validator.validate_schema(&document, SchemaName::Config);
            if !outcome.valid {
                return Err(invalid(outcome, &path));
            }
        }

        Ok(document)
    }

    /// The persisted document as written, without interpolation; `None` when
    /// there is no file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn read_current(&self) -> Result<Option<Value>> {
        let path = self.config_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfgateError::file(&path, "read", e)),
        };
        parse_document(&content, &path).map(Some)
    }

    // ------------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------------

    /// Persist `document`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfgateError::Config`] without writing anything when
    /// validation fails, or a file error when backup or write fails.
    pub fn save(&self, document: &Value, options: SaveOptions) -> Result<SaveOutcome> {
        let path = self.config_path();

        if options.validate {
            let outcome = self.validator.validate_schema(document, SchemaName::Config);
            if !outcome.valid {
                return Err(invalid(outcome, &path));
            }
        }

        fs::create_dir_all(&self.config_dir)
            .map_err(|e| ConfgateError::file(&self.config_dir, "create directory", e))?;

        let previous = match fs::read_to_string(&path) {
            Ok(content) => Some(serde_json::from_str::<Value>(&content).unwrap_or(Value::Null)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(ConfgateError::file(&path, "read", e)),
        };
        let previous_version = previous.as_ref().and_then(version_of);

        let backup = match (&previous, options.backup) {
            (Some(_), true) if self.backups.max_backups() > 0 => {
                let version = previous_version.as_deref().unwrap_or(UNKNOWN_VERSION);
                let created = self.backups.create(&path, version)?;
                self.backups.prune()?;
                Some(created)
            }
            _ => None,
        };

        let bytes = render_document(document)?;
        fs::write(&path, &bytes).map_err(|e| ConfgateError::file(&path, "write", e))?;

        let changes = DiffCounts::of(&diff(
            previous.as_ref().unwrap_or(&Value::Object(Map::new())),
            document,
        ));
        self.history.append(
            HistoryAction::Save,
            json!({
                "version": version_of(document),
                "previousVersion": previous_version,
                "backup": backup,
                "changes": changes,
                "sha256": hex::encode(Sha256::digest(bytes.as_bytes())),
            }),
        )?;

        info!(path = %path.display(), backup = ?backup, "Saved configuration");
        Ok(SaveOutcome {
            success: true,
            backup,
        })
    }

    // ------------------------------------------------------------------------
    // Rollback
    // ------------------------------------------------------------------------

    /// Restore the newest backup, or the newest one tagged `version`.
    ///
    /// The file being replaced is backed up first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfgateError::Config`] when there are no backups or none
    /// matches `version`; the current file is left untouched in both cases.
    pub fn rollback(&self, version: Option<&str>) -> Result<RollbackOutcome> {
        let backups = self.backups.list()?;
        if backups.is_empty() {
            return Err(ConfgateError::config_invalid(
                "No backups available for rollback",
                Some(self.backups_dir().to_path_buf()),
                Vec::new(),
                vec!["Save the configuration at least twice to create a backup".to_string()],
            ));
        }

        let target = match version {
            None => &backups[0],
            Some(wanted) => {
                let wanted_name = sanitize_version(wanted);
                backups
                    .iter()
                    .find(|b| b.version == wanted || b.version == wanted_name)
                    .ok_or_else(|| {
                        ConfgateError::config_invalid(
                            format!("No backup found for version {}", wanted),
                            Some(self.backups_dir().to_path_buf()),
                            Vec::new(),
                            vec![format!(
                                "Available versions: {}",
                                backups
                                    .iter()
                                    .map(|b| b.version.as_str())
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            )],
                        )
                    })?
            }
        };

        let content = fs::read_to_string(&target.path)
            .map_err(|e| ConfgateError::file(&target.path, "read backup", e))?;
        let restored = parse_document(&content, &target.path)?;

        let path = self.config_path();
        let safety_backup = if path.exists() {
            let current_version = fs::read_to_string(&path)
                .ok()
                .and_then(|c| serde_json::from_str::<Value>(&c).ok())
                .as_ref()
                .and_then(version_of)
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
            Some(self.backups.create(&path, &current_version)?)
        } else {
            None
        };

        fs::write(&path, &content).map_err(|e| ConfgateError::file(&path, "write", e))?;
        self.backups.prune()?;

        let restored_version = version_of(&restored).unwrap_or_else(|| target.version.clone());
        self.history.append(
            HistoryAction::Rollback,
            json!({
                "restoredFrom": target.path,
                "version": restored_version,
                "safetyBackup": safety_backup,
            }),
        )?;

        info!(
            restored_from = %target.path.display(),
            version = %restored_version,
            "Rolled back configuration"
        );
        Ok(RollbackOutcome {
            success: true,
            restored_from: target.path.clone(),
            version: restored_version,
            safety_backup,
        })
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Backups newest first, at most `max_backups` of them.
    ///
    /// # Errors
    ///
    /// Returns an error only if an existing backup directory cannot be read.
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        self.backups.list()
    }

    /// Differences that turn `left` into `right`, or into the persisted
    /// document when `right` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if a path side cannot be read or parsed.
    pub fn diff(
        &self,
        left: impl Into<DocumentSource>,
        right: Option<DocumentSource>,
    ) -> Result<Vec<DiffEntry>> {
        let left = self.resolve(left.into())?;
        let right = match right {
            Some(source) => self.resolve(source)?,
            None => self
                .read_current()?
                .unwrap_or_else(|| Value::Object(Map::new())),
        };
        Ok(diff(&left, &right))
    }

    fn resolve(&self, source: DocumentSource) -> Result<Value> {
        match source {
            DocumentSource::Document(value) => Ok(value),
            DocumentSource::Path(path) => {
                let content = fs::read_to_string(&path)
                    .map_err(|e| ConfgateError::file(&path, "read", e))?;
                parse_document(&content, &path)
            }
        }
    }

    /// History entries newest first.
    ///
    /// # Errors
    ///
    /// Returns an error only if an existing history log cannot be read.
    pub fn get_history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        self.history.read(limit)
    }
}

fn version_of(document: &Value) -> Option<String> {
    document
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Pretty JSON with a trailing newline.
fn render_document(document: &Value) -> Result<String> {
    let mut rendered = serde_json::to_string_pretty(document)?;
    rendered.push('\n');
    Ok(rendered)
}

fn parse_document(content: &str, path: &Path) -> Result<Value> {
    serde_json::from_str(content).map_err(|e| {
        ConfgateError::config_invalid(
            format!("Invalid JSON in {}: {}", path.display(), e),
            Some(path.to_path_buf()),
            Vec::new(),
            vec![format!(
                "Fix JSON syntax at line {}, column {}",
                e.line(),
                e.column()
            )],
        )
    })
}

fn invalid(outcome: ValidationOutcome, path: &Path) -> ConfgateError {
    let issues = outcome.issues();
    ConfgateError::config_invalid(
        format!("Configuration failed validation with {} issue(s)", issues.len()),
        Some(path.to_path_buf()),
        issues,
        outcome.fixes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> ConfigManager {
        ConfigManager::new(temp.path().join(".claude"))
    }

    #[test]
    fn test_load_missing_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let doc = manager(&temp).load(LoadOptions::default()).unwrap();
        assert_eq!(doc, ConfigManager::default_document());
    }

    #[test]
    fn test_load_missing_without_defaults_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = manager(&temp)
            .load(LoadOptions::default().with_use_defaults(false))
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_load_malformed_json_is_config_error() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        fs::create_dir_all(m.config_dir()).unwrap();
        fs::write(m.config_path(), "{ \"version\": ").unwrap();

        let err = m.load(LoadOptions::default()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.hints().iter().any(|h| h.contains("line")));
    }

    #[test]
    fn test_load_strict_rejects_invalid_document() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        fs::create_dir_all(m.config_dir()).unwrap();
        fs::write(m.config_path(), r#"{"model": "x"}"#).unwrap();

        assert!(m.load(LoadOptions::default()).is_ok());
        let err = m
            .load(LoadOptions::default().with_strict(true))
            .unwrap_err();
        match err {
            ConfgateError::Config { violations, .. } => {
                assert!(violations.iter().any(|v| v.path == "version"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_save_with_zero_backup_cap_reports_no_backup() {
        let temp = TempDir::new().unwrap();
        let m = ConfigManager::with_options(
            temp.path().join(".claude"),
            ConfigManagerOptions::new().with_max_backups(0),
        );
        m.save(&json!({"version": "1.0.0"}), SaveOptions::default())
            .unwrap();
        let outcome = m
            .save(&json!({"version": "1.1.0"}), SaveOptions::default())
            .unwrap();

        assert!(outcome.backup.is_none());
        assert!(m.list_backups().unwrap().is_empty());
        assert_eq!(m.get_history(Some(1)).unwrap()[0].details["backup"], Value::Null);
    }

    #[test]
    fn test_save_invalid_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        assert!(m.save(&json!({"model": "x"}), SaveOptions::default()).is_err());
        assert!(!m.config_path().exists());
        assert!(m.get_history(None).unwrap().is_empty());
    }

    #[test]
    fn test_first_save_has_no_backup() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        let outcome = m.save(&json!({"version": "1.0.0"}), SaveOptions::default()).unwrap();
        assert!(outcome.success);
        assert!(outcome.backup.is_none());

        let written = fs::read_to_string(m.config_path()).unwrap();
        assert_eq!(written, "{\n  \"version\": \"1.0.0\"\n}\n");
    }

    #[test]
    fn test_save_history_records_versions_and_hash() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        m.save(&json!({"version": "1.0.0"}), SaveOptions::default()).unwrap();
        m.save(&json!({"version": "1.1.0", "model": "opus"}), SaveOptions::default())
            .unwrap();

        let history = m.get_history(None).unwrap();
        assert_eq!(history.len(), 2);
        let latest = &history[0];
        assert_eq!(latest.action, HistoryAction::Save);
        assert_eq!(latest.details["version"], "1.1.0");
        assert_eq!(latest.details["previousVersion"], "1.0.0");
        assert!(latest.details["backup"].is_string());
        assert_eq!(latest.details["changes"], json!({"added": 1, "removed": 0, "changed": 1}));
        assert_eq!(latest.details["sha256"].as_str().unwrap().len(), 64);
        assert!(history[1].details["backup"].is_null());
    }

    #[test]
    fn test_rollback_without_backups_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        m.save(&json!({"version": "1.0.0"}), SaveOptions::default()).unwrap();
        let before = fs::read(m.config_path()).unwrap();

        let err = m.rollback(None).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert_eq!(fs::read(m.config_path()).unwrap(), before);
    }

    #[test]
    fn test_rollback_to_unknown_version_fails() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        m.save(&json!({"version": "1.0.0"}), SaveOptions::default()).unwrap();
        m.save(&json!({"version": "2.0.0"}), SaveOptions::default()).unwrap();

        assert!(m.rollback(Some("9.9.9")).is_err());
        assert_eq!(m.read_current().unwrap().unwrap()["version"], "2.0.0");
    }

    #[test]
    fn test_rollback_backs_up_current_first() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        m.save(&json!({"version": "1.0.0"}), SaveOptions::default()).unwrap();
        m.save(&json!({"version": "2.0.0"}), SaveOptions::default()).unwrap();

        let outcome = m.rollback(Some("1.0.0")).unwrap();
        assert_eq!(outcome.version, "1.0.0");
        let safety = outcome.safety_backup.unwrap();
        let saved: Value = serde_json::from_str(&fs::read_to_string(safety).unwrap()).unwrap();
        assert_eq!(saved["version"], "2.0.0");

        let history = m.get_history(Some(1)).unwrap();
        assert_eq!(history[0].action, HistoryAction::Rollback);
        assert_eq!(history[0].details["version"], "1.0.0");
    }

    #[test]
    fn test_diff_against_persisted_document() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        m.save(&json!({"version": "1.0.0", "model": "a"}), SaveOptions::default())
            .unwrap();

        let entries = m
            .diff(json!({"version": "1.0.0", "model": "b"}), None)
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "model");
        assert_eq!(entries[0].from, Some(json!("b")));
        assert_eq!(entries[0].to, Some(json!("a")));
    }

    #[test]
    fn test_custom_file_name_drives_backup_and_history_names() {
        let temp = TempDir::new().unwrap();
        let m = ConfigManager::with_options(
            temp.path(),
            ConfigManagerOptions::new().with_file_name("team.json"),
        );
        assert!(m.history_path().ends_with("team-history.jsonl"));
        m.save(&json!({"version": "1.0.0"}), SaveOptions::default()).unwrap();
        m.save(&json!({"version": "1.0.1"}), SaveOptions::default()).unwrap();

        let backups = m.list_backups().unwrap();
        assert_eq!(backups.len(), 1);
        let name = backups[0].path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("team-"));
    }
}
