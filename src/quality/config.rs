//! Quality gate configuration.
//!
//! Resolved from `.claude/quality-gate.json` when present, otherwise from the
//! `qualityGate` section of the primary configuration, otherwise the built-in
//! default.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use super::rule::RuleConfig;
use crate::config::{ConfigManager, LoadOptions};
use crate::error::{ConfgateError, Result};
use crate::severity::Severity;

/// File name of the gate configuration inside the configuration directory.
pub const GATE_CONFIG_FILE: &str = "quality-gate.json";

/// Per-rule override applied by a gate on top of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOverride {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    /// Shallow-merged into the rule's configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RuleConfig>,
}

impl RuleOverride {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: None,
            severity: None,
            config: None,
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RuleConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// Lifecycle points at which the gate runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateTriggers {
    #[serde(default = "default_true")]
    pub pre_commit: bool,

    #[serde(default = "default_true")]
    pub pre_push: bool,

    #[serde(default)]
    pub on_tool_use: bool,
}

impl Default for GateTriggers {
    fn default() -> Self {
        Self {
            pre_commit: true,
            pre_push: true,
            on_tool_use: false,
        }
    }
}

/// Output format of the gate report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Console,
    Json,
    Markdown,
    /// Standalone HTML page, rendered by the HTML reporter.
    Html,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Console => "console",
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Html => "html",
        };
        f.write_str(name)
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => Err(format!(
                "Unknown report format: {}. Valid formats: console, json, markdown, html",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingConfig {
    #[serde(default)]
    pub format: ReportFormat,

    /// Write the report here instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

/// Quality gate configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Blocking threshold.
    #[serde(default)]
    pub severity: Severity,

    #[serde(default)]
    pub rules: Vec<RuleOverride>,

    #[serde(default)]
    pub gates: GateTriggers,

    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Glob patterns of project-relative paths to leave out of scans.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn override_config(value: serde_json::Value) -> Option<RuleConfig> {
    value.as_object().cloned()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::Warn,
            rules: vec![
                RuleOverride {
                    config: override_config(json!({ "maxSize": 102_400 })),
                    ..RuleOverride::new("file-size-limit")
                },
                RuleOverride {
                    severity: Some(Severity::Error),
                    config: override_config(json!({ "maxLines": 500 })),
                    ..RuleOverride::new("line-count-limit")
                },
                RuleOverride::new("no-console-logs").with_severity(Severity::Warn),
                RuleOverride::new("todo-comments").with_severity(Severity::Info),
            ],
            gates: GateTriggers::default(),
            reporting: ReportingConfig::default(),
            exclude: Vec::new(),
        }
    }
}

impl GateConfig {
    /// Path of the gate configuration for a project.
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(".claude").join(GATE_CONFIG_FILE)
    }

    /// Parse a gate configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid gate
    /// configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfgateError::file(path, "read", e))?;
        serde_json::from_str(&content).map_err(|e| {
            ConfgateError::config_with_path(format!("Invalid quality gate configuration: {}", e), path)
        })
    }

    /// Gate configuration from the `qualityGate` section of a primary
    /// configuration document, layered over the built-in default.
    ///
    /// Returns `Ok(None)` when the document has no such section.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is not a valid gate configuration.
    pub fn from_document(document: &Value) -> Result<Option<Self>> {
        let Some(section) = document.get("qualityGate") else {
            return Ok(None);
        };
        let Some(overrides) = section.as_object() else {
            return Err(ConfgateError::config(
                "Invalid quality gate configuration: qualityGate must be an object",
            ));
        };

        let mut merged = serde_json::to_value(Self::default())?;
        if let Some(base) = merged.as_object_mut() {
            for (key, value) in overrides {
                base.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(merged)
            .map(Some)
            .map_err(|e| ConfgateError::config(format!("Invalid quality gate configuration: {}", e)))
    }

    /// Resolve the project's gate configuration.
    ///
    /// `.claude/quality-gate.json` wins when present. Otherwise the
    /// `qualityGate` section of `.claude/config.json` is used. Absent or
    /// malformed sources fall back to the built-in default.
    pub fn load(project_dir: &Path) -> Self {
        let path = Self::path(project_dir);
        if path.exists() {
            return match Self::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring malformed quality gate configuration");
                    Self::default()
                }
            };
        }

        let manager = ConfigManager::for_project(project_dir);
        let config_path = manager.config_path();
        if !config_path.exists() {
            debug!(path = %path.display(), "No quality gate configuration, using defaults");
            return Self::default();
        }

        let section = manager
            .load(LoadOptions::default().with_use_defaults(false))
            .and_then(|document| Self::from_document(&document));
        match section {
            Ok(Some(config)) => {
                debug!(path = %config_path.display(), "Using qualityGate section of configuration");
                config
            }
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Ignoring invalid qualityGate configuration");
                Self::default()
            }
        }
    }

    /// Override for `rule_id`, if configured.
    pub fn override_for(&self, rule_id: &str) -> Option<&RuleOverride> {
        self.rules.iter().find(|r| r.id == rule_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_matches_documented_shape() {
        let config = GateConfig::default();
        assert!(config.enabled);
        assert_eq!(config.severity, Severity::Warn);
        assert_eq!(config.rules.len(), 4);
        assert_eq!(config.gates, GateTriggers::default());
        assert!(!config.gates.on_tool_use);
        assert_eq!(config.reporting.format, ReportFormat::Console);

        let line_count = config.override_for("line-count-limit").unwrap();
        assert_eq!(line_count.severity, Some(Severity::Error));
        assert_eq!(line_count.config.as_ref().unwrap()["maxLines"], 500);
    }

    #[test]
    fn test_load_missing_falls_back_to_default() {
        let temp = TempDir::new().unwrap();
        assert_eq!(GateConfig::load(temp.path()), GateConfig::default());
    }

    #[test]
    fn test_load_malformed_falls_back_to_default() {
        let temp = TempDir::new().unwrap();
        let path = GateConfig::path(temp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(GateConfig::load(temp.path()), GateConfig::default());
    }

    #[test]
    fn test_load_partial_document_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = GateConfig::path(temp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"severity": "critical", "rules": [{"id": "no-empty-files", "enabled": false}], "reporting": {"format": "markdown", "outputFile": "report.md"}}"#,
        )
        .unwrap();

        let config = GateConfig::load(temp.path());
        assert!(config.enabled);
        assert_eq!(config.severity, Severity::Critical);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].enabled, Some(false));
        assert_eq!(config.reporting.format, ReportFormat::Markdown);
        assert_eq!(config.reporting.output_file, Some(PathBuf::from("report.md")));
        assert!(config.gates.pre_commit);
    }

    fn write_primary(temp: &TempDir, content: &str) {
        let dir = temp.path().join(".claude");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), content).unwrap();
    }

    #[test]
    fn test_from_document_layers_over_default() {
        let doc = json!({"version": "1.0.0", "qualityGate": {"enabled": false, "severity": "error"}});
        let config = GateConfig::from_document(&doc).unwrap().unwrap();
        assert!(!config.enabled);
        assert_eq!(config.severity, Severity::Error);
        assert_eq!(config.rules, GateConfig::default().rules);

        assert!(GateConfig::from_document(&json!({"version": "1.0.0"}))
            .unwrap()
            .is_none());
        assert!(GateConfig::from_document(&json!({"qualityGate": {"severity": "fatal"}})).is_err());
        assert!(GateConfig::from_document(&json!({"qualityGate": true})).is_err());
    }

    #[test]
    fn test_load_uses_primary_configuration_section() {
        let temp = TempDir::new().unwrap();
        write_primary(&temp, r#"{"version": "1.0.0", "qualityGate": {"enabled": false}}"#);

        let config = GateConfig::load(temp.path());
        assert!(!config.enabled);
        assert_eq!(config.severity, Severity::Warn);
    }

    #[test]
    fn test_gate_file_takes_precedence_over_primary_configuration() {
        let temp = TempDir::new().unwrap();
        write_primary(&temp, r#"{"version": "1.0.0", "qualityGate": {"enabled": false}}"#);
        std::fs::write(GateConfig::path(temp.path()), r#"{"severity": "critical"}"#).unwrap();

        let config = GateConfig::load(temp.path());
        assert!(config.enabled);
        assert_eq!(config.severity, Severity::Critical);
    }

    #[test]
    fn test_load_ignores_invalid_primary_section() {
        let temp = TempDir::new().unwrap();
        write_primary(&temp, r#"{"version": "1.0.0", "qualityGate": {"severity": 3}}"#);
        assert_eq!(GateConfig::load(temp.path()), GateConfig::default());

        write_primary(&temp, r#"{"version": "1.0.0"}"#);
        assert_eq!(GateConfig::load(temp.path()), GateConfig::default());
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert!("pdf".parse::<ReportFormat>().is_err());
    }
}
