//! Error taxonomy for confgate.
//!
//! Every error carries a stable code, a severity, structured details and
//! zero or more remediation hints, and can be rendered to a stable JSON
//! shape through [`ConfgateError::report`].

use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::quality::GateResult;
use crate::schema::ValidationIssue;
use crate::severity::Severity;

/// Main error type for confgate operations
#[derive(Error, Debug)]
pub enum ConfgateError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration could not be loaded, parsed or validated
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
        /// Underlying schema violations, if any.
        violations: Vec<ValidationIssue>,
        /// Suggested fixes collected from the violations.
        fixes: Vec<String>,
    },

    /// Generic validation failure outside the configuration path
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        violations: Vec<ValidationIssue>,
    },

    /// Version upgrade of a configuration document failed
    #[error("Migration from {from} to {to} failed: {message}")]
    Migration {
        from: String,
        to: String,
        message: String,
    },

    // =========================================================================
    // Quality Gate Errors
    // =========================================================================
    /// The gate decided `passed = false` on a throwing entry point
    #[error("Quality gate failed: {} issue(s) at or above {}", .result.blocking_count(), .result.threshold)]
    QualityGate { result: Box<GateResult> },

    /// A rule's check implementation failed
    #[error("Rule '{rule_id}' failed on {}: {message}", .file.display())]
    Rule {
        rule_id: String,
        file: PathBuf,
        message: String,
    },

    // =========================================================================
    // File System Errors
    // =========================================================================
    /// File-system operation failed on a known path
    #[error("Failed to {operation} {}: {source}", .path.display())]
    File {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Serializable rendering of a [`ConfgateError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub hints: Vec<String>,
    pub details: Value,
}

impl ConfgateError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
            violations: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path.into()),
            violations: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Create a configuration error carrying the itemized violations
    pub fn config_invalid(
        message: impl Into<String>,
        path: Option<PathBuf>,
        violations: Vec<ValidationIssue>,
        fixes: Vec<String>,
    ) -> Self {
        Self::Config {
            message: message.into(),
            path,
            violations,
            fixes,
        }
    }

    /// Create a file error
    pub fn file(path: impl AsRef<Path>, operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a rule error
    pub fn rule(rule_id: impl Into<String>, file: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Rule {
            rule_id: rule_id.into(),
            file: file.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Migration { .. } => "MIGRATION_ERROR",
            Self::QualityGate { .. } => "QUALITY_GATE_FAILED",
            Self::Rule { .. } => "RULE_ERROR",
            Self::File { .. } => "FILE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Typical severity of this error kind
    pub fn severity(&self) -> Severity {
        match self {
            Self::Config { .. } | Self::Migration { .. } => Severity::Critical,
            Self::Rule { .. } => Severity::Warn,
            _ => Severity::Error,
        }
    }

    /// Remediation hints for the user
    pub fn hints(&self) -> Vec<String> {
        match self {
            Self::Config { path, fixes, .. } => {
                let mut hints = fixes.clone();
                if let Some(path) = path {
                    hints.push(format!("Check the configuration file at {}", path.display()));
                }
                if hints.is_empty() {
                    hints.push("Run `confgate validate` to inspect the configuration".to_string());
                }
                hints
            }
            Self::Validation { violations, .. } => {
                violations.iter().filter_map(|v| v.fix.clone()).collect()
            }
            Self::Migration { from, .. } => vec![format!(
                "Restore a backup taken at version {} with `confgate config rollback --version {}`",
                from, from
            )],
            Self::QualityGate { .. } => vec![
                "Fix the reported issues or raise the severity threshold".to_string(),
                "Run with --fix to apply automatic fixes where available".to_string(),
            ],
            Self::Rule { rule_id, .. } => vec![format!(
                "Disable rule '{}' in quality-gate.json if it cannot run on this file",
                rule_id
            )],
            Self::File { path, .. } => vec![format!(
                "Check that {} exists and is accessible",
                path.display()
            )],
            Self::Io(_) | Self::Json(_) | Self::Other(_) => Vec::new(),
        }
    }

    /// Structured details for machine consumption
    pub fn details(&self) -> Value {
        match self {
            Self::Config {
                path,
                violations,
                fixes,
                ..
            } => json!({
                "errorCount": violations.len(),
                "errors": violations,
                "fixes": fixes,
                "path": path.as_ref().map(|p| p.display().to_string()),
            }),
            Self::Validation { violations, .. } => json!({
                "errorCount": violations.len(),
                "errors": violations,
            }),
            Self::Migration { from, to, .. } => json!({ "from": from, "to": to }),
            Self::QualityGate { result } => {
                let s = &result.summary;
                json!({
                    "passed": result.passed,
                    "threshold": result.threshold,
                    "total": s.total,
                    "critical": s.critical,
                    "error": s.error,
                    "warn": s.warn,
                    "info": s.info,
                    "filesChecked": s.files_checked,
                    "rulesRun": s.rules_run,
                })
            }
            Self::Rule { rule_id, file, .. } => json!({
                "ruleId": rule_id,
                "file": file.display().to_string(),
            }),
            Self::File {
                path, operation, ..
            } => json!({
                "path": path.display().to_string(),
                "operation": operation,
            }),
            Self::Io(_) | Self::Json(_) | Self::Other(_) => Value::Null,
        }
    }

    /// Render to the stable JSON shape
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            severity: self.severity(),
            message: self.to_string(),
            hints: self.hints(),
            details: self.details(),
        }
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::QualityGate { .. } => 2,
            Self::File { .. } => 6,
            Self::Config { .. } | Self::Validation { .. } | Self::Migration { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for confgate results
pub type Result<T> = std::result::Result<T, ConfgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_details_count_violations_once() {
        let violations = vec![
            ValidationIssue::new("version", "is required", Severity::Critical),
            ValidationIssue::new("model", "must be a string", Severity::Error),
        ];
        let err = ConfgateError::config_invalid(
            "invalid configuration",
            None,
            violations,
            vec!["Add missing field: version".to_string()],
        );

        let details = err.details();
        assert_eq!(details["errorCount"], 2);
        assert_eq!(details["errors"].as_array().unwrap().len(), 2);
        assert_eq!(details["fixes"][0], "Add missing field: version");
    }

    #[test]
    fn test_codes_and_severities() {
        assert_eq!(ConfgateError::config("x").code(), "CONFIG_ERROR");
        assert_eq!(ConfgateError::config("x").severity(), Severity::Critical);
        assert_eq!(
            ConfgateError::rule("r", "a.js", "boom").severity(),
            Severity::Warn
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ConfgateError::file("a.json", "read", io).code(), "FILE_ERROR");
    }

    #[test]
    fn test_report_serializes_stable_shape() {
        let err = ConfgateError::config_with_path("missing", "/tmp/config.json");
        let report = serde_json::to_value(err.report()).unwrap();

        assert_eq!(report["code"], "CONFIG_ERROR");
        assert_eq!(report["severity"], "critical");
        assert!(report["message"].as_str().unwrap().contains("missing"));
        assert!(report["hints"]
            .as_array()
            .unwrap()
            .iter()
            .any(|h| h.as_str().unwrap().contains("/tmp/config.json")));
        assert_eq!(report["details"]["path"], "/tmp/config.json");
    }

    #[test]
    fn test_file_error_display_includes_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfgateError::file("/etc/x.json", "write", io);
        let text = err.to_string();
        assert!(text.contains("/etc/x.json"));
        assert!(text.contains("write"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ConfgateError::config("x").exit_code(), 7);
        let io = std::io::Error::other("x");
        assert_eq!(ConfgateError::from(io).exit_code(), 1);
    }
}
