//! Document validation against the schema set.
//!
//! The [`Validator`] sits in front of a [`SchemaBackend`] chosen at
//! construction time:
//!
//! - [`JsonSchemaBackend`] - full JSON Schema engine (feature `schema-engine`)
//! - [`FallbackBackend`] - minimal hand-written checks
//!
//! Both report violations as [`ValidationIssue`]s; the validator sorts them
//! into `errors` and `warnings` and collects the suggested fixes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use super::{SchemaName, VERSION_PATTERN};
use crate::error::{ConfgateError, Result};
use crate::severity::Severity;

// ============================================================================
// Validation Result Types
// ============================================================================

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted/bracketed locator of the field, or `"root"`.
    pub path: String,
    /// Human-readable description.
    pub message: String,
    /// Severity of the violation.
    pub severity: Severity,
    /// The constraint that was violated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// The offending value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    /// One-line remediation suggestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue.
    pub fn new(path: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity,
            expected: None,
            actual: None,
            fix: None,
        }
    }

    /// Record the violated constraint.
    #[must_use]
    pub fn with_expected(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Record the offending value.
    #[must_use]
    pub fn with_actual(mut self, actual: Value) -> Self {
        self.actual = Some(actual);
        self
    }

    /// Add a suggested fix.
    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    /// Format as a string for display.
    #[must_use]
    pub fn format(&self) -> String {
        match &self.fix {
            Some(fix) => format!("[{}] {}: {} ({})", self.severity, self.path, self.message, fix),
            None => format!("[{}] {}: {}", self.severity, self.path, self.message),
        }
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// True iff the backend reported no violations at all.
    pub valid: bool,
    /// Violations at `error` or `critical`.
    pub errors: Vec<ValidationIssue>,
    /// Violations at `info` or `warn`.
    pub warnings: Vec<ValidationIssue>,
    /// Suggested fixes, in violation order.
    pub fixes: Vec<String>,
}

impl ValidationOutcome {
    /// Build an outcome from raw backend violations.
    #[must_use]
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let valid = issues.is_empty();
        let fixes = issues.iter().filter_map(|i| i.fix.clone()).collect();
        let (warnings, errors) = issues.into_iter().partition(|i| i.severity.is_advisory());
        Self {
            valid,
            errors,
            warnings,
            fixes,
        }
    }

    /// Issues at exactly the given severity, from either bucket.
    #[must_use]
    pub fn with_severity(&self, severity: Severity) -> Vec<&ValidationIssue> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(|i| i.severity == severity)
            .collect()
    }

    /// All issues, errors first.
    #[must_use]
    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .cloned()
            .collect()
    }

    /// Generate a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.valid {
            "Configuration is valid.".to_string()
        } else if self.errors.is_empty() {
            format!(
                "Configuration has {} warning(s).",
                self.warnings.len()
            )
        } else {
            format!(
                "Configuration is invalid with {} error(s) and {} warning(s).",
                self.errors.len(),
                self.warnings.len()
            )
        }
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Capability interface for schema validation engines.
pub trait SchemaBackend: Send + Sync {
    /// Returns the display name of this backend.
    fn name(&self) -> &'static str;

    /// Check `document` against `schema`, returning every violation found.
    fn check(&self, document: &Value, schema: SchemaName) -> Vec<ValidationIssue>;
}

fn version_regex() -> Option<&'static Regex> {
    static VERSION: OnceLock<Option<Regex>> = OnceLock::new();
    VERSION.get_or_init(|| Regex::new(VERSION_PATTERN).ok()).as_ref()
}

/// Minimal hand-written checks used when no schema engine is available.
///
/// Only the document shape and the configuration `version` are checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackBackend;

impl SchemaBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn check(&self, document: &Value, schema: SchemaName) -> Vec<ValidationIssue> {
        let Some(map) = document.as_object() else {
            return vec![ValidationIssue::new(
                "root",
                "Document must be an object",
                Severity::Critical,
            )
            .with_expected(Value::String("object".to_string()))
            .with_actual(document.clone())
            .with_fix("Wrap the configuration in a JSON object: { ... }")];
        };

        if schema != SchemaName::Config {
            return Vec::new();
        }

        match map.get("version") {
            None => vec![ValidationIssue::new(
                "version",
                "Missing required field: version",
                Severity::Critical,
            )
            .with_expected(Value::String("version".to_string()))
            .with_fix("Add missing field: version")],
            Some(Value::String(v)) if version_regex().is_some_and(|re| re.is_match(v)) => {
                Vec::new()
            }
            Some(other) => vec![ValidationIssue::new(
                "version",
                "Version must be a semantic version string",
                Severity::Error,
            )
            .with_expected(Value::String(VERSION_PATTERN.to_string()))
            .with_actual(other.clone())
            .with_fix("Use semantic version format, e.g. \"1.0.0\"")],
        }
    }
}

/// Full JSON Schema engine backed by the `jsonschema` crate.
///
/// Each schema is compiled once per process and reused.
#[cfg(feature = "schema-engine")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaBackend;

#[cfg(feature = "schema-engine")]
struct CompiledSchema {
    raw: Value,
    validator: Option<jsonschema::Validator>,
}

#[cfg(feature = "schema-engine")]
impl JsonSchemaBackend {
    fn compiled(schema: SchemaName) -> &'static CompiledSchema {
        static CONFIG: OnceLock<CompiledSchema> = OnceLock::new();
        static SETTINGS: OnceLock<CompiledSchema> = OnceLock::new();
        static QUALITY_GATE: OnceLock<CompiledSchema> = OnceLock::new();

        let cell = match schema {
            SchemaName::Config => &CONFIG,
            SchemaName::Settings => &SETTINGS,
            SchemaName::QualityGate => &QUALITY_GATE,
        };

        cell.get_or_init(|| {
            let raw = schema.document();
            let validator = match jsonschema::options()
                .with_draft(jsonschema::Draft::Draft7)
                .build(&raw)
            {
                Ok(v) => {
                    debug!(schema = %schema, "Compiled schema");
                    Some(v)
                }
                Err(e) => {
                    tracing::warn!(schema = %schema, error = %e, "Schema failed to compile, using fallback checks");
                    None
                }
            };
            CompiledSchema { raw, validator }
        })
    }
}

#[cfg(feature = "schema-engine")]
impl SchemaBackend for JsonSchemaBackend {
    fn name(&self) -> &'static str {
        "jsonschema"
    }

    fn check(&self, document: &Value, schema: SchemaName) -> Vec<ValidationIssue> {
        let compiled = Self::compiled(schema);
        let Some(validator) = compiled.validator.as_ref() else {
            return FallbackBackend.check(document, schema);
        };

        validator
            .iter_errors(document)
            .map(|err| {
                map_engine_error(
                    document,
                    &compiled.raw,
                    &err.instance_path.to_string(),
                    &err.schema_path.to_string(),
                    err.to_string(),
                )
            })
            .collect()
    }
}

// ============================================================================
// Engine error mapping
// ============================================================================

/// Severity assigned to a violated schema keyword.
#[must_use]
pub fn keyword_severity(keyword: &str) -> Severity {
    match keyword {
        "required" => Severity::Critical,
        "type" | "enum" => Severity::Error,
        "pattern" | "format" => Severity::Warn,
        "minimum" | "maximum" | "minLength" | "maxLength" => Severity::Warn,
        _ => Severity::Warn,
    }
}

/// One-line fix suggestion for a violated schema keyword.
#[must_use]
pub fn keyword_fix(keyword: &str, locator: &str, expected: Option<&Value>) -> Option<String> {
    let shown = |v: Option<&Value>| v.map(display_value).unwrap_or_default();
    match keyword {
        "required" => Some(format!("Add missing field: {}", locator)),
        "type" => Some(format!("Change {} to type {}", locator, shown(expected))),
        "enum" => {
            let options = expected
                .and_then(Value::as_array)
                .map(|values| values.iter().map(display_value).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            Some(format!("Value must be one of: {}", options))
        }
        "pattern" => Some(format!("Value must match pattern: {}", shown(expected))),
        "format" => Some(format!("Value must be a valid {}", shown(expected))),
        "minimum" => Some(format!("Value must be >= {}", shown(expected))),
        "maximum" => Some(format!("Value must be <= {}", shown(expected))),
        "minLength" => Some(format!("Must be at least {} characters", shown(expected))),
        "maxLength" => Some(format!("Must be at most {} characters", shown(expected))),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn map_engine_error(
    document: &Value,
    schema: &Value,
    instance_path: &str,
    schema_path: &str,
    message: String,
) -> ValidationIssue {
    let keyword = schema_path.rsplit('/').next().unwrap_or_default();
    let severity = keyword_severity(keyword);
    let expected = schema.pointer(schema_path).cloned();

    if keyword == "required" {
        let field = required_field(&message);
        let pointer = format!("{}/{}", instance_path, field.replace('~', "~0").replace('/', "~1"));
        let locator = pointer_to_locator(document, &pointer);
        let fix = keyword_fix(keyword, &locator, None);
        let mut issue = ValidationIssue::new(
            locator,
            format!("Missing required field: {}", field),
            severity,
        )
        .with_expected(Value::String(field));
        issue.fix = fix;
        return issue;
    }

    let locator = pointer_to_locator(document, instance_path);
    let fix = keyword_fix(keyword, &locator, expected.as_ref());
    let mut issue = ValidationIssue::new(locator, message, severity);
    issue.expected = expected;
    issue.actual = document.pointer(instance_path).cloned();
    issue.fix = fix;
    issue
}

/// Extract the property name from a `"name" is a required property` message.
fn required_field(message: &str) -> String {
    static REQUIRED: OnceLock<Option<Regex>> = OnceLock::new();
    REQUIRED
        .get_or_init(|| Regex::new(r#"^"((?:[^"\\]|\\.)*)" is a required property"#).ok())
        .as_ref()
        .and_then(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| message.to_string())
}

/// Convert a JSON pointer into a dotted/bracketed locator.
///
/// `/agents/reviewer/role` becomes `agents.reviewer.role`, `/skills/1`
/// becomes `skills[1]`, and the empty pointer becomes `root`.
#[must_use]
pub fn pointer_to_locator(document: &Value, pointer: &str) -> String {
    if pointer.is_empty() || pointer == "/" {
        return "root".to_string();
    }

    let mut locator = String::new();
    let mut current = Some(document);

    for raw in pointer.trim_start_matches('/').split('/') {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        match current {
            Some(Value::Array(items)) => {
                locator.push_str(&format!("[{}]", segment));
                current = segment.parse::<usize>().ok().and_then(|i| items.get(i));
            }
            other => {
                if !locator.is_empty() {
                    locator.push('.');
                }
                locator.push_str(&segment);
                current = other.and_then(|v| v.get(&segment));
            }
        }
    }

    locator
}

// ============================================================================
// Validator
// ============================================================================

/// Validates documents against the schema set.
pub struct Validator {
    backend: Box<dyn SchemaBackend>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Validator {
    /// Create a validator using the best available backend.
    #[must_use]
    pub fn new() -> Self {
        #[cfg(feature = "schema-engine")]
        {
            Self::with_backend(Box::new(JsonSchemaBackend))
        }
        #[cfg(not(feature = "schema-engine"))]
        {
            Self::fallback()
        }
    }

    /// Create a validator using only the minimal fallback checks.
    #[must_use]
    pub fn fallback() -> Self {
        Self::with_backend(Box::new(FallbackBackend))
    }

    /// Create a validator with an explicit backend.
    #[must_use]
    pub fn with_backend(backend: Box<dyn SchemaBackend>) -> Self {
        Self { backend }
    }

    /// Name of the active backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Validate `document` against the schema named `schema`.
    ///
    /// Unknown schema names yield a single critical issue at path `schema`;
    /// this never fails.
    #[must_use]
    pub fn validate(&self, document: &Value, schema: &str) -> ValidationOutcome {
        match schema.parse::<SchemaName>() {
            Ok(name) => self.validate_schema(document, name),
            Err(message) => ValidationOutcome::from_issues(vec![ValidationIssue::new(
                "schema",
                message,
                Severity::Critical,
            )
            .with_actual(Value::String(schema.to_string()))
            .with_fix("Use one of: config, settings, quality-gate")]),
        }
    }

    /// Validate `document` against a known schema.
    #[must_use]
    pub fn validate_schema(&self, document: &Value, schema: SchemaName) -> ValidationOutcome {
        let issues = self.backend.check(document, schema);
        debug!(
            schema = %schema,
            backend = self.backend.name(),
            issues = issues.len(),
            "Validated document"
        );
        ValidationOutcome::from_issues(issues)
    }

    /// Validate a file on disk, detecting the schema from its name when
    /// `schema` is `None`.
    ///
    /// A missing file or malformed JSON, including bytes that are not UTF-8,
    /// is reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error for any other read failure.
    pub fn validate_file(&self, path: &Path, schema: Option<&str>) -> Result<ValidationOutcome> {
        let schema = schema
            .map(str::to_string)
            .unwrap_or_else(|| SchemaName::detect(path).as_str().to_string());

        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ValidationOutcome::from_issues(vec![ValidationIssue::new(
                    "root",
                    format!("File not found: {}", path.display()),
                    Severity::Critical,
                )
                .with_fix(format!("create config at {}", path.display()))]));
            }
            Err(e) => return Err(ConfgateError::file(path, "read", e)),
        };

        match serde_json::from_slice::<Value>(&content) {
            Ok(document) => Ok(self.validate(&document, &schema)),
            Err(e) => {
                let fix = if e.line() > 0 {
                    format!(
                        "Fix JSON syntax at line {}, column {}",
                        e.line(),
                        e.column()
                    )
                } else {
                    "Check JSON syntax: missing commas, brackets or quotes".to_string()
                };
                Ok(ValidationOutcome::from_issues(vec![ValidationIssue::new(
                    "root",
                    format!("Invalid JSON: {}", e),
                    Severity::Critical,
                )
                .with_fix(fix)]))
            }
        }
    }

    /// Validate and return the same document, or fail with the full list of
    /// violations and fixes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfgateError::Config`] when the document is invalid.
    pub fn validate_or_throw<'a>(&self, document: &'a Value, schema: &str) -> Result<&'a Value> {
        let outcome = self.validate(document, schema);
        if outcome.valid {
            return Ok(document);
        }

        let count = outcome.errors.len() + outcome.warnings.len();
        Err(ConfgateError::config_invalid(
            format!("{} document failed validation with {} issue(s)", schema, count),
            None,
            outcome.issues(),
            outcome.fixes,
        ))
    }
}
