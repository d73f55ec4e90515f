//! Rule model: the [`RuleCheck`] capability and the registered [`QualityRule`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::severity::Severity;

/// Configuration bag for a single rule.
pub type RuleConfig = Map<String, Value>;

/// Context handed to a rule check.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Root of the project being checked.
    pub project_dir: &'a Path,
    /// The rule's effective configuration.
    pub config: &'a RuleConfig,
}

impl<'a> RuleContext<'a> {
    /// Create a new context.
    pub fn new(project_dir: &'a Path, config: &'a RuleConfig) -> Self {
        Self {
            project_dir,
            config,
        }
    }

    /// Read an unsigned integer option, falling back to `default`.
    #[must_use]
    pub fn u64_option(&self, key: &str, default: u64) -> u64 {
        self.config
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    /// Read a string option.
    #[must_use]
    pub fn str_option(&self, key: &str) -> Option<&'a str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

/// Outcome of running one rule against one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    /// Whether the file satisfies the rule.
    pub pass: bool,
    /// Human-readable message.
    pub message: String,
    /// The rule does not apply to this file.
    #[serde(default)]
    pub skip: bool,
    /// The violation can be fixed automatically with [`RuleCheck::fix`].
    #[serde(default)]
    pub auto_fix: bool,
    /// Manual remediation hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    /// Rule-specific measurements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RuleOutcome {
    /// Create a passing outcome.
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            pass: true,
            message: message.into(),
            ..Default::default()
        }
    }

    /// Create a failing outcome.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            pass: false,
            message: message.into(),
            ..Default::default()
        }
    }

    /// Create a skipped outcome. Skips never count as failures.
    pub fn skip(message: impl Into<String>) -> Self {
        Self {
            pass: true,
            skip: true,
            message: message.into(),
            ..Default::default()
        }
    }

    /// Add a manual remediation hint.
    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    /// Mark the outcome as automatically fixable.
    #[must_use]
    pub fn auto_fixable(mut self) -> Self {
        self.auto_fix = true;
        self
    }

    /// Attach rule-specific details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// A check applied to one file.
///
/// Implementations must return an error, not a passing outcome, when the
/// target file does not exist; the gate turns errors into result rows.
#[async_trait]
pub trait RuleCheck: Send + Sync {
    /// Check `file` under the given context.
    async fn check(&self, file: &Path, ctx: &RuleContext<'_>) -> Result<RuleOutcome>;

    /// Transform file content to fix the violation, if this rule supports it.
    fn fix(&self, _content: &str) -> Option<String> {
        None
    }
}

/// A rule as stored in the registry.
#[derive(Clone)]
pub struct QualityRule {
    pub id: String,
    pub name: String,
    pub severity: Severity,
    pub enabled: bool,
    pub config: RuleConfig,
    pub category: Option<String>,
    pub check: Arc<dyn RuleCheck>,
}

impl fmt::Debug for QualityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityRule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("enabled", &self.enabled)
            .field("config", &self.config)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

impl QualityRule {
    /// Run this rule's check against `file`.
    ///
    /// # Errors
    ///
    /// Propagates whatever the check returns.
    pub async fn run(&self, project_dir: &Path, file: &Path) -> Result<RuleOutcome> {
        let ctx = RuleContext::new(project_dir, &self.config);
        self.check.check(file, &ctx).await
    }

    /// Shallow-merge `patch` into this rule's configuration.
    pub fn merge_config(&mut self, patch: &RuleConfig) {
        for (key, value) in patch {
            self.config.insert(key.clone(), value.clone());
        }
    }
}

/// Registration request for a rule. Unset fields take registry defaults.
#[derive(Clone)]
pub struct RuleSpec {
    pub name: Option<String>,
    pub severity: Option<Severity>,
    pub enabled: Option<bool>,
    pub config: Option<RuleConfig>,
    pub category: Option<String>,
    pub check: Arc<dyn RuleCheck>,
}

impl RuleSpec {
    /// Wrap a check implementation.
    pub fn new(check: impl RuleCheck + 'static) -> Self {
        Self::from_arc(Arc::new(check))
    }

    /// Wrap a shared check implementation.
    pub fn from_arc(check: Arc<dyn RuleCheck>) -> Self {
        Self {
            name: None,
            severity: None,
            enabled: None,
            config: None,
            category: None,
            check,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn config(mut self, config: RuleConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Resolve defaults into a concrete rule.
    #[must_use]
    pub fn into_rule(self, id: impl Into<String>) -> QualityRule {
        let id = id.into();
        QualityRule {
            name: self.name.unwrap_or_else(|| id.clone()),
            severity: self.severity.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            config: self.config.unwrap_or_default(),
            category: self.category,
            check: self.check,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct AlwaysPass;

    #[async_trait]
    impl RuleCheck for AlwaysPass {
        async fn check(&self, _file: &Path, _ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
            Ok(RuleOutcome::pass("ok"))
        }
    }

    #[test]
    fn test_spec_defaults() {
        let rule = RuleSpec::new(AlwaysPass).into_rule("my-rule");
        assert_eq!(rule.name, "my-rule");
        assert_eq!(rule.severity, Severity::Warn);
        assert!(rule.enabled);
        assert!(rule.config.is_empty());
        assert!(rule.category.is_none());
    }

    #[test]
    fn test_spec_explicit_false_is_honoured() {
        let rule = RuleSpec::new(AlwaysPass).enabled(false).into_rule("r");
        assert!(!rule.enabled);
    }

    #[test]
    fn test_merge_config_is_shallow() {
        let mut config = RuleConfig::new();
        config.insert("maxLines".into(), json!(500));
        config.insert("nested".into(), json!({"a": 1, "b": 2}));
        let mut rule = RuleSpec::new(AlwaysPass).config(config).into_rule("r");

        let mut patch = RuleConfig::new();
        patch.insert("nested".into(), json!({"a": 9}));
        rule.merge_config(&patch);

        assert_eq!(rule.config["maxLines"], json!(500));
        assert_eq!(rule.config["nested"], json!({"a": 9}));
    }

    #[test]
    fn test_skip_is_not_a_failure() {
        let outcome = RuleOutcome::skip("not applicable");
        assert!(outcome.pass);
        assert!(outcome.skip);
    }

    #[tokio::test]
    async fn test_run_passes_config_through_context() {
        struct ReadsConfig;

        #[async_trait]
        impl RuleCheck for ReadsConfig {
            async fn check(&self, _file: &Path, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
                Ok(RuleOutcome::pass(ctx.u64_option("limit", 0).to_string()))
            }
        }

        let mut config = RuleConfig::new();
        config.insert("limit".into(), json!(7));
        let rule = RuleSpec::new(ReadsConfig).config(config).into_rule("r");
        let outcome = rule.run(Path::new("."), Path::new("x")).await.unwrap();
        assert_eq!(outcome.message, "7");
    }
}
