//! In-memory rule catalogue keyed by rule id.
//!
//! The registry is an explicit value owned by the caller and lent to
//! [`QualityGate`](super::gate::QualityGate) by reference. Lookups for
//! unknown ids never fail; they return `None` or do nothing.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::builtin::{builtin_rules, PatternCheck};
use super::rule::{QualityRule, RuleConfig, RuleSpec};
use crate::severity::Severity;

/// Combinable filter for [`RuleRegistry::get_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub enabled: Option<bool>,
    pub severity: Option<Severity>,
    pub category: Option<String>,
}

impl RuleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    fn matches(&self, rule: &QualityRule) -> bool {
        self.enabled.is_none_or(|e| rule.enabled == e)
            && self.severity.is_none_or(|s| rule.severity == s)
            && self
                .category
                .as_deref()
                .is_none_or(|c| rule.category.as_deref() == Some(c))
    }
}

/// One entry of a rule file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleFileEntry {
    id: String,
    name: Option<String>,
    severity: Option<Severity>,
    enabled: Option<bool>,
    config: Option<RuleConfig>,
    category: Option<String>,
    /// Regex for a data-driven rule.
    pattern: Option<String>,
    #[serde(default)]
    extensions: Vec<String>,
    message: Option<String>,
    /// Id of an existing rule whose check this rule reuses.
    extends: Option<String>,
}

/// Rule catalogue in registration order.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<QualityRule>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in rules.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (id, spec) in builtin_rules() {
            registry.register(id, spec);
        }
        registry
    }

    /// Register a rule, overwriting any rule with the same id in place.
    pub fn register(&mut self, id: impl Into<String>, spec: RuleSpec) {
        self.insert(spec.into_rule(id));
    }

    fn insert(&mut self, rule: QualityRule) {
        debug!(rule = %rule.id, severity = %rule.severity, enabled = rule.enabled, "Registered rule");
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(slot) => *slot = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn get(&self, id: &str) -> Option<&QualityRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// All rules matching `filter`; every rule, disabled ones included, when
    /// `filter` is `None`.
    pub fn get_all(&self, filter: Option<&RuleFilter>) -> Vec<&QualityRule> {
        self.rules
            .iter()
            .filter(|r| filter.is_none_or(|f| f.matches(r)))
            .collect()
    }

    /// Rule ids in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Enable or disable a rule. No-op for unknown ids.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) {
        if let Some(rule) = self.rules.iter_mut().find(|r| r.id == id) {
            rule.enabled = enabled;
        }
    }

    /// Shallow-merge `patch` into a rule's configuration. No-op for unknown ids.
    pub fn update_config(&mut self, id: &str, patch: &RuleConfig) {
        if let Some(rule) = self.rules.iter_mut().find(|r| r.id == id) {
            rule.merge_config(patch);
        }
    }

    /// Load rule definitions from a JSON, YAML or TOML file of shape
    /// `{rules: [...]}`.
    ///
    /// Missing files, unparseable documents and unusable entries are
    /// skipped. Returns the number of entries applied.
    pub fn load_from_file(&mut self, path: &Path) -> usize {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Rule file not found, skipping");
                return 0;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read rule file");
                return 0;
            }
        };

        let document = match parse_rule_document(path, &content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse rule file");
                return 0;
            }
        };

        let Some(entries) = document.get("rules").and_then(Value::as_array) else {
            warn!(path = %path.display(), "Rule file has no `rules` array");
            return 0;
        };

        let mut applied = 0;
        for (index, raw) in entries.iter().enumerate() {
            let entry = match RuleFileEntry::deserialize(raw) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %path.display(), index, error = %e, "Skipping malformed rule entry");
                    continue;
                }
            };
            let id = entry.id.clone();
            match self.apply_entry(entry) {
                Ok(()) => applied += 1,
                Err(reason) => {
                    warn!(path = %path.display(), rule = %id, reason = %reason, "Skipping rule entry");
                }
            }
        }

        info!(path = %path.display(), applied, total = entries.len(), "Loaded rule file");
        applied
    }

    fn apply_entry(&mut self, entry: RuleFileEntry) -> Result<(), String> {
        if let Some(pattern) = entry.pattern.as_deref() {
            let check = PatternCheck::new(pattern, entry.extensions.clone(), entry.message.clone())
                .map_err(|e| e.to_string())?;
            let mut spec = RuleSpec::new(check);
            spec.name = entry.name;
            spec.severity = entry.severity;
            spec.enabled = entry.enabled;
            spec.config = entry.config;
            spec.category = entry.category.or_else(|| Some("custom".to_string()));
            self.register(entry.id, spec);
            return Ok(());
        }

        if let Some(base_id) = entry.extends.as_deref() {
            let base = self
                .get(base_id)
                .cloned()
                .ok_or_else(|| format!("extends unknown rule '{}'", base_id))?;
            let mut rule = QualityRule {
                id: entry.id.clone(),
                name: entry.name.unwrap_or_else(|| entry.id.clone()),
                severity: entry.severity.unwrap_or(base.severity),
                enabled: entry.enabled.unwrap_or(true),
                config: base.config,
                category: entry.category.or(base.category),
                check: Arc::clone(&base.check),
            };
            if let Some(patch) = &entry.config {
                rule.merge_config(patch);
            }
            self.insert(rule);
            return Ok(());
        }

        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == entry.id)
            .ok_or_else(|| "unknown rule without `pattern` or `extends`".to_string())?;
        if let Some(name) = entry.name {
            rule.name = name;
        }
        if let Some(severity) = entry.severity {
            rule.severity = severity;
        }
        if let Some(enabled) = entry.enabled {
            rule.enabled = enabled;
        }
        if let Some(category) = entry.category {
            rule.category = Some(category);
        }
        if let Some(patch) = &entry.config {
            rule.merge_config(patch);
        }
        Ok(())
    }
}

fn parse_rule_document(path: &Path, content: &str) -> anyhow::Result<Value> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    Ok(match ext.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_json::from_str(content)?,
    })
}
