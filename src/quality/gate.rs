//! The quality gate: runs rules over a file set and decides pass/fail.
//!
//! A run proceeds in fixed stages:
//!
//! 1. Resolve the file set (explicit list, or a bounded project scan)
//! 2. Resolve the active rules (explicit list, or registry + overrides)
//! 3. Run every rule on every file, turning rule errors into result rows
//! 4. Tally the summary
//! 5. Optionally apply automatic fixes
//! 6. Decide `passed` against the severity threshold
//! 7. Hand the finished result to the reporters

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::builtin::extension_of;
use super::config::GateConfig;
use super::registry::RuleRegistry;
use super::reporters::{self, Reporter};
use super::rule::QualityRule;
use crate::error::{ConfgateError, Result};
use crate::severity::Severity;

/// Maximum directory depth of a project scan.
pub const MAX_SCAN_DEPTH: usize = 10;

/// Directories never entered by a project scan.
pub const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    "coverage",
    ".nyc_output",
    ".cache",
    "vendor",
];

/// Extensions a project scan picks up.
pub const SCANNED_EXTENSIONS: &[&str] = &[
    "js", "ts", "jsx", "tsx", "cjs", "mjs", "json", "md", "py", "go", "rs",
];

// ============================================================================
// Result Types
// ============================================================================

/// Result of one rule on one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub file: PathBuf,
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    pub pass: bool,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub auto_fix: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RuleResult {
    /// A non-skipped, non-passing result.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.pass && !self.skip
    }
}

/// Per-severity tally of failing results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateSummary {
    /// Number of recorded results.
    pub total: usize,
    pub critical: usize,
    pub error: usize,
    pub warn: usize,
    pub info: usize,
    pub files_checked: usize,
    pub rules_run: usize,
    /// Files rewritten by the fix pass, when one ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<usize>,
}

impl GateSummary {
    fn tally(results: &[RuleResult], files_checked: usize, rules_run: usize) -> Self {
        let mut summary = Self {
            total: results.len(),
            files_checked,
            rules_run,
            ..Self::default()
        };
        for result in results.iter().filter(|r| r.is_failure()) {
            match result.severity {
                Severity::Critical => summary.critical += 1,
                Severity::Error => summary.error += 1,
                Severity::Warn => summary.warn += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary
    }

    /// Failing results across all severities.
    #[must_use]
    pub fn issues(&self) -> usize {
        self.critical + self.error + self.warn + self.info
    }
}

/// Finished gate run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub passed: bool,
    pub results: Vec<RuleResult>,
    pub summary: GateSummary,
    /// Blocking threshold used for the decision.
    pub threshold: Severity,
    pub project_dir: PathBuf,
    pub duration_ms: u64,
}

impl GateResult {
    fn disabled(project_dir: &Path, threshold: Severity) -> Self {
        Self {
            passed: true,
            results: Vec::new(),
            summary: GateSummary::default(),
            threshold,
            project_dir: project_dir.to_path_buf(),
            duration_ms: 0,
        }
    }

    /// Failing results at or above the threshold.
    pub fn blocking(&self) -> impl Iterator<Item = &RuleResult> {
        self.results
            .iter()
            .filter(move |r| r.is_failure() && r.severity.meets(self.threshold))
    }

    #[must_use]
    pub fn blocking_count(&self) -> usize {
        self.blocking().count()
    }

    /// Failing results.
    pub fn failures(&self) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    /// Display form of `file` relative to the project directory.
    #[must_use]
    pub fn relative_path(&self, file: &Path) -> String {
        file.strip_prefix(&self.project_dir)
            .unwrap_or(file)
            .display()
            .to_string()
    }

    /// Failing results grouped by relative path, in path order.
    #[must_use]
    pub fn failures_by_file(&self) -> BTreeMap<String, Vec<&RuleResult>> {
        let mut grouped: BTreeMap<String, Vec<&RuleResult>> = BTreeMap::new();
        for result in self.failures() {
            grouped
                .entry(self.relative_path(&result.file))
                .or_default()
                .push(result);
        }
        grouped
    }
}

// ============================================================================
// Check Options
// ============================================================================

/// Options for a single gate run.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Files to check instead of scanning the project.
    pub files: Option<Vec<PathBuf>>,
    /// Blocking threshold; defaults to the gate configuration's.
    pub severity: Option<Severity>,
    /// Rules to run instead of the registry's.
    pub rules: Option<Vec<QualityRule>>,
    /// Apply automatic fixes.
    pub fix: bool,
}

impl CheckOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = Some(files);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: Vec<QualityRule>) -> Self {
        self.rules = Some(rules);
        self
    }

    #[must_use]
    pub fn with_fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        self
    }
}

// ============================================================================
// Quality Gate
// ============================================================================

/// Runs registry rules over a project.
pub struct QualityGate<'r> {
    project_dir: PathBuf,
    config: GateConfig,
    registry: &'r RuleRegistry,
    reporters: Vec<Box<dyn Reporter>>,
}

impl<'r> QualityGate<'r> {
    /// Create a gate for `project_dir`, loading `.claude/quality-gate.json`
    /// or the built-in default.
    pub fn new(project_dir: impl AsRef<Path>, registry: &'r RuleRegistry) -> Self {
        let project_dir = project_dir.as_ref().to_path_buf();
        let config = GateConfig::load(&project_dir);
        Self::with_config(project_dir, config, registry)
    }

    /// Create a gate with an explicit configuration.
    pub fn with_config(
        project_dir: impl AsRef<Path>,
        config: GateConfig,
        registry: &'r RuleRegistry,
    ) -> Self {
        let reporters = reporters::from_config(&config.reporting);
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
            config,
            registry,
            reporters,
        }
    }

    /// Replace the configured reporters.
    #[must_use]
    pub fn with_reporters(mut self, reporters: Vec<Box<dyn Reporter>>) -> Self {
        self.reporters = reporters;
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Run the gate.
    ///
    /// Rule failures on individual files are recorded as result rows, never
    /// propagated.
    ///
    /// # Errors
    ///
    /// Returns an error if the exclude patterns are invalid or a reporter
    /// fails to write its output.
    pub async fn check(&self, options: CheckOptions) -> Result<GateResult> {
        let threshold = options.severity.unwrap_or(self.config.severity);

        if !self.config.enabled {
            info!(project = %self.project_dir.display(), "Quality gate disabled, skipping");
            return Ok(GateResult::disabled(&self.project_dir, threshold));
        }

        let start = Instant::now();
        let files = match options.files {
            Some(files) => files
                .into_iter()
                .map(|f| {
                    if f.is_absolute() {
                        f
                    } else {
                        self.project_dir.join(f)
                    }
                })
                .collect(),
            None => self.scan_files()?,
        };
        let rules = self.active_rules(options.rules);

        info!(
            files = files.len(),
            rules = rules.len(),
            threshold = %threshold,
            "Running quality gate"
        );

        let mut results = Vec::new();
        for file in &files {
            for rule in &rules {
                match rule.run(&self.project_dir, file).await {
                    Ok(outcome) if outcome.skip => {}
                    Ok(outcome) => results.push(RuleResult {
                        file: file.clone(),
                        rule_id: rule.id.clone(),
                        rule_name: rule.name.clone(),
                        severity: rule.severity,
                        message: outcome.message,
                        pass: outcome.pass,
                        skip: false,
                        auto_fix: outcome.auto_fix,
                        fix: outcome.fix,
                        details: outcome.details,
                    }),
                    Err(e) => {
                        let err = ConfgateError::rule(&rule.id, file, e.to_string());
                        warn!(rule = %rule.id, file = %file.display(), error = %e, "Rule check failed");
                        results.push(RuleResult {
                            file: file.clone(),
                            rule_id: rule.id.clone(),
                            rule_name: rule.name.clone(),
                            severity: Severity::Error,
                            message: err.to_string(),
                            pass: false,
                            skip: false,
                            auto_fix: false,
                            fix: err.hints().into_iter().next(),
                            details: Some(err.details()),
                        });
                    }
                }
            }
        }

        let mut summary = GateSummary::tally(&results, files.len(), rules.len());
        if options.fix {
            summary.fixed = Some(apply_fixes(&results, &rules).await);
        }

        let passed = !results
            .iter()
            .any(|r| r.is_failure() && r.severity.meets(threshold));

        let result = GateResult {
            passed,
            results,
            summary,
            threshold,
            project_dir: self.project_dir.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            passed = result.passed,
            issues = result.summary.issues(),
            blocking = result.blocking_count(),
            duration_ms = result.duration_ms,
            "Quality gate finished"
        );

        for reporter in &self.reporters {
            reporter.report(&result)?;
        }

        Ok(result)
    }

    /// Run the gate and fail with [`ConfgateError::QualityGate`] when it
    /// does not pass.
    ///
    /// # Errors
    ///
    /// Returns the failing result wrapped in an error, or any error from
    /// [`check`](Self::check).
    pub async fn check_or_throw(&self, options: CheckOptions) -> Result<GateResult> {
        let result = self.check(options).await?;
        if result.passed {
            Ok(result)
        } else {
            Err(ConfgateError::QualityGate {
                result: Box::new(result),
            })
        }
    }

    /// Registry rules with this gate's overrides applied, enabled only.
    ///
    /// Overrides are applied to copies; the registry is not modified.
    fn active_rules(&self, explicit: Option<Vec<QualityRule>>) -> Vec<QualityRule> {
        let rules = match explicit {
            Some(rules) => rules,
            None => self
                .registry
                .get_all(None)
                .into_iter()
                .map(|rule| {
                    let mut rule = rule.clone();
                    if let Some(over) = self.config.override_for(&rule.id) {
                        if let Some(enabled) = over.enabled {
                            rule.enabled = enabled;
                        }
                        if let Some(severity) = over.severity {
                            rule.severity = severity;
                        }
                        if let Some(patch) = &over.config {
                            rule.merge_config(patch);
                        }
                    }
                    rule
                })
                .collect(),
        };
        rules.into_iter().filter(|r| r.enabled).collect()
    }

    /// Scan the project for checkable files, sorted by path.
    fn scan_files(&self) -> Result<Vec<PathBuf>> {
        let exclude = build_exclude_set(&self.config.exclude)?;

        let mut files: Vec<PathBuf> = WalkDir::new(&self.project_dir)
            .max_depth(MAX_SCAN_DEPTH)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && e.file_name()
                            .to_str()
                            .is_some_and(|name| IGNORED_DIRS.contains(&name)))
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| {
                extension_of(path).is_some_and(|ext| SCANNED_EXTENSIONS.contains(&ext.as_str()))
            })
            .filter(|path| {
                let relative = path.strip_prefix(&self.project_dir).unwrap_or(path);
                !exclude.is_match(relative)
            })
            .collect();

        files.sort();
        debug!(count = files.len(), "Scanned project files");
        Ok(files)
    }
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            ConfgateError::config(format!("Invalid exclude pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfgateError::config(format!("Invalid exclude patterns: {}", e)))
}

/// Apply automatic fixes and return the number of files rewritten.
async fn apply_fixes(results: &[RuleResult], rules: &[QualityRule]) -> usize {
    let mut by_file: BTreeMap<&Path, Vec<&str>> = BTreeMap::new();
    for result in results.iter().filter(|r| r.auto_fix && r.is_failure()) {
        by_file
            .entry(result.file.as_path())
            .or_default()
            .push(result.rule_id.as_str());
    }

    let mut fixed = 0;
    for (file, rule_ids) in by_file {
        let original = match tokio::fs::read_to_string(file).await {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Cannot read file for fixing, skipping");
                continue;
            }
        };

        let mut content = original.clone();
        for rule_id in rule_ids {
            if let Some(rule) = rules.iter().find(|r| r.id == rule_id) {
                if let Some(updated) = rule.check.fix(&content) {
                    content = updated;
                }
            }
        }

        if content == original {
            continue;
        }

        match tokio::fs::write(file, &content).await {
            Ok(()) => {
                debug!(file = %file.display(), "Applied automatic fixes");
                fixed += 1;
            }
            Err(e) => warn!(file = %file.display(), error = %e, "Cannot write fixed file, skipping"),
        }
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::config::RuleOverride;
    use crate::quality::rule::{RuleCheck, RuleContext, RuleOutcome, RuleSpec};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct Exploding;

    #[async_trait]
    impl RuleCheck for Exploding {
        async fn check(&self, file: &Path, _ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
            Err(ConfgateError::rule("exploding", file, "boom"))
        }
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn quiet_gate<'r>(dir: &TempDir, config: GateConfig, registry: &'r RuleRegistry) -> QualityGate<'r> {
        QualityGate::with_config(dir.path(), config, registry).with_reporters(Vec::new())
    }

    #[test]
    fn test_scan_skips_ignored_dirs_and_extensions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/a.js", "a\n");
        write(&dir, "README.md", "a\n");
        write(&dir, "node_modules/pkg/index.js", "a\n");
        write(&dir, ".git/config.json", "{}\n");
        write(&dir, "image.png", "a\n");

        let registry = RuleRegistry::new();
        let gate = quiet_gate(&dir, GateConfig::default(), &registry);
        let files = gate.scan_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("README.md"), PathBuf::from("src/a.js")]);
    }

    #[test]
    fn test_scan_honours_exclude_globs() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/a.js", "a\n");
        write(&dir, "src/generated/b.js", "a\n");

        let registry = RuleRegistry::new();
        let config = GateConfig {
            exclude: vec!["src/generated/**".to_string()],
            ..GateConfig::default()
        };
        let files = quiet_gate(&dir, config, &registry).scan_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/a.js"));
    }

    #[tokio::test]
    async fn test_rule_errors_become_result_rows() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.js", "let a;\n");
        let b = write(&dir, "b.js", "let b;\n");

        let mut registry = RuleRegistry::new();
        registry.register("exploding", RuleSpec::new(Exploding).severity(Severity::Info));
        registry.register("no-empty", RuleSpec::new(crate::quality::builtin::NoEmptyFiles));

        let gate = quiet_gate(&dir, GateConfig::default(), &registry);
        let result = gate
            .check(CheckOptions::new().with_files(vec![a, b]))
            .await
            .unwrap();

        assert_eq!(result.results.len(), 4);
        assert_eq!(result.summary.error, 2);
        assert!(!result.passed);
        let row = result
            .results
            .iter()
            .find(|r| r.rule_id == "exploding")
            .unwrap();
        assert_eq!(row.severity, Severity::Error);
        assert!(row.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_overrides_do_not_mutate_registry() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "a.js", "x\n");

        let registry = RuleRegistry::with_builtins();
        let config = GateConfig {
            rules: vec![RuleOverride::new("no-empty-files").with_severity(Severity::Critical)],
            ..GateConfig::default()
        };
        let gate = quiet_gate(&dir, config, &registry);
        gate.check(CheckOptions::new().with_files(vec![file]))
            .await
            .unwrap();

        assert_eq!(
            registry.get("no-empty-files").unwrap().severity,
            Severity::Warn
        );
    }

    #[tokio::test]
    async fn test_disabled_gate_passes_without_running() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.js", "");

        let registry = RuleRegistry::with_builtins();
        let config = GateConfig {
            enabled: false,
            ..GateConfig::default()
        };
        let result = quiet_gate(&dir, config, &registry)
            .check(CheckOptions::new())
            .await
            .unwrap();
        assert!(result.passed);
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn test_skipped_outcomes_are_not_recorded() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "a.py", "print('x')\n");

        let mut registry = RuleRegistry::new();
        registry.register("no-console-logs", RuleSpec::new(crate::quality::builtin::NoConsoleLogs));
        let result = quiet_gate(&dir, GateConfig::default(), &registry)
            .check(CheckOptions::new().with_files(vec![file]))
            .await
            .unwrap();

        assert!(result.results.is_empty());
        assert_eq!(result.summary.total, 0);
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_fix_strips_trailing_whitespace() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "a.js", "const x = 1;   \n");

        let mut registry = RuleRegistry::new();
        registry.register(
            "no-trailing-whitespace",
            RuleSpec::new(crate::quality::builtin::NoTrailingWhitespace),
        );
        let result = quiet_gate(&dir, GateConfig::default(), &registry)
            .check(CheckOptions::new().with_files(vec![file.clone()]).with_fix(true))
            .await
            .unwrap();

        assert_eq!(result.summary.fixed, Some(1));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "const x = 1;\n");
    }

    #[tokio::test]
    async fn test_check_or_throw_embeds_result() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "a.js", "");

        let mut registry = RuleRegistry::new();
        registry.register("no-empty", RuleSpec::new(crate::quality::builtin::NoEmptyFiles));
        let err = quiet_gate(&dir, GateConfig::default(), &registry)
            .check_or_throw(CheckOptions::new().with_files(vec![file]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "QUALITY_GATE_FAILED");
        assert_eq!(err.details()["warn"], 1);
        assert_eq!(err.details()["passed"], false);
    }
}
