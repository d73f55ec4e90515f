//! Integration tests for the quality gate over real project trees

use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use confgate::config::{ConfigManager, SaveOptions};
use confgate::quality::rule::RuleContext;
use confgate::quality::{
    CheckOptions, GateConfig, QualityGate, RuleCheck, RuleOutcome, RuleOverride, RuleRegistry,
    RuleSpec,
};
use confgate::{ConfgateError, Result, Severity};

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

fn gate<'r>(dir: &TempDir, config: GateConfig, registry: &'r RuleRegistry) -> QualityGate<'r> {
    QualityGate::with_config(dir.path(), config, registry).with_reporters(Vec::new())
}

fn numbered_lines(count: usize) -> String {
    (1..=count).map(|i| format!("const v{} = {};\n", i, i)).collect()
}

#[tokio::test]
async fn test_trailing_whitespace_is_reported_and_fixed() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "src/a.js", "const x = 1;   \n");
    let registry = RuleRegistry::with_builtins();
    let gate = gate(&dir, GateConfig::default(), &registry);

    let result = gate
        .check(CheckOptions::new().with_files(vec![file.clone()]))
        .await
        .unwrap();
    let trailing: Vec<_> = result
        .results
        .iter()
        .filter(|r| r.rule_id == "no-trailing-whitespace")
        .collect();
    assert_eq!(trailing.len(), 1);
    assert!(!trailing[0].pass);
    assert!(trailing[0].auto_fix);
    assert_eq!(result.summary.fixed, None);

    let fixed = gate
        .check(CheckOptions::new().with_files(vec![file.clone()]).with_fix(true))
        .await
        .unwrap();
    assert_eq!(fixed.summary.fixed, Some(1));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "const x = 1;\n");
}

#[tokio::test]
async fn test_line_count_limit_from_gate_override() {
    let dir = TempDir::new().unwrap();
    write(&dir, "big.js", &numbered_lines(850));
    let registry = RuleRegistry::with_builtins();

    let mut config = GateConfig::default();
    config.rules = vec![RuleOverride::new("line-count-limit")
        .with_config(json!({ "maxLines": 800 }).as_object().cloned().unwrap())];

    let result = gate(&dir, config, &registry)
        .check(CheckOptions::new())
        .await
        .unwrap();
    let row = result
        .results
        .iter()
        .find(|r| r.rule_id == "line-count-limit")
        .unwrap();
    assert!(!row.pass);
    assert!(row.message.contains("exceeds"));
    assert!(row.message.contains("800"));
    assert!(!result.passed);
}

#[tokio::test]
async fn test_threshold_decides_pass_fail() {
    let dir = TempDir::new().unwrap();
    write(&dir, "debug.js", &format!("console.log('x');\n{}", numbered_lines(30)));
    let registry = RuleRegistry::with_builtins();

    let mut config = GateConfig::default();
    config.rules = vec![RuleOverride::new("line-count-limit")
        .with_config(json!({ "maxLines": 10 }).as_object().cloned().unwrap())];
    let gate = gate(&dir, config, &registry);

    let critical = gate
        .check(CheckOptions::new().with_severity(Severity::Critical))
        .await
        .unwrap();
    assert!(critical.passed);
    assert_eq!(critical.blocking_count(), 0);
    assert_eq!(critical.summary.warn, 1);
    assert_eq!(critical.summary.error, 1);

    let error = gate
        .check(CheckOptions::new().with_severity(Severity::Error))
        .await
        .unwrap();
    assert!(!error.passed);
    assert_eq!(error.blocking_count(), 1);

    let warn = gate
        .check(CheckOptions::new().with_severity(Severity::Warn))
        .await
        .unwrap();
    assert!(!warn.passed);
    assert_eq!(warn.blocking_count(), 2);
}

struct FailsOn(&'static str);

#[async_trait]
impl RuleCheck for FailsOn {
    async fn check(&self, file: &Path, _ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        if file.ends_with(self.0) {
            Err(ConfgateError::rule("fragile", file, "parser crashed"))
        } else {
            Ok(RuleOutcome::pass("ok"))
        }
    }
}

#[tokio::test]
async fn test_rule_error_is_isolated_to_its_row() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", "# a\n");
    write(&dir, "b.md", "# b\n");
    let mut registry = RuleRegistry::new();
    registry.register("fragile", RuleSpec::new(FailsOn("a.md")).severity(Severity::Info));
    registry.register(
        "no-empty-files",
        RuleSpec::new(confgate::quality::builtin::NoEmptyFiles),
    );

    let result = gate(&dir, GateConfig::default(), &registry)
        .check(CheckOptions::new())
        .await
        .unwrap();

    assert_eq!(result.summary.files_checked, 2);
    assert_eq!(result.results.len(), 4);
    let errored: Vec<_> = result.failures().collect();
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0].rule_id, "fragile");
    assert_eq!(errored[0].severity, Severity::Error);
    assert!(errored[0].message.contains("parser crashed"));
    assert!(!result.passed);
}

#[tokio::test]
async fn test_gate_config_file_and_rule_file_together() {
    let dir = TempDir::new().unwrap();
    write(&dir, "src/app.ts", "// HACK: remove later\nexport const a = 1;\n");
    write(
        &dir,
        ".claude/quality-gate.json",
        r#"{"severity": "error", "rules": [{"id": "no-trailing-whitespace", "enabled": false}]}"#,
    );
    let rules = write(
        &dir,
        "rules.yaml",
        "rules:\n  - id: no-hack\n    pattern: 'HACK'\n    severity: critical\n    extensions: [ts]\n",
    );

    let mut registry = RuleRegistry::with_builtins();
    assert_eq!(registry.load_from_file(&rules), 1);

    let gate = QualityGate::new(dir.path(), &registry).with_reporters(Vec::new());
    assert_eq!(gate.config().severity, Severity::Error);

    let result = gate.check(CheckOptions::new()).await.unwrap();
    assert!(!result.passed);
    assert!(result
        .results
        .iter()
        .all(|r| r.rule_id != "no-trailing-whitespace"));
    let blocking: Vec<_> = result.blocking().map(|r| r.rule_id.as_str()).collect();
    assert_eq!(blocking, vec!["no-hack"]);
}

#[tokio::test]
async fn test_check_or_throw_carries_gate_exit_code() {
    let dir = TempDir::new().unwrap();
    write(&dir, "empty.md", "");
    let registry = RuleRegistry::with_builtins();

    let err = gate(&dir, GateConfig::default(), &registry)
        .check_or_throw(CheckOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "QUALITY_GATE_FAILED");
    assert_eq!(err.exit_code(), 2);
    match err {
        ConfgateError::QualityGate { result } => {
            assert!(result.results.iter().any(|r| r.rule_id == "no-empty-files" && !r.pass));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_binary_file_does_not_fail_the_gate() {
    let dir = TempDir::new().unwrap();
    let logo = dir.path().join("logo.png");
    std::fs::write(&logo, [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a]).unwrap();
    let registry = RuleRegistry::with_builtins();

    let result = gate(&dir, GateConfig::default(), &registry)
        .check(CheckOptions::new().with_files(vec![logo]))
        .await
        .unwrap();
    assert!(result.passed);
    assert_eq!(result.summary.error, 0);
    assert_eq!(result.failures().count(), 0);
}

#[tokio::test]
async fn test_primary_configuration_section_reaches_the_gate() {
    let dir = TempDir::new().unwrap();
    write(&dir, "empty.md", "");
    ConfigManager::for_project(dir.path())
        .save(
            &json!({"version": "1.0.0", "qualityGate": {"enabled": false}}),
            SaveOptions::default(),
        )
        .unwrap();
    let registry = RuleRegistry::with_builtins();

    let gate = QualityGate::new(dir.path(), &registry).with_reporters(Vec::new());
    assert!(!gate.config().enabled);

    let result = gate.check(CheckOptions::new()).await.unwrap();
    assert!(result.passed);
    assert!(result.results.is_empty());
}
