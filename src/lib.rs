//! Confgate - Project Configuration Governance
//!
//! Schema validation, pluggable quality rules with a severity-thresholded
//! gate, and a versioned lifecycle for the primary configuration document.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`schema`] - Schema set and document validation
//! - [`error`] - Error taxonomy with codes, severities and remediation hints
//! - [`severity`] - The four-level severity scale
//! - [`quality`] - Quality rules, rule registry, quality gate and reporters
//! - [`config`] - Configuration load/save, backups, rollback, diff and history
//!
//! # Example
//!
//! ```rust,ignore
//! use confgate::config::{ConfigManager, LoadOptions};
//! use confgate::quality::{CheckOptions, GateConfig, QualityGate, RuleRegistry};
//!
//! // Load project configuration
//! let manager = ConfigManager::for_project(".");
//! let config = manager.load(LoadOptions::default().with_strict(true))?;
//!
//! // Run the quality gate before committing
//! let registry = RuleRegistry::with_builtins();
//! let project = std::path::Path::new(".");
//! let gate = QualityGate::with_config(project, GateConfig::load(project), &registry);
//! let result = gate.check(CheckOptions::new()).await?;
//! ```

pub mod config;
pub mod error;
pub mod quality;
pub mod schema;
pub mod severity;

// Re-export commonly used types
pub use error::{ConfgateError, ErrorReport, Result};
pub use severity::Severity;

// Re-export schema types
pub use schema::{SchemaName, ValidationIssue, ValidationOutcome, Validator};

// Re-export quality gate types
pub use quality::{
    CheckOptions, GateConfig, GateResult, GateSummary, QualityGate, QualityRule, Reporter,
    RuleCheck, RuleOutcome, RuleRegistry, RuleResult, RuleSpec,
};

// Re-export config lifecycle types
pub use config::{
    BackupRecord, ConfigManager, ConfigManagerOptions, DiffEntry, DiffKind, HistoryEntry,
    LoadOptions, RollbackOutcome, SaveOptions, SaveOutcome,
};
