//! Quality rules and the quality gate.
//!
//! - [`rule`] - The [`RuleCheck`] capability and registered [`QualityRule`]s
//! - [`builtin`] - Built-in rule catalogue
//! - [`registry`] - [`RuleRegistry`], the rule catalogue
//! - [`gate`] - [`QualityGate`], running rules and deciding pass/fail
//! - [`config`] - Gate configuration (`quality-gate.json`)
//! - [`reporters`] - Console, JSON, Markdown and HTML output
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  &registry  ┌─────────────────┐
//! │ RuleRegistry │────────────▶│   QualityGate   │
//! │              │             │                 │
//! │ - register() │             │ - check()       │
//! │ - get_all()  │             │ - check_or_throw│
//! └──────────────┘             └────────┬────────┘
//!                                       │ GateResult
//!                                       ▼
//!                              ┌─────────────────┐
//!                              │    Reporters    │
//!                              └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use confgate::quality::{CheckOptions, QualityGate, RuleRegistry};
//!
//! let registry = RuleRegistry::with_builtins();
//! let gate = QualityGate::new("/path/to/project", &registry);
//!
//! let result = gate.check(CheckOptions::new()).await?;
//! if !result.passed {
//!     eprintln!("{} blocking issue(s)", result.blocking_count());
//! }
//! ```

pub mod builtin;
pub mod config;
pub mod gate;
pub mod registry;
pub mod reporters;
pub mod rule;

pub use config::{GateConfig, GateTriggers, ReportFormat, ReportingConfig, RuleOverride};
pub use gate::{CheckOptions, GateResult, GateSummary, QualityGate, RuleResult};
pub use registry::{RuleFilter, RuleRegistry};
pub use reporters::Reporter;
pub use rule::{QualityRule, RuleCheck, RuleConfig, RuleContext, RuleOutcome, RuleSpec};
