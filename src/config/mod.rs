//! Configuration lifecycle management.
//!
//! The primary configuration document lives in a configuration directory
//! (`.claude/` in a project, or `~/.claude/` globally) and is managed by
//! [`ConfigManager`]:
//!
//! - **load**: read, interpolate `${VAR}` / `${VAR:default}` tokens and
//!   optionally validate in strict mode
//! - **save**: validate, back up the previous file, write, record history
//! - **rollback**: restore a backup after backing up the current file
//! - **diff**: structural comparison of two documents
//!
//! # Example
//!
//! ```rust,ignore
//! use confgate::config::{ConfigManager, LoadOptions, SaveOptions};
//!
//! let manager = ConfigManager::for_project(".");
//! let mut doc = manager.load(LoadOptions::default())?;
//! doc["model"] = "opus".into();
//! manager.save(&doc, SaveOptions::default())?;
//! manager.rollback(None)?;
//! ```

pub mod backup;
pub mod diff;
pub mod env;
pub mod history;
mod manager;

pub use backup::{BackupRecord, BackupStore};
pub use diff::{DiffCounts, DiffEntry, DiffKind};
pub use env::expand_env;
pub use history::{HistoryAction, HistoryEntry, HistoryLog};
pub use manager::{
    ConfigManager, ConfigManagerOptions, DocumentSource, LoadOptions, RollbackOutcome,
    SaveOptions, SaveOutcome, CONFIG_DIR_NAME, DEFAULT_CONFIG_FILE,
};
