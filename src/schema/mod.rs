//! Schema set and document validation.
//!
//! Three named schemas describe the documents confgate governs:
//!
//! | Name | File | Purpose |
//! |------|------|---------|
//! | `config` | `config.json` | Main configuration document |
//! | `settings` | `settings.json`, `settings.local.json` | Project settings |
//! | `quality-gate` | `quality-gate.json` | Quality gate configuration |
//!
//! # Example
//!
//! ```rust,ignore
//! use confgate::schema::Validator;
//! use serde_json::json;
//!
//! let validator = Validator::new();
//! let outcome = validator.validate(&json!({"version": "1.0.0"}), "config");
//! assert!(outcome.valid);
//! ```

mod definitions;
pub mod validator;

pub use validator::{
    FallbackBackend, SchemaBackend, ValidationIssue, ValidationOutcome, Validator,
};

#[cfg(feature = "schema-engine")]
pub use validator::JsonSchemaBackend;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Semantic-version prefix every persisted configuration must carry.
pub const VERSION_PATTERN: &str = r"^\d+\.\d+\.\d+";

/// Name of one member of the schema set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaName {
    /// Main configuration document.
    Config,
    /// Project settings document.
    Settings,
    /// Quality gate configuration.
    QualityGate,
}

impl SchemaName {
    /// Every schema in the set.
    pub const ALL: [SchemaName; 3] = [
        SchemaName::Config,
        SchemaName::Settings,
        SchemaName::QualityGate,
    ];

    /// Wire name of the schema.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Settings => "settings",
            Self::QualityGate => "quality-gate",
        }
    }

    /// The JSON Schema document for this member.
    #[must_use]
    pub fn document(self) -> Value {
        match self {
            Self::Config => definitions::config_schema(),
            Self::Settings => definitions::settings_schema(),
            Self::QualityGate => definitions::quality_gate_schema(),
        }
    }

    /// Detect the schema for a file by its name.
    ///
    /// Unknown file names are treated as main configuration documents.
    #[must_use]
    pub fn detect(path: &Path) -> Self {
        match path.file_name().and_then(|n| n.to_str()) {
            Some("settings.json") | Some("settings.local.json") => Self::Settings,
            Some("quality-gate.json") => Self::QualityGate,
            _ => Self::Config,
        }
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(Self::Config),
            "settings" => Ok(Self::Settings),
            "quality-gate" => Ok(Self::QualityGate),
            other => Err(format!(
                "Unknown schema: {}. Valid schemas: config, settings, quality-gate",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_by_file_name() {
        assert_eq!(SchemaName::detect(&PathBuf::from("a/config.json")), SchemaName::Config);
        assert_eq!(
            SchemaName::detect(&PathBuf::from(".claude/settings.json")),
            SchemaName::Settings
        );
        assert_eq!(
            SchemaName::detect(&PathBuf::from("settings.local.json")),
            SchemaName::Settings
        );
        assert_eq!(
            SchemaName::detect(&PathBuf::from("quality-gate.json")),
            SchemaName::QualityGate
        );
        assert_eq!(SchemaName::detect(&PathBuf::from("other.json")), SchemaName::Config);
    }

    #[test]
    fn test_parse_round_trips_wire_names() {
        for name in SchemaName::ALL {
            assert_eq!(name.as_str().parse::<SchemaName>().unwrap(), name);
        }
        assert!("bogus".parse::<SchemaName>().is_err());
    }

    #[test]
    fn test_documents_are_objects() {
        for name in SchemaName::ALL {
            assert!(name.document().is_object(), "{} schema", name);
        }
    }
}
