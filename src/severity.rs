//! Severity levels shared by validation issues, rules and the gate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered severity level: `info < warn < error < critical`.
///
/// The same scale classifies individual issues and sets the blocking
/// threshold of a gate run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Should be fixed.
    #[default]
    #[serde(alias = "warning")]
    Warn,
    /// Must be fixed.
    Error,
    /// Must be fixed immediately.
    Critical,
}

impl Severity {
    /// All levels in ascending order.
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Critical,
    ];

    /// Numeric rank used for threshold comparisons.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Info => 0,
            Self::Warn => 1,
            Self::Error => 2,
            Self::Critical => 3,
        }
    }

    /// Whether an issue of this severity blocks a gate with `threshold`.
    #[must_use]
    pub fn meets(self, threshold: Severity) -> bool {
        self.rank() >= threshold.rank()
    }

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Issues at this level go to the `warnings` bucket of a validation outcome.
    #[must_use]
    pub fn is_advisory(self) -> bool {
        matches!(self, Self::Info | Self::Warn)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            other => Err(format!(
                "Invalid severity: {}. Valid values: info, warn, error, critical",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_meets_threshold() {
        assert!(Severity::Critical.meets(Severity::Warn));
        assert!(Severity::Warn.meets(Severity::Warn));
        assert!(!Severity::Error.meets(Severity::Critical));
        assert!(!Severity::Info.meets(Severity::Warn));
    }

    #[test]
    fn test_parse_accepts_warning_alias() {
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Severity::Error).unwrap();
        assert_eq!(json, "\"error\"");
        let parsed: Severity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(parsed, Severity::Warn);
    }
}
