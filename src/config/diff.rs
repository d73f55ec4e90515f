//! Structural diff between two configuration documents.
//!
//! Objects are compared key by key; everything else, arrays included, is
//! compared as a whole leaf value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a single difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

/// One leaf-level difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Dotted path, or `root` for top-level replacement.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: DiffKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
}

impl DiffEntry {
    /// Format as a one-line summary.
    #[must_use]
    pub fn format(&self) -> String {
        let show = |v: &Option<Value>| v.as_ref().map(Value::to_string).unwrap_or_default();
        match self.kind {
            DiffKind::Added => format!("+ {}: {}", self.path, show(&self.to)),
            DiffKind::Removed => format!("- {}: {}", self.path, show(&self.from)),
            DiffKind::Changed => format!(
                "~ {}: {} → {}",
                self.path,
                show(&self.from),
                show(&self.to)
            ),
        }
    }
}

/// Count of diff entries per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffCounts {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

impl DiffCounts {
    pub fn of(entries: &[DiffEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut counts, e| {
            match e.kind {
                DiffKind::Added => counts.added += 1,
                DiffKind::Removed => counts.removed += 1,
                DiffKind::Changed => counts.changed += 1,
            }
            counts
        })
    }
}

/// Compute the differences that turn `left` into `right`.
pub fn diff(left: &Value, right: &Value) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    diff_at("", left, right, &mut entries);
    entries
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn diff_at(path: &str, left: &Value, right: &Value, out: &mut Vec<DiffEntry>) {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            for (key, lv) in l {
                let child = join(path, key);
                match r.get(key) {
                    Some(rv) => diff_at(&child, lv, rv, out),
                    None => out.push(DiffEntry {
                        path: child,
                        kind: DiffKind::Removed,
                        from: Some(lv.clone()),
                        to: None,
                    }),
                }
            }
            for (key, rv) in r {
                if !l.contains_key(key) {
                    out.push(DiffEntry {
                        path: join(path, key),
                        kind: DiffKind::Added,
                        from: None,
                        to: Some(rv.clone()),
                    });
                }
            }
        }
        (l, r) if l != r => out.push(DiffEntry {
            path: if path.is_empty() {
                "root".to_string()
            } else {
                path.to_string()
            },
            kind: DiffKind::Changed,
            from: Some(l.clone()),
            to: Some(r.clone()),
        }),
        _ => {}
    }
}
