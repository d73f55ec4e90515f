//! Built-in rule catalogue.
//!
//! | Id | Severity | Enabled | Checks |
//! |----|----------|---------|--------|
//! | `file-size-limit` | warn | yes | byte size against `maxSize` |
//! | `line-count-limit` | error | yes | line count against `maxLines` |
//! | `no-console-logs` | warn | yes | `console.*` calls in JS/TS files |
//! | `todo-comments` | info | yes | TODO/FIXME markers (informational) |
//! | `directory-depth` | warn | yes | path nesting against `maxDepth` |
//! | `no-empty-files` | warn | yes | line count against `minLines` |
//! | `no-trailing-whitespace` | warn | yes | trailing spaces/tabs (auto-fixable) |
//! | `function-length` | warn | no | JS function bodies against `maxLines` |
//!
//! [`PatternCheck`] backs the data-driven regex rules that rule files may
//! define.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::path::Path;
use std::sync::OnceLock;

use super::rule::{RuleCheck, RuleConfig, RuleContext, RuleOutcome, RuleSpec};
use crate::error::{ConfgateError, Result};
use crate::severity::Severity;

/// JavaScript/TypeScript family extensions.
pub const JS_EXTENSIONS: &[&str] = &["js", "ts", "jsx", "tsx", "cjs", "mjs"];

/// Extensions treated as source code.
pub const CODE_EXTENSIONS: &[&str] = &["js", "ts", "jsx", "tsx", "cjs", "mjs", "py", "go", "rs"];

/// Extensions treated as plain text.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "js", "ts", "jsx", "tsx", "cjs", "mjs", "json", "md", "py", "go", "rs", "txt", "yml", "yaml",
    "toml", "css", "html", "sh",
];

const DEFAULT_MAX_SIZE: u64 = 102_400;
const DEFAULT_MAX_LINES: u64 = 500;
const DEFAULT_MAX_DEPTH: u64 = 6;
const DEFAULT_MIN_LINES: u64 = 1;
const DEFAULT_MAX_FUNCTION_LINES: u64 = 50;

/// Lowercased extension of `path`, without the dot.
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

fn has_extension(path: &Path, set: &[&str]) -> bool {
    extension_of(path).is_some_and(|ext| set.contains(&ext.as_str()))
}

/// Read a file as text, replacing invalid UTF-8 sequences.
async fn read_text(file: &Path) -> Result<String> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| ConfgateError::file(file, "read", e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Fails on a missing file, otherwise reports whether `file` is in scope.
async fn in_scope(file: &Path, covered: impl FnOnce(&Path) -> bool) -> Result<bool> {
    tokio::fs::metadata(file)
        .await
        .map_err(|e| ConfgateError::file(file, "stat", e))?;
    Ok(covered(file))
}

fn cached_regex(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn config_of(pairs: &[(&str, u64)]) -> RuleConfig {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), json!(v)))
        .collect()
}

/// All built-in rules, in catalogue order.
#[must_use]
pub fn builtin_rules() -> Vec<(&'static str, RuleSpec)> {
    vec![
        (
            "file-size-limit",
            RuleSpec::new(FileSizeLimit)
                .name("File size limit")
                .severity(Severity::Warn)
                .category("size")
                .config(config_of(&[("maxSize", DEFAULT_MAX_SIZE)])),
        ),
        (
            "line-count-limit",
            RuleSpec::new(LineCountLimit)
                .name("Line count limit")
                .severity(Severity::Error)
                .category("size")
                .config(config_of(&[("maxLines", DEFAULT_MAX_LINES)])),
        ),
        (
            "no-console-logs",
            RuleSpec::new(NoConsoleLogs)
                .name("No console logs")
                .severity(Severity::Warn)
                .category("code-quality"),
        ),
        (
            "todo-comments",
            RuleSpec::new(TodoComments)
                .name("TODO comments")
                .severity(Severity::Info)
                .category("maintenance"),
        ),
        (
            "directory-depth",
            RuleSpec::new(DirectoryDepth)
                .name("Directory depth")
                .severity(Severity::Warn)
                .category("structure")
                .config(config_of(&[("maxDepth", DEFAULT_MAX_DEPTH)])),
        ),
        (
            "no-empty-files",
            RuleSpec::new(NoEmptyFiles)
                .name("No empty files")
                .severity(Severity::Warn)
                .category("structure")
                .config(config_of(&[("minLines", DEFAULT_MIN_LINES)])),
        ),
        (
            "no-trailing-whitespace",
            RuleSpec::new(NoTrailingWhitespace)
                .name("No trailing whitespace")
                .severity(Severity::Warn)
                .category("style"),
        ),
        (
            "function-length",
            RuleSpec::new(FunctionLength)
                .name("Function length")
                .severity(Severity::Warn)
                .enabled(false)
                .category("complexity")
                .config(config_of(&[("maxLines", DEFAULT_MAX_FUNCTION_LINES)])),
        ),
    ]
}

// ============================================================================
// Size rules
// ============================================================================

/// Fails when a file's byte size exceeds `maxSize`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSizeLimit;

#[async_trait]
impl RuleCheck for FileSizeLimit {
    async fn check(&self, file: &Path, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let size = tokio::fs::metadata(file)
            .await
            .map_err(|e| ConfgateError::file(file, "stat", e))?
            .len();
        let max = ctx.u64_option("maxSize", DEFAULT_MAX_SIZE);
        let details = json!({ "size": size, "maxSize": max });

        Ok(if size > max {
            RuleOutcome::fail(format!(
                "File size {} bytes exceeds limit of {} bytes",
                size, max
            ))
            .with_fix("Split the file into smaller modules")
            .with_details(details)
        } else {
            RuleOutcome::pass(format!("File size {} bytes within limit", size)).with_details(details)
        })
    }
}

/// Fails when a file has more than `maxLines` lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCountLimit;

#[async_trait]
impl RuleCheck for LineCountLimit {
    async fn check(&self, file: &Path, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let lines = read_text(file).await?.lines().count() as u64;
        let max = ctx.u64_option("maxLines", DEFAULT_MAX_LINES);
        let details = json!({ "lines": lines, "maxLines": max });

        Ok(if lines > max {
            RuleOutcome::fail(format!(
                "File has {} lines, exceeds limit of {}",
                lines, max
            ))
            .with_fix(format!("Reduce the file to at most {} lines", max))
            .with_details(details)
        } else {
            RuleOutcome::pass(format!("File has {} lines", lines)).with_details(details)
        })
    }
}

// ============================================================================
// Content rules
// ============================================================================

/// Flags `console.*` debug output in JS/TS files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConsoleLogs;

#[async_trait]
impl RuleCheck for NoConsoleLogs {
    async fn check(&self, file: &Path, _ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        static CONSOLE: OnceLock<Option<Regex>> = OnceLock::new();

        if !in_scope(file, |f| has_extension(f, JS_EXTENSIONS)).await? {
            return Ok(RuleOutcome::skip("Not a JavaScript/TypeScript file"));
        }
        let content = read_text(file).await?;

        let Some(re) = cached_regex(&CONSOLE, r"\bconsole\.(log|debug|info|trace|dir)\s*\(") else {
            return Ok(RuleOutcome::skip("Console pattern unavailable"));
        };

        let lines: Vec<usize> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim_start().starts_with("//") && re.is_match(line))
            .map(|(i, _)| i + 1)
            .collect();

        Ok(if lines.is_empty() {
            RuleOutcome::pass("No console statements")
        } else {
            RuleOutcome::fail(format!(
                "Found {} console statement(s) at line(s) {}",
                lines.len(),
                join_lines(&lines)
            ))
            .with_fix("Remove console statements or use a logger")
            .with_details(json!({ "lines": lines }))
        })
    }
}

/// Reports TODO/FIXME markers without ever failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TodoComments;

#[async_trait]
impl RuleCheck for TodoComments {
    async fn check(&self, file: &Path, _ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        static MARKER: OnceLock<Option<Regex>> = OnceLock::new();

        if !in_scope(file, |f| has_extension(f, CODE_EXTENSIONS)).await? {
            return Ok(RuleOutcome::skip("Not a code file"));
        }
        let content = read_text(file).await?;

        let count = cached_regex(&MARKER, r"\b(TODO|FIXME)\b")
            .map(|re| content.lines().filter(|l| re.is_match(l)).count())
            .unwrap_or(0);

        Ok(if count == 0 {
            RuleOutcome::pass("No TODO/FIXME comments")
        } else {
            RuleOutcome::pass(format!("Found {} TODO/FIXME comment(s)", count))
                .with_details(json!({ "count": count }))
        })
    }
}

/// Fails when a file sits more than `maxDepth` directories below the project.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryDepth;

#[async_trait]
impl RuleCheck for DirectoryDepth {
    async fn check(&self, file: &Path, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        tokio::fs::metadata(file)
            .await
            .map_err(|e| ConfgateError::file(file, "stat", e))?;

        let relative = file.strip_prefix(ctx.project_dir).unwrap_or(file);
        let depth = relative.components().count().saturating_sub(1) as u64;
        let max = ctx.u64_option("maxDepth", DEFAULT_MAX_DEPTH);
        let details = json!({ "depth": depth, "maxDepth": max });

        Ok(if depth > max {
            RuleOutcome::fail(format!(
                "Directory depth {} exceeds limit of {}",
                depth, max
            ))
            .with_fix("Flatten the directory structure")
            .with_details(details)
        } else {
            RuleOutcome::pass(format!("Directory depth {}", depth)).with_details(details)
        })
    }
}

/// Fails when a file has fewer than `minLines` lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmptyFiles;

#[async_trait]
impl RuleCheck for NoEmptyFiles {
    async fn check(&self, file: &Path, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let content = read_text(file).await?;
        let lines = content.lines().count() as u64;
        let min = ctx.u64_option("minLines", DEFAULT_MIN_LINES);

        Ok(if lines < min {
            RuleOutcome::fail(format!(
                "File has {} line(s), minimum is {}",
                lines, min
            ))
            .with_fix("Add content or delete the file")
        } else {
            RuleOutcome::pass("File has content")
        })
    }
}

/// Fails when any line ends with a space or tab. Auto-fixable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrailingWhitespace;

impl NoTrailingWhitespace {
    fn strip_line(line: &str) -> String {
        match line.strip_suffix('\r') {
            Some(body) => format!("{}\r", body.trim_end_matches([' ', '\t'])),
            None => line.trim_end_matches([' ', '\t']).to_string(),
        }
    }
}

#[async_trait]
impl RuleCheck for NoTrailingWhitespace {
    async fn check(&self, file: &Path, _ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        if !in_scope(file, |f| has_extension(f, TEXT_EXTENSIONS)).await? {
            return Ok(RuleOutcome::skip("Not a text file"));
        }
        let content = read_text(file).await?;

        let lines: Vec<usize> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| line.ends_with(' ') || line.ends_with('\t'))
            .map(|(i, _)| i + 1)
            .collect();

        Ok(if lines.is_empty() {
            RuleOutcome::pass("No trailing whitespace")
        } else {
            RuleOutcome::fail(format!(
                "Trailing whitespace on {} line(s): {}",
                lines.len(),
                join_lines(&lines)
            ))
            .with_fix("Run with --fix to strip trailing whitespace")
            .auto_fixable()
            .with_details(json!({ "lines": lines }))
        })
    }

    fn fix(&self, content: &str) -> Option<String> {
        Some(
            content
                .split('\n')
                .map(Self::strip_line)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

/// Fails when a JS/TS function body spans more than `maxLines` lines.
///
/// Functions are found heuristically by brace matching from a line that
/// opens a function, arrow function or method.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionLength;

impl FunctionLength {
    /// Returns `(start_line, length)` for every function longer than `max`.
    fn long_functions(content: &str, max: u64) -> Vec<(usize, u64)> {
        static START: OnceLock<Option<Regex>> = OnceLock::new();
        let Some(start) = cached_regex(
            &START,
            r"\bfunction\b|=>\s*\{|^\s*(async\s+)?[A-Za-z_$][\w$]*\s*\([^)]*\)\s*\{",
        ) else {
            return Vec::new();
        };

        let mut depth: i64 = 0;
        let mut open: Vec<(usize, i64)> = Vec::new();
        let mut long = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            if line.contains('{') && start.is_match(line) {
                open.push((idx, depth));
            }
            for ch in line.chars() {
                match ch {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        while let Some(&(begin, base)) = open.last() {
                            if depth > base {
                                break;
                            }
                            open.pop();
                            let length = (idx - begin + 1) as u64;
                            if length > max {
                                long.push((begin + 1, length));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        long
    }
}

#[async_trait]
impl RuleCheck for FunctionLength {
    async fn check(&self, file: &Path, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        if !in_scope(file, |f| has_extension(f, JS_EXTENSIONS)).await? {
            return Ok(RuleOutcome::skip("Not a JavaScript/TypeScript file"));
        }
        let content = read_text(file).await?;

        let max = ctx.u64_option("maxLines", DEFAULT_MAX_FUNCTION_LINES);
        let long = Self::long_functions(&content, max);

        Ok(if long.is_empty() {
            RuleOutcome::pass(format!("All functions within {} lines", max))
        } else {
            let starts: Vec<usize> = long.iter().map(|(line, _)| *line).collect();
            RuleOutcome::fail(format!(
                "{} function(s) exceed {} lines (starting at line(s) {})",
                long.len(),
                max,
                join_lines(&starts)
            ))
            .with_fix("Extract helper functions")
            .with_details(json!({
                "functions": long
                    .iter()
                    .map(|(line, length)| json!({ "line": line, "length": length }))
                    .collect::<Vec<_>>()
            }))
        })
    }
}

// ============================================================================
// Data-driven rules
// ============================================================================

/// Fails when any line of a file matches a regular expression.
#[derive(Debug, Clone)]
pub struct PatternCheck {
    pattern: Regex,
    extensions: Vec<String>,
    message: Option<String>,
}

impl PatternCheck {
    /// Compile a pattern rule.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn new(pattern: &str, extensions: Vec<String>, message: Option<String>) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| ConfgateError::Other(anyhow::anyhow!("Invalid pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern,
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            message,
        })
    }
}

#[async_trait]
impl RuleCheck for PatternCheck {
    async fn check(&self, file: &Path, _ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let covered = |f: &Path| {
            self.extensions.is_empty()
                || extension_of(f).is_some_and(|ext| self.extensions.contains(&ext))
        };
        if !in_scope(file, covered).await? {
            return Ok(RuleOutcome::skip("Extension not covered by rule"));
        }
        let content = read_text(file).await?;

        let lines: Vec<usize> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| self.pattern.is_match(line))
            .map(|(i, _)| i + 1)
            .collect();

        Ok(if lines.is_empty() {
            RuleOutcome::pass("No matches")
        } else {
            let label = self
                .message
                .clone()
                .unwrap_or_else(|| format!("Matched /{}/", self.pattern.as_str()));
            RuleOutcome::fail(format!("{} at line(s) {}", label, join_lines(&lines)))
                .with_details(json!({ "lines": lines }))
        })
    }
}

fn join_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
