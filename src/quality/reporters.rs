//! Reporters: stateless formatting strategies over a finished [`GateResult`].
//!
//! | Reporter | Output |
//! |----------|--------|
//! | [`ConsoleReporter`] | colored text grouped by file |
//! | [`JsonReporter`] | the whole result as pretty JSON |
//! | [`MarkdownReporter`] | badge, summary table, per-file issue lists |
//! | [`HtmlReporter`] | standalone HTML page |
//!
//! [`FileOutput`] redirects any reporter into a file.

use colored::Colorize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::config::{ReportFormat, ReportingConfig};
use super::gate::GateResult;
use crate::error::{ConfgateError, Result};
use crate::severity::Severity;

/// Formats a finished gate result.
pub trait Reporter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render the result to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be serialized.
    fn render(&self, result: &GateResult) -> Result<String>;

    /// Emit the rendered result. Prints to stdout by default.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    fn report(&self, result: &GateResult) -> Result<()> {
        let output = self.render(result)?;
        println!("{}", output.trim_end());
        Ok(())
    }
}

/// Reporter for a configured format.
pub fn for_format(format: ReportFormat) -> Box<dyn Reporter> {
    match format {
        ReportFormat::Console => Box::new(ConsoleReporter),
        ReportFormat::Json => Box::new(JsonReporter),
        ReportFormat::Markdown => Box::new(MarkdownReporter),
        ReportFormat::Html => Box::new(HtmlReporter),
    }
}

/// Reporters described by a reporting configuration.
pub fn from_config(config: &ReportingConfig) -> Vec<Box<dyn Reporter>> {
    let reporter = for_format(config.format);
    match &config.output_file {
        Some(path) => vec![Box::new(FileOutput::new(reporter, path.clone()))],
        None => vec![reporter],
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴",
        Severity::Error => "❌",
        Severity::Warn => "⚠️",
        Severity::Info => "ℹ️",
    }
}

// ============================================================================
// Console
// ============================================================================

/// Plain-text reporter for terminals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn name(&self) -> &'static str {
        "console"
    }

    fn render(&self, result: &GateResult) -> Result<String> {
        let mut out = String::new();
        let s = &result.summary;

        let _ = writeln!(out, "\n{}", "Quality Gate".bold());
        let _ = writeln!(
            out,
            "   Files: {}  Rules: {}  Threshold: {}",
            s.files_checked, s.rules_run, result.threshold
        );

        for (file, issues) in result.failures_by_file() {
            let _ = writeln!(out, "\n{}", file.bold());
            for issue in issues {
                let label = match issue.severity {
                    Severity::Critical => issue.severity.as_str().red().bold(),
                    Severity::Error => issue.severity.as_str().red(),
                    Severity::Warn => issue.severity.as_str().yellow(),
                    Severity::Info => issue.severity.as_str().blue(),
                };
                let _ = writeln!(
                    out,
                    "   {} {} [{}] {}",
                    severity_icon(issue.severity),
                    label,
                    issue.rule_id,
                    issue.message
                );
                if let Some(fix) = &issue.fix {
                    let _ = writeln!(out, "      → {}", fix.dimmed());
                }
            }
        }

        let _ = writeln!(
            out,
            "\n   Critical: {}  Error: {}  Warn: {}  Info: {}",
            s.critical, s.error, s.warn, s.info
        );
        if let Some(fixed) = s.fixed {
            let _ = writeln!(out, "   Fixed: {} file(s)", fixed);
        }

        let verdict = if result.passed {
            "PASSED".green().bold()
        } else {
            "FAILED".red().bold()
        };
        let _ = writeln!(out, "\n{} ({} ms)", verdict, result.duration_ms);
        Ok(out)
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Serializes the whole result.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn render(&self, result: &GateResult) -> Result<String> {
        Ok(serde_json::to_string_pretty(result)?)
    }
}

// ============================================================================
// Markdown
// ============================================================================

/// Markdown report with a pass/fail badge.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownReporter;

impl Reporter for MarkdownReporter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn render(&self, result: &GateResult) -> Result<String> {
        let s = &result.summary;
        let mut out = String::from("# Quality Gate Report\n\n");

        let badge = if result.passed {
            "![Quality Gate](https://img.shields.io/badge/quality%20gate-passed-brightgreen)"
        } else {
            "![Quality Gate](https://img.shields.io/badge/quality%20gate-failed-red)"
        };
        let _ = writeln!(out, "{}\n", badge);

        out.push_str("## Summary\n\n");
        out.push_str("| Metric | Value |\n|--------|-------|\n");
        let _ = writeln!(out, "| Threshold | {} |", result.threshold);
        let _ = writeln!(out, "| Files checked | {} |", s.files_checked);
        let _ = writeln!(out, "| Rules run | {} |", s.rules_run);
        let _ = writeln!(out, "| Critical | {} |", s.critical);
        let _ = writeln!(out, "| Error | {} |", s.error);
        let _ = writeln!(out, "| Warn | {} |", s.warn);
        let _ = writeln!(out, "| Info | {} |", s.info);
        if let Some(fixed) = s.fixed {
            let _ = writeln!(out, "| Fixed | {} |", fixed);
        }

        let grouped = result.failures_by_file();
        if grouped.is_empty() {
            out.push_str("\nNo issues found.\n");
            return Ok(out);
        }

        out.push_str("\n## Issues\n");
        for (file, issues) in grouped {
            let _ = writeln!(out, "\n### `{}`\n", file);
            for issue in issues {
                let _ = writeln!(
                    out,
                    "- {} **{}** `{}`: {}",
                    severity_icon(issue.severity),
                    issue.severity,
                    issue.rule_id,
                    issue.message
                );
                if let Some(fix) = &issue.fix {
                    let _ = writeln!(out, "  - Fix: {}", fix);
                }
            }
        }
        Ok(out)
    }
}

// ============================================================================
// HTML
// ============================================================================

/// Standalone HTML page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReporter;

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

impl Reporter for HtmlReporter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn render(&self, result: &GateResult) -> Result<String> {
        let s = &result.summary;
        let (status, status_class) = if result.passed {
            ("PASSED", "passed")
        } else {
            ("FAILED", "failed")
        };

        let rows: String = result
            .failures()
            .map(|issue| {
                format!(
                    "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    issue.severity,
                    escape_html(&result.relative_path(&issue.file)),
                    issue.severity,
                    escape_html(&issue.rule_id),
                    escape_html(&issue.message)
                )
            })
            .collect();

        let issues = if rows.is_empty() {
            "<p>No issues found.</p>".to_string()
        } else {
            format!(
                "<table>\n<thead><tr><th>File</th><th>Severity</th><th>Rule</th><th>Message</th></tr></thead>\n<tbody>\n{}</tbody>\n</table>",
                rows
            )
        };

        Ok(format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Quality Gate Report</title>
<style>
body {{ font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; margin: 2rem; color: #1e293b; }}
.status {{ font-weight: bold; font-size: 1.5rem; }}
.passed {{ color: #16a34a; }}
.failed {{ color: #dc2626; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #e2e8f0; padding: 0.4rem 0.6rem; text-align: left; }}
tr.critical td, tr.error td {{ background: #fef2f2; }}
tr.warn td {{ background: #fffbeb; }}
</style>
</head>
<body>
<h1>Quality Gate Report</h1>
<p class="status {status_class}">{status}</p>
<p>Threshold: {threshold} &middot; Files: {files} &middot; Rules: {rules}</p>
<p>Critical: {critical} &middot; Error: {error} &middot; Warn: {warn} &middot; Info: {info}</p>
{issues}
</body>
</html>
"#,
            threshold = result.threshold,
            files = s.files_checked,
            rules = s.rules_run,
            critical = s.critical,
            error = s.error,
            warn = s.warn,
            info = s.info,
        ))
    }
}

// ============================================================================
// File output
// ============================================================================

/// Writes another reporter's output to a file.
///
/// Relative paths resolve against the result's project directory.
pub struct FileOutput {
    inner: Box<dyn Reporter>,
    path: PathBuf,
}

impl FileOutput {
    pub fn new(inner: Box<dyn Reporter>, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
        }
    }

    fn target(&self, project_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            project_dir.join(&self.path)
        }
    }
}

impl Reporter for FileOutput {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn render(&self, result: &GateResult) -> Result<String> {
        self.inner.render(result)
    }

    fn report(&self, result: &GateResult) -> Result<()> {
        let output = self.render(result)?;
        let target = self.target(&result.project_dir);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfgateError::file(parent, "create directory", e))?;
        }
        std::fs::write(&target, output).map_err(|e| ConfgateError::file(&target, "write", e))?;
        debug!(reporter = self.inner.name(), path = %target.display(), "Wrote report");
        Ok(())
    }
}
