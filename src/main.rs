//! Confgate - Project Configuration Governance
//!
//! Validate configuration documents, run the quality gate and manage the
//! configuration lifecycle from the command line.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use confgate::config::{ConfigManager, DocumentSource, LoadOptions};
use confgate::quality::{CheckOptions, GateConfig, QualityGate, ReportFormat, RuleRegistry};
use confgate::{ConfgateError, Severity, ValidationOutcome, Validator};

#[derive(Parser)]
#[command(name = "confgate")]
#[command(version)]
#[command(about = "Schema validation, quality gates and versioned configuration", long_about = None)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Manage the global configuration in ~/.claude instead of the project's
    #[arg(short, long, global = true)]
    global: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration document against its schema
    Validate {
        /// File to validate (defaults to the primary configuration)
        file: Option<PathBuf>,

        /// Schema name: config, settings or quality-gate (detected from the file name by default)
        #[arg(short, long)]
        schema: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the quality gate
    Check {
        /// Files to check (defaults to scanning the project)
        files: Vec<PathBuf>,

        /// Blocking severity threshold: info, warn, error or critical
        #[arg(short, long)]
        severity: Option<Severity>,

        /// Apply automatic fixes where available
        #[arg(long)]
        fix: bool,

        /// Report format: console, json, markdown or html
        #[arg(short, long)]
        format: Option<ReportFormat>,

        /// Additional rule definitions (JSON, YAML or TOML)
        #[arg(long, value_name = "PATH")]
        rules_file: Option<PathBuf>,
    },

    /// Manage the configuration lifecycle
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the current configuration
    Show {
        /// Show the document as written, without ${VAR} interpolation
        #[arg(long)]
        raw: bool,
    },

    /// List configuration backups
    Backups {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore a configuration backup
    Rollback {
        /// Restore the newest backup of this version instead of the newest backup
        #[arg(long)]
        version: Option<String>,
    },

    /// Compare configuration documents
    ///
    /// With no arguments the newest backup is compared to the current
    /// configuration; with one, that file is compared to the current
    /// configuration.
    Diff {
        left: Option<PathBuf>,
        right: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration history
    History {
        /// Show last N entries
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    let default_filter = if cli.verbose {
        "confgate=debug,info"
    } else {
        "confgate=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            let code = match e.downcast_ref::<ConfgateError>() {
                Some(err) => {
                    for hint in err.hints() {
                        eprintln!("  {} {}", "→".dimmed(), hint);
                    }
                    err.exit_code()
                }
                None => 1,
            };
            std::process::exit(code);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        anyhow::bail!(
            "Project directory does not exist: {}",
            project_path.display()
        );
    }

    let manager = if cli.global {
        ConfigManager::global()?
    } else {
        ConfigManager::for_project(&project_path)
    };

    match cli.command {
        Commands::Validate { file, schema, json } => {
            let path = file.unwrap_or_else(|| manager.config_path());
            let outcome = Validator::new().validate_file(&path, schema.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_validation(&path, &outcome);
            }

            Ok(if outcome.valid { 0 } else { 1 })
        }

        Commands::Check {
            files,
            severity,
            fix,
            format,
            rules_file,
        } => {
            let mut registry = RuleRegistry::with_builtins();
            if let Some(rules_file) = rules_file {
                let applied = registry.load_from_file(&rules_file);
                tracing::debug!(path = %rules_file.display(), applied, "Applied rule file");
            }

            let mut config = GateConfig::load(&project_path);
            if let Some(format) = format {
                config.reporting.format = format;
            }

            let gate = QualityGate::with_config(&project_path, config, &registry);
            let mut options = CheckOptions::new().with_fix(fix);
            if !files.is_empty() {
                options = options.with_files(files);
            }
            if let Some(severity) = severity {
                options = options.with_severity(severity);
            }

            let result = gate.check(options).await?;
            Ok(if result.passed { 0 } else { 2 })
        }

        Commands::Config { action } => {
            run_config(&manager, action)?;
            Ok(0)
        }
    }
}

fn run_config(manager: &ConfigManager, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show { raw } => {
            let document = manager.load(LoadOptions::default().with_expand_env(!raw))?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }

        ConfigAction::Backups { json } => {
            let backups = manager.list_backups()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&backups)?);
            } else {
                println!(
                    "\n{} Backups ({} total)",
                    "Config:".cyan().bold(),
                    backups.len()
                );
                println!("{}", "─".repeat(60));

                if backups.is_empty() {
                    println!("   No backups found");
                } else {
                    for backup in &backups {
                        println!(
                            "   {} {} ({} bytes)",
                            backup.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            backup.version.cyan(),
                            backup.size
                        );
                    }
                }
            }
        }

        ConfigAction::Rollback { version } => {
            let outcome = manager.rollback(version.as_deref())?;
            println!(
                "{} Restored version {} from {}",
                "OK".green().bold(),
                outcome.version,
                outcome.restored_from.display()
            );
            if let Some(safety) = &outcome.safety_backup {
                println!("   Previous configuration saved to {}", safety.display());
            }
        }

        ConfigAction::Diff { left, right, json } => {
            let left: DocumentSource = match left {
                Some(path) => path.into(),
                None => {
                    let newest = manager.list_backups()?.into_iter().next().ok_or_else(|| {
                        ConfgateError::config("No backups available to compare against")
                    })?;
                    newest.path.into()
                }
            };
            let entries = manager.diff(left, right.map(DocumentSource::from))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("{} No differences", "OK".green().bold());
            } else {
                for entry in &entries {
                    println!("   {}", entry.format());
                }
            }
        }

        ConfigAction::History { limit, json } => {
            let entries = manager.get_history(Some(limit))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!(
                    "\n{} History ({} shown)",
                    "Config:".cyan().bold(),
                    entries.len()
                );
                println!("{}", "─".repeat(60));

                if entries.is_empty() {
                    println!("   No history recorded");
                }
                for entry in &entries {
                    let version = entry
                        .details
                        .get("version")
                        .and_then(|v| v.as_str())
                        .unwrap_or("-");
                    println!(
                        "   {} {:<8} {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.action.to_string(),
                        version
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_validation(path: &Path, outcome: &ValidationOutcome) {
    if outcome.valid {
        println!("{} {} is valid", "OK".green().bold(), path.display());
        return;
    }

    eprintln!("{} {}: {}", "Error:".red().bold(), path.display(), outcome.summary());
    for issue in &outcome.errors {
        eprintln!("  {} {}", "✗".red(), issue.format());
    }
    for issue in &outcome.warnings {
        eprintln!("  {} {}", "!".yellow(), issue.format());
    }
}
