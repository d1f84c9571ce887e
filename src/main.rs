//! CLI entry point for keyremapd
//!
//! Provides the command-line interface for running the interception
//! engine, checking a remap document for conflicts, and listing the
//! mappings it contains.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use keyremapd::config::{default_document_path, ConfigManager};
use keyremapd::core::types::RemapEntry;
use keyremapd::core::validator::{self, ValidationOutcome};
use keyremapd::engine::{Engine, EngineOptions, FocusProvider, HyprlandFocus};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keyremapd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interception engine
    Run {
        /// Path to the remap document
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Exit when this process exits (set by the editor that spawned us)
        #[arg(long)]
        parent_pid: Option<u32>,

        /// Input device to grab; repeat for several. Default: auto-detect
        #[arg(long = "device", value_name = "PATH")]
        devices: Vec<PathBuf>,

        /// Where the focused application class comes from
        #[arg(long, value_enum, default_value = "hyprland")]
        app_provider: AppProvider,
    },

    /// Check a remap document for conflicts
    Check {
        /// Path to the remap document
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List all mappings in a remap document
    List {
        /// Path to the remap document
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AppProvider {
    /// Poll the Hyprland IPC socket for the focused window class
    Hyprland,
    /// No focus tracking; only global mappings apply
    None,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            parent_pid,
            devices,
            app_provider,
        } => run_engine(config, parent_pid, devices, app_provider)?,
        Commands::Check { config } => check_document(config)?,
        Commands::List { config } => list_mappings(config)?,
    }

    Ok(())
}

/// Run the interception engine until shutdown
fn run_engine(
    config: Option<PathBuf>,
    parent_pid: Option<u32>,
    devices: Vec<PathBuf>,
    app_provider: AppProvider,
) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let focus: Option<Box<dyn FocusProvider>> = match app_provider {
        AppProvider::Hyprland => match HyprlandFocus::detect() {
            Some(provider) => Some(Box::new(provider)),
            None => {
                tracing::warn!("No Hyprland session found, app scopes are disabled");
                None
            }
        },
        AppProvider::None => None,
    };

    Engine::run(EngineOptions {
        document_path: document_path(config)?,
        devices,
        parent_pid,
        focus,
    })?;

    Ok(())
}

/// Check a document for conflicts, exiting non-zero if any block
fn check_document(config: Option<PathBuf>) -> anyhow::Result<()> {
    let manager = ConfigManager::new(document_path(config)?)?;

    println!(
        "{} Checking document: {}",
        "→".cyan(),
        manager.document_path().display()
    );

    let document = manager.load()?;
    println!("{} Found {} mappings\n", "✓".green(), document.remaps.len());

    match validator::validate(&document.remaps) {
        ValidationOutcome::Clean => {
            println!("{} {}", "✓".green().bold(), "No conflicts detected!".bold());
        }
        ValidationOutcome::NeedsConfirmation(warnings) => {
            println!(
                "{} {} warning{}:\n",
                "⚠".yellow().bold(),
                warnings.len(),
                if warnings.len() == 1 { "" } else { "s" }
            );
            for warning in &warnings {
                println!("  {}", warning);
            }
            println!("\n{}", "These mappings are unusual but not conflicting.".yellow());
        }
        ValidationOutcome::Blocked(issues) => {
            println!(
                "{} Found {} conflict{}:\n",
                "✗".red().bold(),
                issues.len(),
                if issues.len() == 1 { "" } else { "s" }
            );
            for (i, issue) in issues.iter().enumerate() {
                println!("  {} {}", format!("{}.", i + 1).dimmed(), issue);
            }
            println!("\n{}", "⚠ These mappings will conflict at runtime!".yellow());
            std::process::exit(1);
        }
    }

    Ok(())
}

/// List all mappings in a document, grouped by scope
fn list_mappings(config: Option<PathBuf>) -> anyhow::Result<()> {
    let manager = ConfigManager::new(document_path(config)?)?;
    let document = manager.load()?;

    println!(
        "{}",
        format!("Mappings from: {}\n", manager.document_path().display()).bold()
    );

    let total = document.remaps.len();

    let mut globals: Vec<&RemapEntry> = Vec::new();
    let mut scoped: BTreeMap<&str, Vec<&RemapEntry>> = BTreeMap::new();
    for entry in &document.remaps {
        match entry.scope.app_name() {
            Some(app) => scoped.entry(app).or_default().push(entry),
            None => globals.push(entry),
        }
    }

    for entry in globals {
        print_entry(entry);
    }
    for (app, entries) in scoped {
        println!("\n{}", format!("[{}]", app).magenta().bold());
        for entry in entries {
            print_entry(entry);
        }
    }

    println!("\n{} Total: {} mappings", "✓".green(), total);

    Ok(())
}

fn print_entry(entry: &RemapEntry) {
    let source = format!("{}", entry.source).cyan().bold();
    let action = format!("{}", entry.action).green();
    println!("  {} → {}", source, action);
}

/// Resolve the document path: the explicit flag, tilde-expanded, or the
/// default location
fn document_path(config: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match config {
        Some(path) => {
            let expanded = shellexpand::tilde(
                path.to_str()
                    .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?,
            );
            Ok(PathBuf::from(expanded.as_ref()))
        }
        None => Ok(default_document_path()),
    }
}
