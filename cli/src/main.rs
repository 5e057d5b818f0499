//! SolShield activity log CLI
//!
//! Appends to, verifies and summarizes an agent's hash-chained activity
//! stream.  Reads and writes the same `<stream>_activity.jsonl` files the
//! agents produce.
//!
//! Usage:
//!   solshield-log --stream demo append position_discovered --details '{"protocol":"kamino"}'
//!   solshield-log --stream demo verify
//!   solshield-log --stream demo summary --json
//!   solshield-log --config solshield.toml show --limit 5

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use solshield_activity::{ActivityLog, StoredLine};
use solshield_contracts::{
    config::LogConfig,
    error::{ActivityError, ActivityResult},
};

/// Exit code used when the chain fails verification.
const EXIT_INTEGRITY_BROKEN: u8 = 2;

// ── CLI definition ────────────────────────────────────────────────────────────

/// SolShield — tamper-evident agent activity log.
#[derive(Parser)]
#[command(
    name = "solshield-log",
    about = "Inspect and extend a SolShield activity log",
    long_about = "Appends entries to, verifies, and summarizes a hash-chained\n\
                  agent activity stream stored as JSON lines."
)]
struct Cli {
    /// TOML file with `log_dir` and `stream`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the stream files (overrides the config file).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Stream name (overrides the config file).
    #[arg(long, global = true)]
    stream: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record one action.
    Append {
        /// Action label, e.g. `rebalance_executed`.
        action: String,
        /// JSON object with the action's details.
        #[arg(long, default_value = "{}")]
        details: String,
    },
    /// Verify the whole chain; exits with status 2 if it is broken.
    Verify,
    /// Show entry counts per action, integrity and the chain tip.
    Summary {
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the most recent stored lines.
    Show {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    // Set RUST_LOG=debug for per-append events.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_INTEGRITY_BROKEN),
        Err(e) => {
            eprintln!("solshield-log: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the command found the chain broken.
fn run(cli: Cli) -> ActivityResult<bool> {
    let config = resolve_config(cli.config, cli.log_dir, cli.stream)?;
    debug!(log_dir = %config.log_dir.display(), stream = %config.stream, "using log config");

    let log = ActivityLog::open_with(&config)?;

    match cli.command {
        Command::Append { action, details } => append(&log, action, &details),
        Command::Verify => verify(&log),
        Command::Summary { json } => summary(&log, json),
        Command::Show { limit } => show(&log, limit),
    }
}

/// Config file first, then flag overrides, then defaults.
fn resolve_config(
    path: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    stream: Option<String>,
) -> ActivityResult<LogConfig> {
    let mut config = match path {
        Some(path) => LogConfig::from_file(&path)?,
        None => LogConfig::default(),
    };
    if let Some(log_dir) = log_dir {
        config.log_dir = log_dir;
    }
    if let Some(stream) = stream {
        config.stream = stream;
    }
    Ok(config)
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn append(log: &ActivityLog, action: String, details: &str) -> ActivityResult<bool> {
    let details: Value =
        serde_json::from_str(details).map_err(|e| ActivityError::InvalidDetails {
            reason: format!("--details is not valid JSON: {}", e),
        })?;

    let entry = log.append(action, details)?;
    println!("sequence:   {}", entry.sequence);
    println!("action:     {}", entry.action);
    println!("entry_hash: {}", entry.entry_hash);
    Ok(true)
}

fn verify(log: &ActivityLog) -> ActivityResult<bool> {
    let report = log.verify_report()?;

    println!("stream:  {}", log.stream());
    println!("entries: {}", report.entries);
    match &report.first_break {
        None => {
            println!("valid:   yes");
            Ok(true)
        }
        Some(brk) => {
            println!("valid:   NO");
            println!(
                "break:   entry {} (line {}): {}",
                brk.position, brk.line_number, brk.kind
            );
            Ok(false)
        }
    }
}

fn summary(log: &ActivityLog, as_json: bool) -> ActivityResult<bool> {
    let summary = log.summary()?;

    if as_json {
        let text =
            serde_json::to_string_pretty(&summary).map_err(|e| ActivityError::Serialization {
                reason: e.to_string(),
            })?;
        println!("{}", text);
    } else {
        println!("Stream:          {}", summary.stream);
        println!("Total actions:   {}", summary.total_entries);
        println!(
            "Integrity valid: {}",
            if summary.integrity_valid { "yes" } else { "NO" }
        );
        println!("Activity breakdown:");
        for (action, count) in &summary.actions {
            println!("  {:<24} {}", action, count);
        }
        println!("Chain hash:      {}", summary.last_hash);
    }

    Ok(summary.integrity_valid)
}

fn show(log: &ActivityLog, limit: usize) -> ActivityResult<bool> {
    let lines = log.read_lines()?;
    let skip = lines.len().saturating_sub(limit);

    for (_, line) in lines.into_iter().skip(skip) {
        match line {
            StoredLine::Entry(entry) => {
                let at = entry
                    .recorded_at()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
                    .unwrap_or_else(|| entry.timestamp.to_string());
                // `!` marks an entry whose content no longer matches its hash.
                let marker = if entry.hash_is_valid() { ' ' } else { '!' };
                let short_hash: String = entry.entry_hash.chars().take(16).collect();
                let details = Value::Object(entry.details);
                println!(
                    "{}#{:<5} {}  {:<24} {}  {}",
                    marker, entry.sequence, at, entry.action, short_hash, details
                );
            }
            StoredLine::Malformed {
                line_number,
                reason,
                ..
            } => {
                println!("line {:<4} MALFORMED: {}", line_number, reason);
            }
        }
    }

    Ok(true)
}
