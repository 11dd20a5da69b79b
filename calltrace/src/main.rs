//! # calltrace - Main Entry Point
//!
//! Two operational modes:
//! - **Check** (`--config agent.json`): load and validate a configuration
//!   file the way an installing agent would, and print what it selects
//! - **Summarize** (`--summarize stats.json`): aggregate a recorded stats
//!   file and report the slowest methods

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

use calltrace::analysis::StatsSummary;
use calltrace::cli::Args;
use calltrace::config::AgentConfig;
use calltrace::domain::ConfigError;
use calltrace::selector::MethodSelector;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
/// Distinct status for configuration failures: a broken configuration must
/// never degrade into tracing with defaults.
const EXIT_CONFIG: i32 = 8;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        EXIT_CONFIG
    } else if err.to_string().contains("missing required argument") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    if args.config.is_none() && args.summarize.is_none() {
        anyhow::bail!(
            "missing required argument: --config or --summarize\n\n\
             Usage:\n  \
             calltrace --config agent.json        Validate a configuration\n  \
             calltrace --summarize stats.json     Summarize recorded traces\n\n\
             Run 'calltrace --help' for more options"
        );
    }

    if let Some(path) = &args.config {
        check_config(path, args.quiet)?;
    }
    if let Some(path) = &args.summarize {
        summarize(path, args.top)?;
    }
    Ok(())
}

/// Load a configuration exactly as `Agent::from_config_file` would and
/// print what it resolves to.
fn check_config(path: &Path, quiet: bool) -> Result<()> {
    let config = AgentConfig::load(path)?;
    if quiet {
        return Ok(());
    }
    let selector = MethodSelector::from_config(&config);
    println!("configuration ok: {}", path.display());
    println!(
        "  rules:        {} include, {} exclude",
        selector.include_count(),
        selector.exclude_count()
    );
    if !selector.has_rules() {
        println!("  note:         no include rules — nothing will be traced");
    }
    println!(
        "  thresholds:   min {}us per frame, min {}us per root",
        config.min_duration_micros, config.min_root_duration_micros
    );
    println!(
        "  output:       {} ({})",
        config.output.path.display(),
        if config.output.truncate { "truncate" } else { "append" }
    );
    match config.disk_guard.threshold_mb {
        0 => println!("  disk guard:   off"),
        mb => println!(
            "  disk guard:   disable below {} MB free, poll every {}s",
            mb, config.disk_guard.poll_interval_secs
        ),
    }
    if !config.debug_classes.is_empty() {
        println!("  debug:        {} classes", config.debug_classes.len());
    }
    Ok(())
}

fn summarize(path: &Path, top: usize) -> Result<()> {
    let summary = StatsSummary::from_file(path)?;
    summary
        .write_report(&mut std::io::stdout().lock(), top)
        .context("failed to write report")?;
    Ok(())
}
