//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "calltrace",
    about = "Validate tracing configuration and summarize recorded call trees",
    after_help = "\
EXAMPLES:
    calltrace --config agent.json            Validate a configuration file
    calltrace --summarize stats.json         Slowest methods in a stats file
    calltrace --summarize stats.json --top 5 Only the five slowest"
)]
pub struct Args {
    /// Validate a configuration file and print the loaded rule summary
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Summarize a stats file (one call-tree document per line)
    #[arg(long, value_name = "FILE")]
    pub summarize: Option<PathBuf>,

    /// Number of entries in the summary table
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
