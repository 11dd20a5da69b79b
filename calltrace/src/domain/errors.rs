//! Structured error types for calltrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading is fatal for the agent: no partial or default
/// configuration is ever substituted for a broken one.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid pattern {pattern:?}: the wildcard marker is only allowed as a trailing character")]
    BadPattern { pattern: String },

    #[error("invalid pattern: empty patterns match nothing")]
    EmptyPattern,
}

/// Errors from reading a recorded stats file back for summarization.
/// Malformed individual lines are skipped and counted, not raised.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("failed to read stats file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
