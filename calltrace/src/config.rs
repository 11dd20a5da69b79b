//! Agent configuration model.
//!
//! Only the *structured values* of the configuration are defined here; how
//! they are produced (a config-file grammar, a UI) is out of scope. The
//! canonical on-disk form is JSON, loaded with serde.
//!
//! Loading is all-or-nothing: an unreadable or malformed file yields a
//! [`ConfigError`] and the agent must not start with defaults in its place.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::domain::ConfigError;

/// Complete agent configuration, immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Classes/methods eligible for tracing.
    #[serde(default)]
    pub include: Vec<ClassRule>,

    /// Classes/methods explicitly pulled back out of the include set.
    #[serde(default)]
    pub exclude: Vec<ClassRule>,

    /// Classes whose hook activity is logged at debug level (exact names).
    #[serde(default)]
    pub debug_classes: HashSet<String>,

    /// Frames faster than this are dropped from the recorded tree.
    #[serde(default)]
    pub min_duration_micros: u64,

    /// Root traces faster than this produce no document at all.
    #[serde(default)]
    pub min_root_duration_micros: u64,

    /// Global fallback for parameter capture when neither the matched
    /// method rule nor its class rule says otherwise.
    #[serde(default)]
    pub track_parameters: bool,

    pub output: OutputConfig,

    #[serde(default)]
    pub disk_guard: DiskGuardConfig,
}

/// One include or exclude entry: a class pattern plus its method rules.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassRule {
    /// Exact class name, or a literal prefix ending in `*`.
    pub class: String,

    /// Empty means "all methods of the class" on the include side, and
    /// "excludes nothing" on the exclude side.
    #[serde(default)]
    pub methods: Vec<MethodRule>,

    /// Class-level parameter-capture default for methods matched by this
    /// entry.
    #[serde(default)]
    pub track_parameters: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodRule {
    /// Exact method name, or a literal prefix ending in `*`.
    pub pattern: String,

    /// Per-method parameter-capture override.
    #[serde(default)]
    pub track_parameters: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Destination of the append-only stats file.
    pub path: PathBuf,

    /// Truncate the stats file once at install instead of appending to
    /// whatever is already there.
    #[serde(default)]
    pub truncate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiskGuardConfig {
    /// Free-space threshold in MB below which output is disabled.
    /// 0 turns the monitor off entirely.
    #[serde(default)]
    pub threshold_mb: u64,

    /// Seconds between free-space probes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for DiskGuardConfig {
    fn default() -> Self {
        Self {
            threshold_mb: 0,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

impl AgentConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Invalid {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject patterns the selector cannot honor. The wildcard marker is a
    /// single trailing character, never a general glob.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in self.include.iter().chain(self.exclude.iter()) {
            validate_pattern(&rule.class)?;
            for method in &rule.methods {
                validate_pattern(&method.pattern)?;
            }
        }
        Ok(())
    }
}

fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::EmptyPattern);
    }
    if let Some(index) = pattern.find('*') {
        if index != pattern.len() - 1 {
            return Err(ConfigError::BadPattern {
                pattern: pattern.to_string(),
            });
        }
    }
    Ok(())
}
