//! Offline aggregation over a recorded stats file.
//!
//! The produced artifact is line-oriented: one self-contained call-tree
//! document per line. This module reads it back, walks the nested
//! `subcalls` groups, and aggregates per-label timing so the slowest
//! methods surface without any viewer. Malformed lines are counted and
//! skipped, never fatal — a live agent may be appending while we read.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use log::warn;
use serde_json::Value;

use crate::domain::StatsError;

/// Aggregated timing for one label across every document in the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelStats {
    /// Total occurrences, roots and nested calls combined.
    pub calls: usize,
    /// Occurrences as the top-level call of a document.
    pub root_calls: usize,
    pub total_ms: f64,
    pub max_ms: f64,
}

/// Per-file summary produced by [`StatsSummary::from_file`].
#[derive(Debug, Default)]
pub struct StatsSummary {
    pub documents: usize,
    pub skipped_lines: usize,
    labels: HashMap<String, LabelStats>,
}

impl StatsSummary {
    /// Parse a stats file into an aggregate summary.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StatsError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StatsError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let mut summary = Self::default();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(document) => {
                    summary.documents += 1;
                    summary.add_call(&document, true);
                }
                Err(e) => {
                    summary.skipped_lines += 1;
                    warn!("skipping malformed stats line: {e}");
                }
            }
        }
        Ok(summary)
    }

    /// One call object: a single label key mapping to `"<float>ms"`, plus
    /// an optional `subcalls` array of child objects.
    fn add_call(&mut self, call: &Value, is_root: bool) {
        let Some(object) = call.as_object() else {
            return;
        };
        for (key, value) in object {
            if key == "subcalls" {
                if let Some(children) = value.as_array() {
                    for child in children {
                        self.add_call(child, false);
                    }
                }
                continue;
            }
            let Some(ms) = value.as_str().and_then(parse_millis) else {
                continue;
            };
            let entry = self.labels.entry(key.clone()).or_default();
            entry.calls += 1;
            if is_root {
                entry.root_calls += 1;
            }
            entry.total_ms += ms;
            entry.max_ms = entry.max_ms.max(ms);
        }
    }

    #[must_use]
    pub fn label(&self, name: &str) -> Option<&LabelStats> {
        self.labels.get(name)
    }

    /// Labels ordered by total time, slowest first.
    #[must_use]
    pub fn top_by_total(&self, n: usize) -> Vec<(&str, &LabelStats)> {
        let mut entries: Vec<(&str, &LabelStats)> =
            self.labels.iter().map(|(name, stats)| (name.as_str(), stats)).collect();
        entries.sort_by(|a, b| {
            b.1.total_ms.total_cmp(&a.1.total_ms).then_with(|| a.0.cmp(b.0))
        });
        entries.truncate(n);
        entries
    }

    /// Plain-text report of the slowest labels.
    pub fn write_report(&self, out: &mut impl Write, top: usize) -> io::Result<()> {
        writeln!(
            out,
            "{} documents, {} distinct labels ({} malformed lines skipped)",
            self.documents,
            self.labels.len(),
            self.skipped_lines
        )?;
        if self.labels.is_empty() {
            return Ok(());
        }
        writeln!(
            out,
            "{:<56} {:>7} {:>6} {:>12} {:>10}",
            "label", "calls", "roots", "total ms", "max ms"
        )?;
        for (name, stats) in self.top_by_total(top) {
            writeln!(
                out,
                "{:<56} {:>7} {:>6} {:>12.3} {:>10.3}",
                name, stats.calls, stats.root_calls, stats.total_ms, stats.max_ms
            )?;
        }
        Ok(())
    }
}

fn parse_millis(value: &str) -> Option<f64> {
    value.strip_suffix("ms")?.parse().ok()
}
