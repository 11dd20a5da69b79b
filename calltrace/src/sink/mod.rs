//! Output sink for encoded call-tree documents.
//!
//! All threads funnel completed root traces through one sink. Writes are
//! serialized by a single process-wide mutex taken only on this rare path;
//! the per-call hot path never touches it. I/O failures stop here: they are
//! logged and discarded, never propagated into the traced application.

pub mod capacity;

pub use capacity::{CapacityMonitor, CapacityState};

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::warn;

use crate::config::OutputConfig;

/// Append-only writer for the stats file.
pub struct OutputSink {
    path: PathBuf,
    lock: Mutex<()>,
    capacity: Arc<CapacityState>,
}

impl OutputSink {
    /// Build the sink. With `truncate` set the stats file is emptied once,
    /// here; a failure to do so is logged and otherwise ignored, like every
    /// other I/O failure at this boundary.
    #[must_use]
    pub fn new(output: &OutputConfig, capacity: Arc<CapacityState>) -> Self {
        if output.truncate {
            if let Err(e) = std::fs::File::create(&output.path) {
                warn!("failed to truncate stats file {}: {e}", output.path.display());
            }
        }
        Self {
            path: output.path.clone(),
            lock: Mutex::new(()),
            capacity,
        }
    }

    /// Append one document plus its line terminator.
    ///
    /// Silently does nothing while output is disabled by the capacity
    /// monitor. The mutex is released even when the write fails.
    pub fn write(&self, doc: &str) {
        if !self.capacity.is_enabled() {
            return;
        }
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = self.append_line(doc) {
            warn!("failed to append trace document to {}: {e}", self.path.display());
        }
    }

    fn append_line(&self, doc: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(doc.as_bytes())?;
        file.write_all(b"\n")
    }

    /// Cheap pre-check so callers can skip encoding entirely while output
    /// is disabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.capacity.is_enabled()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink")
            .field("path", &self.path)
            .field("enabled", &self.capacity.is_enabled())
            .finish()
    }
}
