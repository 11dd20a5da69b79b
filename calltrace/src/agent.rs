//! Tracer context and the instrumentation-facing hook API.
//!
//! The [`Tracer`] is the one explicitly constructed object holding the
//! loaded selector, thresholds and output sink — no implicit process-wide
//! configuration statics, so initialization order stays deterministic and
//! testable. Only the per-thread call stack is thread-local state.
//!
//! The external instrumentation layer calls `on_enter`/`on_exit` as a
//! matched pair around every tracked invocation, synchronously, on the
//! thread that runs it. The hot path (non-root enter/exit) touches nothing
//! shared; the output mutex is taken only when a root trace completes.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::config::AgentConfig;
use crate::domain::{ConfigError, FrameHandle};
use crate::encoder;
use crate::recorder::{CallStack, Thresholds};
use crate::selector::MethodSelector;
use crate::sink::{CapacityMonitor, CapacityState, OutputSink};

thread_local! {
    // One call stack per thread, shared by whatever tracer runs on it;
    // created lazily on the first enter.
    static CALL_STACK: RefCell<CallStack> = RefCell::new(CallStack::new());
}

/// The tracing context the instrumentation layer drives.
#[derive(Debug)]
pub struct Tracer {
    selector: MethodSelector,
    thresholds: Thresholds,
    sink: OutputSink,
}

impl Tracer {
    /// Selection rules, consulted ahead of time (per class load) to decide
    /// which methods receive hooks at all.
    #[must_use]
    pub fn selector(&self) -> &MethodSelector {
        &self.selector
    }

    /// Hook called synchronously before the real method body runs.
    pub fn on_enter(
        &self,
        signature: &str,
        params: Option<Vec<String>>,
        debug_call: bool,
    ) -> FrameHandle {
        CALL_STACK.with(|stack| stack.borrow_mut().enter(signature, params, debug_call))
    }

    /// Hook called synchronously after the method returns (or unwinds, if
    /// the instrumentation covers that path).
    pub fn on_exit(&self, handle: FrameHandle, debug_call: bool) {
        let completed = CALL_STACK
            .with(|stack| stack.borrow_mut().exit(handle, &self.thresholds, debug_call));
        let Some(frames) = completed else {
            return;
        };
        // Root trace completed. Skip the encoding work outright while the
        // capacity monitor has output disabled.
        if !self.sink.is_enabled() {
            return;
        }
        if let Some(doc) = encoder::encode(&frames) {
            self.sink.write(&doc);
        }
    }

    #[must_use]
    pub fn output_enabled(&self) -> bool {
        self.sink.is_enabled()
    }
}

/// Installed agent: the tracer plus the background capacity monitor.
#[derive(Debug)]
pub struct Agent {
    tracer: Arc<Tracer>,
    capacity: Arc<CapacityState>,
    monitor: Option<CapacityMonitor>,
}

impl Agent {
    /// Build the tracer from a loaded configuration and start the capacity
    /// monitor when a disk threshold is configured.
    #[must_use]
    pub fn install(config: &AgentConfig) -> Self {
        let capacity = Arc::new(CapacityState::new());
        let selector = MethodSelector::from_config(config);
        let sink = OutputSink::new(&config.output, Arc::clone(&capacity));
        let monitor = (config.disk_guard.threshold_mb > 0).then(|| {
            CapacityMonitor::start(
                &config.output.path,
                config.disk_guard.threshold_mb,
                Duration::from_secs(config.disk_guard.poll_interval_secs),
                Arc::clone(&capacity),
            )
        });
        info!(
            "calltrace installed: {} include / {} exclude rules, writing to {}",
            selector.include_count(),
            selector.exclude_count(),
            config.output.path.display()
        );
        Self {
            tracer: Arc::new(Tracer {
                selector,
                thresholds: Thresholds {
                    min_duration_micros: config.min_duration_micros,
                    min_root_duration_micros: config.min_root_duration_micros,
                },
                sink,
            }),
            capacity,
            monitor,
        }
    }

    /// Load configuration and install in one step. A broken configuration
    /// is fatal for the caller: no default is substituted.
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let config = AgentConfig::load(path)?;
        Ok(Self::install(&config))
    }

    #[must_use]
    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.tracer
    }

    /// Capacity state, so the host process can ask whether output is
    /// currently disabled and why.
    #[must_use]
    pub fn capacity(&self) -> &CapacityState {
        &self.capacity
    }

    /// Stop the capacity monitor thread. Traces recorded after shutdown
    /// still write under whatever enabled flag was last observed.
    pub fn shutdown(mut self) {
        if let Some(monitor) = self.monitor.take() {
            drop(monitor);
        }
    }
}
