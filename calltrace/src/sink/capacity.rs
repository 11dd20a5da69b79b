//! Free-space watchdog for the stats destination.
//!
//! Proactive backpressure: a background thread polls the destination
//! volume's free space on a fixed interval and flips a shared enabled flag
//! when it crosses the configured threshold, instead of every write paying
//! for its own space check. Writers may observe a stale flag for up to one
//! polling interval; the cost is one extra or missing write attempt, never
//! corruption.

#![allow(unsafe_code)] // statvfs() requires unsafe

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{info, warn};

/// Shared output-enabled flag plus the human-readable reason while disabled.
/// Mutated only by the monitor, read by the sink.
#[derive(Debug)]
pub struct CapacityState {
    enabled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CapacityState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            reason: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn disable(&self, reason: String) {
        warn!("tracing output disabled: {reason}");
        self.set_reason(Some(reason));
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn enable(&self) {
        info!("tracing output re-enabled");
        self.set_reason(None);
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Why output is currently disabled, if it is.
    #[must_use]
    pub fn disabled_reason(&self) -> Option<String> {
        match self.reason.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_reason(&self, reason: Option<String>) {
        match self.reason.lock() {
            Ok(mut guard) => *guard = reason,
            Err(poisoned) => *poisoned.into_inner() = reason,
        }
    }
}

impl Default for CapacityState {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for the background polling thread. Dropping it signals the thread
/// to stop and joins it.
#[derive(Debug)]
pub struct CapacityMonitor {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl CapacityMonitor {
    /// Start polling free space on the volume holding `output_path`.
    ///
    /// The first probe runs synchronously before this returns, so the flag
    /// is settled by the time the agent starts tracing; afterwards one probe
    /// runs per `poll_interval`.
    #[must_use]
    pub fn start(
        output_path: &Path,
        threshold_mb: u64,
        poll_interval: Duration,
        state: Arc<CapacityState>,
    ) -> Self {
        // The stats file may not exist yet; probe its parent directory.
        let volume = output_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        probe(&volume, threshold_mb, &state);

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = std::thread::Builder::new()
            .name("calltrace-capacity".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(poll_interval) {
                    Err(RecvTimeoutError::Timeout) => probe(&volume, threshold_mb, &state),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });
        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("failed to start capacity monitor thread: {e}");
                None
            }
        };
        Self { stop_tx, thread }
    }
}

impl Drop for CapacityMonitor {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// One polling round: read free space and apply the threshold. A failed
/// probe leaves the state untouched.
fn probe(volume: &Path, threshold_mb: u64, state: &CapacityState) {
    if let Some(free_bytes) = free_space_bytes(volume) {
        apply_probe(state, free_bytes, threshold_mb, volume);
    }
}

/// Threshold decision, split from the filesystem probe so it can be tested
/// with explicit readings. Strictly below the threshold disables, strictly
/// above re-enables; a reading exactly at the threshold changes nothing.
fn apply_probe(state: &CapacityState, free_bytes: u64, threshold_mb: u64, volume: &Path) {
    let free_mb = free_bytes / 1_000_000;
    if state.is_enabled() {
        if free_mb < threshold_mb {
            state.disable(format!(
                "free space below {threshold_mb} MB on {}: {free_bytes} bytes available",
                volume.display()
            ));
        }
    } else if free_mb > threshold_mb {
        state.enable();
    }
}

#[cfg(unix)]
fn free_space_bytes(volume: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(volume.as_os_str().as_bytes()).ok()?;
    let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) };
    if rc != 0 {
        return None;
    }
    // Blocks available to unprivileged users, in fragment-size units.
    #[allow(clippy::unnecessary_cast)]
    Some(stats.f_bavail as u64 * stats.f_frsize as u64)
}

#[cfg(not(unix))]
fn free_space_bytes(_volume: &Path) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_enabled_with_no_reason() {
        let state = CapacityState::new();
        assert!(state.is_enabled());
        assert!(state.disabled_reason().is_none());
    }

    #[test]
    fn probe_below_threshold_disables_with_reason() {
        let state = CapacityState::new();
        apply_probe(&state, 50_000_000, 100, Path::new("/tmp"));
        assert!(!state.is_enabled());
        let reason = state.disabled_reason().expect("reason");
        assert!(reason.contains("below 100 MB"));
        assert!(reason.contains("50000000 bytes"));
    }

    #[test]
    fn probe_above_threshold_reenables_and_clears_reason() {
        let state = CapacityState::new();
        apply_probe(&state, 50_000_000, 100, Path::new("/tmp"));
        assert!(!state.is_enabled());
        apply_probe(&state, 200_000_000, 100, Path::new("/tmp"));
        assert!(state.is_enabled());
        assert!(state.disabled_reason().is_none());
    }

    #[test]
    fn reading_at_the_threshold_changes_nothing() {
        let state = CapacityState::new();
        // Exactly at the threshold while enabled: stays enabled.
        apply_probe(&state, 100_000_000, 100, Path::new("/tmp"));
        assert!(state.is_enabled());

        apply_probe(&state, 0, 100, Path::new("/tmp"));
        assert!(!state.is_enabled());
        // Exactly at the threshold while disabled: stays disabled.
        apply_probe(&state, 100_000_000, 100, Path::new("/tmp"));
        assert!(!state.is_enabled());
    }

    #[test]
    fn probe_while_enabled_and_plentiful_is_a_no_op() {
        let state = CapacityState::new();
        apply_probe(&state, u64::MAX, 100, Path::new("/tmp"));
        assert!(state.is_enabled());
        assert!(state.disabled_reason().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn free_space_probe_reads_a_real_volume() {
        let free = free_space_bytes(Path::new("/"));
        assert!(free.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn free_space_probe_fails_on_missing_path() {
        assert!(free_space_bytes(Path::new("/nonexistent/calltrace")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn monitor_first_probe_runs_before_start_returns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = Arc::new(CapacityState::new());
        // Impossible threshold: any real volume is below it, so the
        // synchronous first probe must disable output immediately.
        let monitor = CapacityMonitor::start(
            &dir.path().join("stats.json"),
            u64::MAX,
            Duration::from_secs(3600),
            Arc::clone(&state),
        );
        assert!(!state.is_enabled());
        assert!(state.disabled_reason().is_some());
        drop(monitor);
    }

    #[test]
    fn dropping_the_monitor_stops_the_thread() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = Arc::new(CapacityState::new());
        let monitor = CapacityMonitor::start(
            &dir.path().join("stats.json"),
            1,
            Duration::from_millis(10),
            Arc::clone(&state),
        );
        drop(monitor); // joins; must not hang
    }
}
