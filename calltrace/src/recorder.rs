//! Per-thread call-stack recording.
//!
//! Each execution context (thread) owns one [`CallStack`]: an append-only
//! frame list plus a depth counter. The instrumentation layer drives it with
//! a matched `enter`/`exit` pair around every tracked invocation, on the
//! thread that runs the invocation; no locking is involved on this path.
//!
//! Known limitation, inherited by design: if `exit` is never called for an
//! open frame (the hook was skipped by abnormal termination of the call),
//! that frame and everything above it leak until the next root completion
//! on the same thread clears the stack.

use std::sync::OnceLock;
use std::time::Instant;

use log::debug;

use crate::domain::{FrameHandle, Micros};

/// One recorded invocation: created on entry, duration set once on exit,
/// never otherwise mutated.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Fully-qualified method signature, e.g. `com.acme.Foo.bar(int,String)`.
    pub label: String,
    /// 1-based nesting level at entry time. Never renumbered afterwards:
    /// the encoder reads these values, not list positions.
    pub depth: u32,
    pub start: Micros,
    pub duration: Micros,
    /// Captured parameter values, in declaration order.
    pub params: Option<Vec<String>>,
}

/// Filtering thresholds, immutable once loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Thresholds {
    pub min_duration_micros: u64,
    pub min_root_duration_micros: u64,
}

/// Call-stack recorder for a single execution context.
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
    depth: u32,
}

impl CallStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a method entry. O(1): push a frame, return its index as the
    /// handle. Handles stay valid until the stack is cleared at root
    /// completion.
    pub fn enter(&mut self, label: &str, params: Option<Vec<String>>, debug_call: bool) -> FrameHandle {
        self.depth += 1;
        let handle = FrameHandle(self.frames.len());
        if debug_call {
            debug!(
                "{label} called (depth {}, called from {})",
                self.depth,
                self.parent_label(self.depth).unwrap_or("-")
            );
        }
        self.frames.push(Frame {
            label: label.to_string(),
            depth: self.depth,
            start: now_micros(),
            duration: Micros(0),
            params,
        });
        handle
    }

    /// Record a method exit.
    ///
    /// Returns the completed frame list when this exit closed a root trace
    /// that met `min_root_duration_micros`; the stack is cleared and the
    /// depth counter reset in either case when a root exits.
    pub fn exit(
        &mut self,
        handle: FrameHandle,
        thresholds: &Thresholds,
        debug_call: bool,
    ) -> Option<Vec<Frame>> {
        self.exit_at(handle, now_micros(), thresholds, debug_call)
    }

    /// `exit` with the clock injected, so filtering and root handling can be
    /// exercised with explicit durations.
    fn exit_at(
        &mut self,
        handle: FrameHandle,
        now: Micros,
        thresholds: &Thresholds,
        debug_call: bool,
    ) -> Option<Vec<Frame>> {
        let Some(frame) = self.frames.get_mut(handle.0) else {
            // Exit without a matching open frame: tolerated, never surfaced
            // to the traced application.
            if debug_call {
                debug!("exit for unknown {handle}, ignored");
            }
            return None;
        };
        frame.duration = now.saturating_sub(frame.start);
        let depth = frame.depth;
        let duration = frame.duration;
        let below_min = duration.0 < thresholds.min_duration_micros;
        if debug_call {
            let parent = self.parent_label(depth).unwrap_or("-").to_string();
            let frame = &self.frames[handle.0];
            if below_min {
                debug!(
                    "time spent on {}: {} (depth {depth}, called from {parent}), dropped below {}",
                    frame.label,
                    duration,
                    Micros(thresholds.min_duration_micros)
                );
            } else {
                debug!(
                    "time spent on {}: {} (depth {depth}, called from {parent})",
                    frame.label, duration
                );
            }
        }
        if below_min {
            // Removing one frame shifts list positions but not the recorded
            // depth of any other frame, which is all the encoder looks at.
            self.frames.remove(handle.0);
        }
        if depth == 1 {
            // Root completing: drain and reset no matter what, whether or
            // not a document gets emitted.
            let frames = std::mem::take(&mut self.frames);
            self.depth = 0;
            if duration.0 >= thresholds.min_root_duration_micros && !frames.is_empty() {
                return Some(frames);
            }
            return None;
        }
        self.depth = self.depth.saturating_sub(1);
        None
    }

    /// Nearest earlier frame one level up, for debug attribution.
    fn parent_label(&self, depth: u32) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.depth + 1 == depth)
            .map(|frame| frame.label.as_str())
    }

    /// Current open nesting level.
    #[must_use]
    pub fn open_depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Monotonic microseconds since the first call in this process.
fn now_micros() -> Micros {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    Micros(u64::try_from(epoch.elapsed().as_micros()).unwrap_or(u64::MAX))
}
