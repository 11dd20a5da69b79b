//! Newtype wrappers for the engine's core quantities.

use std::fmt;

/// Index of a frame in a thread's append-only call stack.
///
/// Handles stay stable because the stack only ever appends until it is
/// cleared in full at root completion; a handle from a previous root is
/// invalid and `exit` treats it as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(pub usize);

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Monotonic microseconds, used for both timestamps and durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Micros(pub u64);

impl Micros {
    /// Milliseconds as a fractional value, no rounding.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_millis(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    #[must_use]
    pub fn saturating_sub(self, earlier: Micros) -> Micros {
        Micros(self.0.saturating_sub(earlier.0))
    }
}

/// Renders as a fractional millisecond label, e.g. `120.0ms` for 120000μs.
/// This is the exact form emitted into call-tree documents.
impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}ms", self.as_millis())
    }
}
