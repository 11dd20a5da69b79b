//! Domain model for calltrace
//!
//! Core types and errors shared across the engine:
//! - Compile-time safety via newtype pattern
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{FrameHandle, Micros};

pub use errors::{ConfigError, StatsError};
