//! # calltrace - Method-Level Call-Tree Tracing Runtime
//!
//! calltrace records entry/exit timing for selected methods of a running
//! program and renders every top-level invocation as one nested call-tree
//! document, appended to a stats file one document per line.
//!
//! The mechanism that physically inserts hooks into target code is an
//! external collaborator: it consults the selector once per class load,
//! then brackets each surviving method with the tracer's hook pair.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Instrumentation Layer (external)            │
//! │        is_tracked()? per class load · hooks per call        │
//! └───────────────┬─────────────────────────────────────────────┘
//!                 │ on_enter / on_exit, per thread
//!                 ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     calltrace (this crate)                  │
//! │                                                             │
//! │  ┌──────────┐   ┌────────────┐   ┌─────────┐   ┌─────────┐ │
//! │  │ Selector │──▶│  Recorder  │──▶│ Encoder │──▶│  Sink   │ │
//! │  │ (rules)  │   │ (per-thread│   │ (depth →│   │ (append,│ │
//! │  │          │   │  stacks)   │   │  tree)  │   │  mutex) │ │
//! │  └──────────┘   └────────────┘   └─────────┘   └────┬────┘ │
//! │                                                     │      │
//! │                                  ┌─────────────┐    │      │
//! │                                  │  Capacity   │────┘      │
//! │                                  │  Monitor    │ enabled?  │
//! │                                  └─────────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`selector`]: rule-based include/exclude decisions, wildcard prefixes
//!   with longest-literal-prefix tie-break
//! - [`recorder`]: per-thread call stacks; entry/exit timing, per-frame
//!   and per-root duration floors
//! - [`encoder`]: flat depth-annotated frame list → nested document
//! - [`sink`]: serialized append writes plus the free-space watchdog
//! - [`agent`]: the [`agent::Tracer`] context object and hook API
//! - [`config`]: structured configuration model, loaded from JSON
//! - [`analysis`]: offline summarization of a recorded stats file
//! - [`cli`]: command-line arguments for the check/summarize binary
//! - [`domain`]: core newtypes and errors
//!
//! ## Concurrency Model
//!
//! Every thread owns its call-stack state; the steady-state hot path takes
//! no locks. The only shared mutable resources are the output destination
//! (one mutex, taken at root completion only) and the capacity flag (one
//! atomic, eventually consistent).

pub mod agent;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod domain;
pub mod encoder;
pub mod recorder;
pub mod selector;
pub mod sink;
