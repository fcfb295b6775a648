//! Analysis lifecycle events.
//!
//! The coordinator reports progress to an [`EventSink`] in addition to the
//! record itself. Event names:
//!
//! - `analysis.started`
//! - `phase.completed` / `phase.failed`
//! - `analysis.ended` / `analysis.timed_out`

mod sink;

pub use sink::{CollectingEventSink, EventSink, LifecycleEvent, LoggingEventSink, NoOpEventSink};

/// Emitted when the coordinator accepts an input.
pub const ANALYSIS_STARTED: &str = "analysis.started";
/// Emitted when a phase writes its completion timestamp.
pub const PHASE_COMPLETED: &str = "phase.completed";
/// Emitted when a phase handler fails.
pub const PHASE_FAILED: &str = "phase.failed";
/// Emitted once the record reaches its terminal state.
pub const ANALYSIS_ENDED: &str = "analysis.ended";
/// Emitted when the caller's timeout forced the terminal state.
pub const ANALYSIS_TIMED_OUT: &str = "analysis.timed_out";
