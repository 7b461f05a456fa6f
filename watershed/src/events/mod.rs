//! Event emission for pipeline progress.
//!
//! Stages report progress through an [`EventSink`] carried by the pipeline
//! context. There is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names.
pub mod names {
    /// A stage started.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage finished.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage failed.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A work unit finished.
    pub const UNIT_COMPLETED: &str = "unit.completed";
    /// A checkpoint moved forward.
    pub const CHECKPOINT_ADVANCED: &str = "checkpoint.advanced";
    /// A feature had no containing region.
    pub const FEATURE_ORPHANED: &str = "naming.orphaned";
    /// A feature had several containing regions.
    pub const FEATURE_AMBIGUOUS: &str = "naming.ambiguous";
}
