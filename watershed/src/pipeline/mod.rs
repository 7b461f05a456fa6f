//! Running stages.
//!
//! This module provides:
//! - Checkpointed per-unit execution
//! - Stage groups and run reports
//! - The outermost error boundary

mod boundary;
mod groups;
mod runner;


pub use boundary::{error_chain, run_guarded};
pub use groups::{run_group, RunReport, StageGroup};
pub use runner::{mark_done, start_index, step_done, RunMode, UnitRunner, WorkUnit};
