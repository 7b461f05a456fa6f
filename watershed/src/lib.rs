//! # Watershed
//!
//! A checkpointed terrain and hydrology pipeline.
//!
//! Watershed cuts an elevation model into one tile per quarter section,
//! derives contour lines, contour polygons and a stream network from the
//! tiles, names every feature after the quarter section that contains it,
//! and merges each theme into a single class. It provides:
//!
//! - **Tiling**: one overlapping tile per region, with lineage
//! - **Per-tile steps**: run concurrently, checkpointed in natural order
//! - **Flow routing**: a barrier mosaic so streams stay continuous across tiles
//! - **Regional naming**: containment first, orphans and ambiguities surfaced
//! - **Observability**: scoped start/complete logging and progress events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use watershed::prelude::*;
//!
//! let config = PipelineConfig::from_file("watershed.json")?;
//! let ctx = PipelineContext::new(config)?;
//! let report = run_group(&ctx, StageGroup::All, RunMode::Resume).await;
//! assert!(report.is_success());
//! ```

#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod raster;
pub mod stages;
pub mod utils;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::context::{PipelineContext, RunIdentity};
    pub use crate::core::{
        Artifact, FeatureClass, QuarterSection, RegionLayer, StageReport, StageStatus, Theme, VectorFeature,
    };
    pub use crate::engine::{GeoEngine, NativeEngine, OrderMethod};
    pub use crate::errors::{Result, WatershedError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LogConfig};
    pub use crate::pipeline::{run_group, run_guarded, RunMode, RunReport, StageGroup};
    pub use crate::stages::Stage;
    pub use crate::workspace::{Location, Workspace};
}
