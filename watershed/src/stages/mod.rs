//! Pipeline stages.
//!
//! A stage is a unit the pipeline runs in sequence. Per-tile work inside a
//! stage is expressed as [`TileOp`] variants and driven by the unit runner.

mod contour;
mod hydrology;
mod key;
mod merge;
mod naming;
mod tile_op;
mod tiling;

pub use contour::ContourPipeline;
pub use hydrology::{DirectionMosaic, HydroState, HydrologyPipeline};
pub use key::StageKey;
pub use merge::{MergeOutcome, MergeStage};
pub use naming::{final_names, NameAssigner, NamingReport};
pub use tile_op::TileOp;
pub use tiling::TileManager;

use crate::context::PipelineContext;
use crate::core::StageReport;
use crate::errors::Result;
use crate::pipeline::RunMode;
use async_trait::async_trait;
use std::fmt::Debug;

/// A step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Stage name, used in reports and logs.
    fn name(&self) -> &str;

    /// Runs the stage.
    async fn execute(&self, ctx: &PipelineContext, mode: RunMode) -> Result<StageReport>;
}
