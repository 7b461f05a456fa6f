//! Flow routing and stream extraction.
//!
//! Fill and flow direction run per tile. Everything after the barrier works
//! on the single direction mosaic, so a failure there is fatal for the run.

use super::contour::merge_step;
use super::{Stage, StageKey, TileOp};
use crate::context::PipelineContext;
use crate::core::{Artifact, FeatureClass, GeometryKind, StageReport};
use crate::errors::{Result, WatershedError};
use crate::observability::scoped;
use crate::pipeline::{mark_done, step_done, RunMode, UnitRunner};
use crate::raster::{Lineage, Raster};
use crate::workspace::Location;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::time::Instant;
use tracing::info;

const MOSAIC: &str = "direction_mosaic";
const ORDER: &str = "stream_order";
const CONDITION: &str = "stream_condition";
const STREAMS: &str = "streams";

/// Steps of the hydrology pipeline, strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydroState {
    /// Depression filling, per tile.
    Fill,
    /// D8 flow direction, per tile.
    Direction,
    /// Barrier, then mosaic of the direction tiles.
    MergeDirection,
    /// Stream order over the mosaic.
    Order,
    /// Threshold on stream order.
    Condition,
    /// Vectorize surviving cells.
    StreamExtract,
    /// Split the network by region.
    SplitByRegion,
    /// Finished.
    Done,
}

impl HydroState {
    /// The state that follows.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Fill => Self::Direction,
            Self::Direction => Self::MergeDirection,
            Self::MergeDirection => Self::Order,
            Self::Order => Self::Condition,
            Self::Condition => Self::StreamExtract,
            Self::StreamExtract => Self::SplitByRegion,
            Self::SplitByRegion | Self::Done => Self::Done,
        }
    }

    /// The per-tile operation of a pre-barrier state.
    #[must_use]
    pub const fn tile_op(self) -> Option<TileOp> {
        match self {
            Self::Fill => Some(TileOp::Fill),
            Self::Direction => Some(TileOp::Direction),
            _ => None,
        }
    }

    /// Checkpoint key of a post-barrier state.
    #[must_use]
    pub const fn key(self) -> Option<StageKey> {
        match self {
            Self::Fill => Some(StageKey::Tile(TileOp::Fill)),
            Self::Direction => Some(StageKey::Tile(TileOp::Direction)),
            Self::MergeDirection => Some(StageKey::MergeDirection),
            Self::Order => Some(StageKey::Order),
            Self::Condition => Some(StageKey::Condition),
            Self::StreamExtract => Some(StageKey::StreamExtract),
            Self::SplitByRegion => Some(StageKey::SplitByRegion),
            Self::Done => None,
        }
    }

    /// Returns true for states that work on the mosaic.
    #[must_use]
    pub const fn after_barrier(self) -> bool {
        !matches!(self, Self::Fill | Self::Direction)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Fill => "Fill",
            Self::Direction => "Flow Direction",
            Self::MergeDirection => "Merge Direction",
            Self::Order => "Stream Order",
            Self::Condition => "Condition",
            Self::StreamExtract => "Stream To Feature",
            Self::SplitByRegion => "Split By Region",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for HydroState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The flow-direction raster covering every tile.
///
/// Only built after every tile has a direction raster.
#[derive(Debug, Clone)]
pub struct DirectionMosaic(Raster<u8>);

impl DirectionMosaic {
    /// Checks the barrier and mosaics the direction tiles.
    ///
    /// Fails with an I/O error naming the first tile whose direction raster
    /// is missing.
    pub fn merge(ctx: &PipelineContext) -> Result<Self> {
        let ws = ctx.workspace();
        let tiles = ws.list_rasters(Location::Tiles)?;
        let mut rasters = Vec::with_capacity(tiles.len());
        for (index, tile) in tiles.iter().enumerate() {
            let name = TileOp::Direction.output_name(index);
            if !ws.has_raster(Location::Direction, &name) {
                return Err(WatershedError::io(
                    ws.raster_path(Location::Direction, &name),
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("tile '{tile}' has no flow direction; every tile must finish before merging"),
                    ),
                ));
            }
            rasters.push(ws.read_raster::<u8>(Location::Direction, &name)?);
        }
        Ok(Self(ctx.engine().mosaic_direction(&rasters)?))
    }

    /// Loads the stored mosaic.
    pub fn load(ctx: &PipelineContext) -> Result<Self> {
        ctx.workspace().read_raster(Location::Mosaic, MOSAIC).map(Self)
    }

    /// The raster.
    #[must_use]
    pub fn raster(&self) -> &Raster<u8> {
        &self.0
    }
}

/// Runs the hydrology state machine.
#[derive(Debug, Clone, Default)]
pub struct HydrologyPipeline;

impl HydrologyPipeline {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn run_global(ctx: &PipelineContext, state: HydroState) -> Result<Vec<Artifact>> {
        let ws = ctx.workspace();
        let engine = ctx.engine();
        let hydrology = &ctx.config().hydrology;
        match state {
            HydroState::MergeDirection => {
                let mosaic = DirectionMosaic::merge(ctx)?;
                ws.write_raster(Location::Mosaic, MOSAIC, mosaic.raster())?;
                Ok(vec![Artifact::raster(Location::Mosaic, MOSAIC)])
            }
            HydroState::Order => {
                let mosaic = DirectionMosaic::load(ctx)?;
                let order = engine.stream_order(mosaic.raster(), hydrology.order_method)?;
                ws.write_raster(Location::Order, ORDER, &order)?;
                Ok(vec![Artifact::raster(Location::Order, ORDER)])
            }
            HydroState::Condition => {
                let order: Raster<u32> = ws.read_raster(Location::Order, ORDER)?;
                let kept = engine.condition(&order, hydrology.stream_order_threshold)?;
                ws.write_raster(Location::Condition, CONDITION, &kept)?;
                Ok(vec![Artifact::raster(Location::Condition, CONDITION)])
            }
            HydroState::StreamExtract => {
                let kept: Raster<u32> = ws.read_raster(Location::Condition, CONDITION)?;
                let mosaic = DirectionMosaic::load(ctx)?;
                let lines = engine.stream_to_feature(&kept, mosaic.raster())?;
                let class = FeatureClass::new(STREAMS, GeometryKind::Line).with_features(lines);
                ws.write_class(Location::StreamsIntermediate, &class)?;
                Ok(vec![Artifact::features(Location::StreamsIntermediate, STREAMS, class.len())])
            }
            HydroState::SplitByRegion => {
                let network = ws.read_class(Location::StreamsIntermediate, STREAMS)?;
                let regions = ctx.regions()?;
                let parts = engine.split_by_region(&network.features, regions.sections())?;
                ws.clear(Location::StreamsSplit)?;
                let mut artifacts = Vec::with_capacity(parts.len());
                for (code, features) in parts {
                    let name = format!("{STREAMS}_{code}");
                    let lineage = regions.get(&code).map(|region| Lineage {
                        source: STREAMS.to_string(),
                        region_code: code.clone(),
                        core: region.polygon.clone(),
                    });
                    let class = FeatureClass::new(&name, GeometryKind::Line)
                        .with_lineage(lineage)
                        .with_features(features);
                    ws.write_class(Location::StreamsSplit, &class)?;
                    artifacts.push(Artifact::features(Location::StreamsSplit, name, class.len()));
                }
                info!(regions = artifacts.len(), "Stream network split");
                Ok(artifacts)
            }
            HydroState::Fill | HydroState::Direction | HydroState::Done => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Stage for HydrologyPipeline {
    fn name(&self) -> &str {
        "hydrology"
    }

    async fn execute(&self, ctx: &PipelineContext, mode: RunMode) -> Result<StageReport> {
        let started = Instant::now();
        let runner = UnitRunner::new(ctx);
        let mut report = StageReport::ok(self.name());
        // Once any step does work, everything after it is recomputed.
        let mut dirty = mode == RunMode::Fresh;
        let mut step_mode = mode;
        let mut state = HydroState::Fill;

        while state != HydroState::Done {
            if let Some(op) = state.tile_op() {
                let step = runner.run(op, step_mode).await?;
                dirty |= step.units_processed > 0;
                report = merge_step(report, step);
                step_mode = mode.downstream();
            } else if let Some(key) = state.key() {
                if !dirty && step_done(ctx, key)? {
                    info!(state = %state, "Already complete");
                    report.units_skipped += 1;
                } else {
                    let task_ctx = ctx.clone();
                    let artifacts = scoped(state.label(), async move {
                        tokio::task::spawn_blocking(move || Self::run_global(&task_ctx, state)).await?
                    })
                    .await?;
                    mark_done(ctx, key)?;
                    dirty = true;
                    report.units_processed += 1;
                    report.artifacts.extend(artifacts);
                }
            }
            state = state.next();
        }
        Ok(report.with_duration_ms(started.elapsed().as_secs_f64() * 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::TileManager;
    use crate::testing::{scenario_config, seed_workspace};
    use geo::{Geometry, LineString};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn tiled_context(dir: &TempDir) -> PipelineContext {
        let ctx = PipelineContext::new(scenario_config(dir.path())).unwrap();
        seed_workspace(&ctx);
        TileManager::new().execute(&ctx, RunMode::Fresh).await.unwrap();
        ctx
    }

    fn line(class: &FeatureClass) -> &LineString<f64> {
        match &class.features[0].geometry {
            Geometry::LineString(ls) => ls,
            other => panic!("expected a line, got {other:?}"),
        }
    }

    #[test]
    fn test_states_run_in_order() {
        let mut state = HydroState::Fill;
        let mut seen = vec![state];
        while state != HydroState::Done {
            state = state.next();
            seen.push(state);
        }
        assert_eq!(seen.len(), 8);
        assert!(!HydroState::Direction.after_barrier());
        assert!(HydroState::MergeDirection.after_barrier());
    }

    #[tokio::test]
    async fn test_network_is_continuous_across_tiles() {
        let dir = TempDir::new().unwrap();
        let ctx = tiled_context(&dir).await;

        HydrologyPipeline::new().execute(&ctx, RunMode::Fresh).await.unwrap();

        let ws = ctx.workspace();
        let network = ws.read_class(Location::StreamsIntermediate, STREAMS).unwrap();
        assert_eq!(network.len(), 1);

        let split = ws.list_classes(Location::StreamsSplit).unwrap();
        assert_eq!(split, vec!["streams_Q1", "streams_Q2", "streams_Q3"]);
        let pieces: Vec<FeatureClass> = split
            .iter()
            .map(|name| ws.read_class(Location::StreamsSplit, name).unwrap())
            .collect();
        let ends = |class: &FeatureClass| {
            let ls = line(class);
            let (a, b) = (ls.0[0].x, ls.0[ls.0.len() - 1].x);
            (a.min(b), a.max(b))
        };
        // Neighbouring pieces meet exactly on the shared region boundary.
        assert!((ends(&pieces[0]).1 - 30.0).abs() < 1e-9);
        assert!((ends(&pieces[1]).0 - 30.0).abs() < 1e-9);
        assert!((ends(&pieces[1]).1 - 60.0).abs() < 1e-9);
        assert!((ends(&pieces[2]).0 - 60.0).abs() < 1e-9);
        let total: f64 = pieces.iter().map(FeatureClass::total_length).sum();
        assert!((total - network.total_length()).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_barrier_requires_every_direction_tile() {
        let dir = TempDir::new().unwrap();
        let ctx = tiled_context(&dir).await;
        let runner = UnitRunner::new(&ctx);
        runner.run(TileOp::Fill, RunMode::Fresh).await.unwrap();
        runner.run(TileOp::Direction, RunMode::Fresh).await.unwrap();
        ctx.workspace()
            .clear(Location::Direction)
            .unwrap();

        let err = DirectionMosaic::merge(&ctx).unwrap_err();
        assert_eq!(err.category(), "IOError");
        assert!(!err.is_tile_local());
        assert!(err.to_string().contains("direction_000"));
    }

    #[tokio::test]
    async fn test_resume_skips_completed_states() {
        let dir = TempDir::new().unwrap();
        let ctx = tiled_context(&dir).await;
        HydrologyPipeline::new().execute(&ctx, RunMode::Fresh).await.unwrap();

        let report = HydrologyPipeline::new().execute(&ctx, RunMode::Resume).await.unwrap();
        assert_eq!(report.units_processed, 0);
        // 3 fill + 3 direction + 5 global steps.
        assert_eq!(report.units_skipped, 11);
    }
}
