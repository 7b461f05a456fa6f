//! Splitting the source DEM into quarter-section tiles.

use super::{Stage, StageKey};
use crate::context::PipelineContext;
use crate::core::{Artifact, RasterTile, StageReport};
use crate::errors::{ConfigurationError, Result, WatershedError};
use crate::pipeline::{mark_done, step_done, RunMode};
use crate::raster::Raster;
use crate::workspace::Location;
use async_trait::async_trait;
use std::io;
use std::time::Instant;
use tracing::info;

/// Cuts the source DEM into one padded tile per quarter section.
#[derive(Debug, Clone, Default)]
pub struct TileManager;

impl TileManager {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Deletes every tile. Idempotent.
    pub fn clear_outputs(ctx: &PipelineContext) -> Result<usize> {
        ctx.workspace().clear(Location::Tiles)
    }

    /// Loads the source DEM, mosaicking it first when it comes as several
    /// rasters.
    pub fn load_dem(ctx: &PipelineContext) -> Result<Raster<f64>> {
        let ws = ctx.workspace();
        let names = ws.list_rasters(Location::Dem)?;
        let mut rasters = names
            .iter()
            .map(|name| ws.read_raster::<f64>(Location::Dem, name))
            .collect::<Result<Vec<_>>>()?;
        match rasters.len() {
            0 => Err(WatershedError::io(
                ws.dir(Location::Dem),
                io::Error::new(io::ErrorKind::NotFound, "no source elevation rasters"),
            )),
            1 => Ok(rasters.remove(0)),
            n => {
                info!(inputs = n, "Mosaicking source elevation rasters");
                Ok(ctx.engine().mosaic_elevation(&rasters)?)
            }
        }
    }

    /// Splits the DEM by the reference regions and writes the tiles in
    /// region order. Returns a descriptor per tile.
    pub fn split_raster(ctx: &PipelineContext) -> Result<Vec<RasterTile>> {
        let regions = ctx.regions()?;
        let dem = Self::load_dem(ctx)?;
        let tiling = &ctx.config().tiling;
        let tiles = ctx
            .engine()
            .split_raster(&dem, &tiling.source_dem, regions.sections(), tiling.overlap)?;
        if tiles.is_empty() {
            return Err(ConfigurationError::new("no reference region intersects the source DEM")
                .with_field("reference")
                .into());
        }
        let ws = ctx.workspace();
        tiles
            .iter()
            .enumerate()
            .map(|(i, tile)| {
                let name = format!("{}{i}", tiling.tile_prefix);
                ws.write_raster(Location::Tiles, &name, tile)?;
                Ok(RasterTile::describe(name, tile))
            })
            .collect()
    }
}

#[async_trait]
impl Stage for TileManager {
    fn name(&self) -> &str {
        "tiling"
    }

    async fn execute(&self, ctx: &PipelineContext, mode: RunMode) -> Result<StageReport> {
        let started = Instant::now();
        let key = StageKey::Split;
        if mode != RunMode::Fresh && step_done(ctx, key)? {
            return Ok(StageReport::skip(key.name(), "tiles already split"));
        }
        let removed = Self::clear_outputs(ctx)?;
        ctx.checkpoints().reset(&key.name())?;

        let task_ctx = ctx.clone();
        let tiles = tokio::task::spawn_blocking(move || Self::split_raster(&task_ctx)).await??;
        mark_done(ctx, key)?;
        info!(tiles = tiles.len(), removed, "Tile count");

        let artifacts = tiles
            .iter()
            .map(|t| Artifact::raster(Location::Tiles, t.id.as_str()));
        Ok(StageReport::ok(key.name())
            .with_units(tiles.len(), 0)
            .with_artifacts(artifacts)
            .with_data("tiles", serde_json::to_value(&tiles)?)
            .with_duration_ms(started.elapsed().as_secs_f64() * 1000.0))
    }
}
