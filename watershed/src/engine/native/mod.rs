//! In-process engine.

mod contour;
mod generalize;
mod hydrology;
mod mosaic;
mod polygons;
mod spatial;

use super::{EngineResult, GeoEngine, Generalized, OrderMethod};
use crate::core::{QuarterSection, VectorFeature};
use crate::raster::{Raster, D8_NODATA, ELEVATION_NODATA};
use geo::{Geometry, Polygon};

/// Engine backed by the algorithms in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl NativeEngine {
    /// Creates the engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl GeoEngine for NativeEngine {
    fn mosaic_elevation(&self, rasters: &[Raster<f64>]) -> EngineResult<Raster<f64>> {
        mosaic::mosaic("mosaic_elevation", rasters, ELEVATION_NODATA)
    }

    fn split_raster(
        &self,
        dem: &Raster<f64>,
        source: &str,
        regions: &[QuarterSection],
        overlap: f64,
    ) -> EngineResult<Vec<Raster<f64>>> {
        mosaic::split(dem, source, regions, overlap)
    }

    fn contour_lines(
        &self,
        tile: &Raster<f64>,
        interval: f64,
        max_elevation: f64,
        max_vertices: usize,
    ) -> EngineResult<Vec<VectorFeature>> {
        contour::contour_lines(tile, interval, max_elevation, max_vertices)
    }

    fn contour_polygons(
        &self,
        tile: &Raster<f64>,
        interval: f64,
        max_elevation: f64,
    ) -> EngineResult<Vec<VectorFeature>> {
        polygons::contour_polygons(tile, interval, max_elevation)
    }

    fn simplify_lines(&self, features: &[VectorFeature], tolerance: f64) -> EngineResult<Generalized> {
        generalize::simplify(features, tolerance)
    }

    fn smooth_lines(&self, features: &[VectorFeature], tolerance: f64) -> EngineResult<Generalized> {
        generalize::smooth(features, tolerance)
    }

    fn clip_to_region(&self, features: &[VectorFeature], region: &Polygon<f64>) -> EngineResult<Vec<VectorFeature>> {
        Ok(spatial::clip(features, region))
    }

    fn fill(&self, dem: &Raster<f64>, epsilon: f64) -> EngineResult<Raster<f64>> {
        hydrology::fill(dem, epsilon)
    }

    fn flow_direction(&self, filled: &Raster<f64>) -> EngineResult<Raster<u8>> {
        Ok(hydrology::flow_direction(filled))
    }

    fn mosaic_direction(&self, tiles: &[Raster<u8>]) -> EngineResult<Raster<u8>> {
        mosaic::mosaic("mosaic_direction", tiles, D8_NODATA)
    }

    fn stream_order(&self, direction: &Raster<u8>, method: OrderMethod) -> EngineResult<Raster<u32>> {
        Ok(hydrology::stream_order(direction, method))
    }

    fn condition(&self, order: &Raster<u32>, threshold: u32) -> EngineResult<Raster<u32>> {
        Ok(hydrology::condition(order, threshold))
    }

    fn stream_to_feature(&self, streams: &Raster<u32>, direction: &Raster<u8>) -> EngineResult<Vec<VectorFeature>> {
        hydrology::stream_to_feature(streams, direction)
    }

    fn split_by_region(
        &self,
        lines: &[VectorFeature],
        regions: &[QuarterSection],
    ) -> EngineResult<Vec<(String, Vec<VectorFeature>)>> {
        Ok(spatial::split_by_region(lines, regions))
    }

    fn containing_regions(
        &self,
        geometry: &Geometry<f64>,
        regions: &[QuarterSection],
        tolerance: f64,
    ) -> EngineResult<Vec<String>> {
        Ok(spatial::containing_regions(geometry, regions, tolerance))
    }
}
