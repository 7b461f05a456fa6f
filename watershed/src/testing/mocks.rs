//! Engines that fail on demand.

use crate::core::{QuarterSection, VectorFeature};
use crate::engine::{EngineResult, GeoEngine, Generalized, NativeEngine, OrderMethod};
use crate::errors::ExternalEngineError;
use crate::raster::Raster;
use geo::{Geometry, Polygon};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Diagnostic returned by an injected failure.
pub const INJECTED_DIAGNOSTIC: &str = "ERROR 999998: injected failure";

/// Delegates to an inner engine, failing every call after the first `limit`.
#[derive(Debug)]
pub struct FailAfterEngine<E = NativeEngine> {
    inner: E,
    limit: usize,
    calls: AtomicUsize,
    armed: AtomicBool,
}

impl<E: GeoEngine> FailAfterEngine<E> {
    /// Wraps `inner`.
    pub fn new(inner: E, limit: usize) -> Self {
        Self {
            inner,
            limit,
            calls: AtomicUsize::new(0),
            armed: AtomicBool::new(true),
        }
    }

    /// Stops injecting failures.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self, operation: &str) -> EngineResult<()> {
        let seen = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.armed.load(Ordering::SeqCst) && seen >= self.limit {
            return Err(ExternalEngineError::new(operation, INJECTED_DIAGNOSTIC));
        }
        Ok(())
    }
}

impl<E: GeoEngine> GeoEngine for FailAfterEngine<E> {
    fn mosaic_elevation(&self, rasters: &[Raster<f64>]) -> EngineResult<Raster<f64>> {
        self.tick("mosaic_elevation")?;
        self.inner.mosaic_elevation(rasters)
    }

    fn split_raster(
        &self,
        dem: &Raster<f64>,
        source: &str,
        regions: &[QuarterSection],
        overlap: f64,
    ) -> EngineResult<Vec<Raster<f64>>> {
        self.tick("split_raster")?;
        self.inner.split_raster(dem, source, regions, overlap)
    }

    fn contour_lines(
        &self,
        tile: &Raster<f64>,
        interval: f64,
        max_elevation: f64,
        max_vertices: usize,
    ) -> EngineResult<Vec<VectorFeature>> {
        self.tick("contour_lines")?;
        self.inner.contour_lines(tile, interval, max_elevation, max_vertices)
    }

    fn contour_polygons(
        &self,
        tile: &Raster<f64>,
        interval: f64,
        max_elevation: f64,
    ) -> EngineResult<Vec<VectorFeature>> {
        self.tick("contour_polygons")?;
        self.inner.contour_polygons(tile, interval, max_elevation)
    }

    fn simplify_lines(&self, features: &[VectorFeature], tolerance: f64) -> EngineResult<Generalized> {
        self.tick("simplify_lines")?;
        self.inner.simplify_lines(features, tolerance)
    }

    fn smooth_lines(&self, features: &[VectorFeature], tolerance: f64) -> EngineResult<Generalized> {
        self.tick("smooth_lines")?;
        self.inner.smooth_lines(features, tolerance)
    }

    fn clip_to_region(&self, features: &[VectorFeature], region: &Polygon<f64>) -> EngineResult<Vec<VectorFeature>> {
        self.tick("clip_to_region")?;
        self.inner.clip_to_region(features, region)
    }

    fn fill(&self, dem: &Raster<f64>, epsilon: f64) -> EngineResult<Raster<f64>> {
        self.tick("fill")?;
        self.inner.fill(dem, epsilon)
    }

    fn flow_direction(&self, filled: &Raster<f64>) -> EngineResult<Raster<u8>> {
        self.tick("flow_direction")?;
        self.inner.flow_direction(filled)
    }

    fn mosaic_direction(&self, tiles: &[Raster<u8>]) -> EngineResult<Raster<u8>> {
        self.tick("mosaic_direction")?;
        self.inner.mosaic_direction(tiles)
    }

    fn stream_order(&self, direction: &Raster<u8>, method: OrderMethod) -> EngineResult<Raster<u32>> {
        self.tick("stream_order")?;
        self.inner.stream_order(direction, method)
    }

    fn condition(&self, order: &Raster<u32>, threshold: u32) -> EngineResult<Raster<u32>> {
        self.tick("condition")?;
        self.inner.condition(order, threshold)
    }

    fn stream_to_feature(&self, streams: &Raster<u32>, direction: &Raster<u8>) -> EngineResult<Vec<VectorFeature>> {
        self.tick("stream_to_feature")?;
        self.inner.stream_to_feature(streams, direction)
    }

    fn split_by_region(
        &self,
        lines: &[VectorFeature],
        regions: &[QuarterSection],
    ) -> EngineResult<Vec<(String, Vec<VectorFeature>)>> {
        self.tick("split_by_region")?;
        self.inner.split_by_region(lines, regions)
    }

    fn containing_regions(
        &self,
        geometry: &Geometry<f64>,
        regions: &[QuarterSection],
        tolerance: f64,
    ) -> EngineResult<Vec<String>> {
        self.tick("containing_regions")?;
        self.inner.containing_regions(geometry, regions, tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::valley_dem;

    #[test]
    fn test_fails_after_limit_until_disarmed() {
        let engine = FailAfterEngine::new(NativeEngine::new(), 1);
        let dem = valley_dem();
        assert!(engine.fill(&dem, 0.0).is_ok());
        let err = engine.fill(&dem, 0.0).unwrap_err();
        assert_eq!(err.operation, "fill");
        assert_eq!(err.diagnostic, INJECTED_DIAGNOSTIC);
        engine.disarm();
        assert!(engine.fill(&dem, 0.0).is_ok());
        assert_eq!(engine.calls(), 3);
    }
}
