//! The geospatial engine seam.
//!
//! Stages never touch grid or geometry algorithms directly; they call a
//! [`GeoEngine`]. Engine calls are blocking and are run on the blocking
//! thread pool by the pipeline. Failures come back as
//! [`ExternalEngineError`] carrying the engine's own diagnostic text.

mod native;

pub use native::NativeEngine;

use crate::core::{QuarterSection, VectorFeature};
use crate::errors::ExternalEngineError;
use crate::raster::Raster;
use geo::{Geometry, Polygon};
use serde::{Deserialize, Serialize};

/// Result of an engine call.
pub type EngineResult<T> = std::result::Result<T, ExternalEngineError>;

/// Output of a generalization call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generalized {
    /// Features that survived.
    pub features: Vec<VectorFeature>,
    /// Features dropped because generalization collapsed them.
    pub discarded: usize,
}

/// Confluence rule used to order streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMethod {
    /// Order rises by one where two or more maximal-order streams meet.
    #[default]
    Strahler,
    /// Order is the number of upstream headwaters.
    Shreve,
}

/// Raster and vector primitives the pipeline is built on.
#[cfg_attr(test, mockall::automock)]
pub trait GeoEngine: Send + Sync {
    /// Merges aligned elevation rasters into one.
    fn mosaic_elevation(&self, rasters: &[Raster<f64>]) -> EngineResult<Raster<f64>>;

    /// Cuts one tile per region that intersects the raster. Each tile covers
    /// the region's bounding box padded by `overlap` and carries lineage
    /// naming `source` and the region.
    fn split_raster(
        &self,
        dem: &Raster<f64>,
        source: &str,
        regions: &[QuarterSection],
        overlap: f64,
    ) -> EngineResult<Vec<Raster<f64>>>;

    /// Traces contour lines at positive multiples of `interval` up to
    /// `max_elevation`. No feature has more than `max_vertices` vertices.
    fn contour_lines(
        &self,
        tile: &Raster<f64>,
        interval: f64,
        max_elevation: f64,
        max_vertices: usize,
    ) -> EngineResult<Vec<VectorFeature>>;

    /// Builds closed elevation bands of width `interval` up to
    /// `max_elevation`.
    fn contour_polygons(
        &self,
        tile: &Raster<f64>,
        interval: f64,
        max_elevation: f64,
    ) -> EngineResult<Vec<VectorFeature>>;

    /// Point-removal simplification.
    fn simplify_lines(&self, features: &[VectorFeature], tolerance: f64) -> EngineResult<Generalized>;

    /// Curvature smoothing.
    fn smooth_lines(&self, features: &[VectorFeature], tolerance: f64) -> EngineResult<Generalized>;

    /// Clips features to a polygon. Features may split into several.
    fn clip_to_region(&self, features: &[VectorFeature], region: &Polygon<f64>) -> EngineResult<Vec<VectorFeature>>;

    /// Removes depressions.
    fn fill(&self, dem: &Raster<f64>, epsilon: f64) -> EngineResult<Raster<f64>>;

    /// D8 flow direction.
    fn flow_direction(&self, filled: &Raster<f64>) -> EngineResult<Raster<u8>>;

    /// Merges aligned direction rasters into one.
    fn mosaic_direction(&self, tiles: &[Raster<u8>]) -> EngineResult<Raster<u8>>;

    /// Orders every cell of a direction raster.
    fn stream_order(&self, direction: &Raster<u8>, method: OrderMethod) -> EngineResult<Raster<u32>>;

    /// Keeps cells whose order exceeds `threshold`.
    fn condition(&self, order: &Raster<u32>, threshold: u32) -> EngineResult<Raster<u32>>;

    /// Vectorizes stream cells into reaches.
    fn stream_to_feature(&self, streams: &Raster<u32>, direction: &Raster<u8>) -> EngineResult<Vec<VectorFeature>>;

    /// Splits lines by region. Regions receiving nothing are omitted.
    fn split_by_region(
        &self,
        lines: &[VectorFeature],
        regions: &[QuarterSection],
    ) -> EngineResult<Vec<(String, Vec<VectorFeature>)>>;

    /// Codes of every region that completely contains `geometry`.
    fn containing_regions(
        &self,
        geometry: &Geometry<f64>,
        regions: &[QuarterSection],
        tolerance: f64,
    ) -> EngineResult<Vec<String>>;
}
