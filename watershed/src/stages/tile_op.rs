//! Per-tile operations.
//!
//! Every operation that runs once per tile is a [`TileOp`] variant. Each
//! variant reads one workspace location and writes one other; that pairing
//! is the allow-list checked before any engine call.

use crate::context::PipelineContext;
use crate::core::{Artifact, FeatureClass, GeometryKind, VectorFeature};
use crate::errors::{ConfigurationError, ExternalEngineError, Result, WatershedError};
use crate::pipeline::WorkUnit;
use crate::raster::{Lineage, Raster};
use crate::workspace::{Location, Workspace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// An operation applied to every tile of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileOp {
    /// Raw contour lines from an elevation tile.
    ContourLines,
    /// Drops short lines, then removes points.
    SimplifyLines,
    /// Smooths simplified lines.
    SmoothLines,
    /// Clips smoothed lines to the tile's region.
    TrimLines,
    /// Contour band polygons from an elevation tile.
    ContourPolygons,
    /// Clips band polygons to the tile's region.
    TrimPolygons,
    /// Fills depressions in an elevation tile.
    Fill,
    /// D8 flow direction of a filled tile.
    Direction,
}

impl TileOp {
    /// Every operation.
    pub const ALL: [Self; 8] = [
        Self::ContourLines,
        Self::SimplifyLines,
        Self::SmoothLines,
        Self::TrimLines,
        Self::ContourPolygons,
        Self::TrimPolygons,
        Self::Fill,
        Self::Direction,
    ];

    /// Stable key, used for checkpoints.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ContourLines => "contour_lines",
            Self::SimplifyLines => "simplify_lines",
            Self::SmoothLines => "smooth_lines",
            Self::TrimLines => "trim_lines",
            Self::ContourPolygons => "contour_polygons",
            Self::TrimPolygons => "trim_polygons",
            Self::Fill => "fill",
            Self::Direction => "direction",
        }
    }

    /// Human-readable label used in log lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ContourLines => "Contour Lines",
            Self::SimplifyLines => "Simplify Lines",
            Self::SmoothLines => "Smooth Lines",
            Self::TrimLines => "Trim Lines",
            Self::ContourPolygons => "Contour Polygons",
            Self::TrimPolygons => "Trim Polygons",
            Self::Fill => "Fill",
            Self::Direction => "Flow Direction",
        }
    }

    /// The (input, output) locations this operation is allowed to use.
    #[must_use]
    pub const fn io(self) -> (Location, Location) {
        match self {
            Self::ContourLines => (Location::Tiles, Location::ContourLines),
            Self::SimplifyLines => (Location::ContourLines, Location::ContourLinesSimplified),
            Self::SmoothLines => (Location::ContourLinesSimplified, Location::ContourLinesSmoothed),
            Self::TrimLines => (Location::ContourLinesSmoothed, Location::ContourLinesTrimmed),
            Self::ContourPolygons => (Location::Tiles, Location::ContourPolygons),
            Self::TrimPolygons => (Location::ContourPolygons, Location::ContourPolygonsTrimmed),
            Self::Fill => (Location::Tiles, Location::Fill),
            Self::Direction => (Location::Fill, Location::Direction),
        }
    }

    /// Returns true if the input units are rasters rather than feature
    /// classes.
    #[must_use]
    pub const fn reads_rasters(self) -> bool {
        matches!(self, Self::ContourLines | Self::ContourPolygons | Self::Fill | Self::Direction)
    }

    const fn output_prefix(self) -> &'static str {
        match self {
            Self::ContourLines => "contours_lines",
            Self::SimplifyLines => "contours_lines_simplified",
            Self::SmoothLines => "contours_lines_smoothed",
            Self::TrimLines => "contours_lines_trimmed",
            Self::ContourPolygons => "contours_polygons",
            Self::TrimPolygons => "contours_polygons_trimmed",
            Self::Fill => "fill",
            Self::Direction => "direction",
        }
    }

    /// Name of the output written for the unit at `index`.
    #[must_use]
    pub fn output_name(self, index: usize) -> String {
        format!("{}_{index:03}", self.output_prefix())
    }

    /// Checks a requested input/output pairing against the allow-list.
    pub fn validate(self, input: Location, output: Location) -> Result<()> {
        if self.io() == (input, output) {
            Ok(())
        } else {
            let (expected_in, expected_out) = self.io();
            Err(ConfigurationError::new(format!(
                "'{}' cannot read {input} and write {output}; it reads {expected_in} and writes {expected_out}",
                self.key()
            ))
            .with_field(self.key())
            .into())
        }
    }

    /// Resolves a stage key and a folder pairing to an operation.
    pub fn resolve(key: &str, input: Location, output: Location) -> Result<Self> {
        let op: Self = key.parse()?;
        op.validate(input, output)?;
        Ok(op)
    }

    /// Processes one unit. Blocking; engine failures are tagged with the
    /// unit's name.
    pub fn run(self, ctx: &PipelineContext, unit: &WorkUnit) -> Result<Artifact> {
        let (input, output) = self.io();
        let ws = ctx.workspace();
        let engine = ctx.engine();
        let config = ctx.config();
        let name = self.output_name(unit.index);
        let local = |e: ExternalEngineError| WatershedError::from(e.for_unit(&unit.name));

        match self {
            Self::ContourLines => {
                let tile: Raster<f64> = ws.read_raster(input, &unit.name)?;
                let c = &config.contour;
                let lines = engine
                    .contour_lines(&tile, c.interval, c.max_elevation, c.max_vertices)
                    .map_err(local)?;
                store(ws, output, &name, GeometryKind::Line, tile.lineage().cloned(), lines)
            }
            Self::ContourPolygons => {
                let tile: Raster<f64> = ws.read_raster(input, &unit.name)?;
                let c = &config.contour;
                let bands = engine
                    .contour_polygons(&tile, c.polygon_interval, c.max_elevation)
                    .map_err(local)?;
                store(ws, output, &name, GeometryKind::Polygon, tile.lineage().cloned(), bands)
            }
            Self::SimplifyLines => {
                let class = ws.read_class(input, &unit.name)?;
                let before = class.len();
                let min_length = config.contour.min_length;
                let long: Vec<VectorFeature> = class
                    .features
                    .into_iter()
                    .filter(|f| f.length() > min_length)
                    .collect();
                debug!(unit = %unit.name, dropped = before - long.len(), min_length, "Filtered short lines");
                let generalized = engine
                    .simplify_lines(&long, config.contour.simplify_tolerance)
                    .map_err(local)?;
                Ok(store(ws, output, &name, GeometryKind::Line, class.lineage, generalized.features)?
                    .with_discarded(generalized.discarded))
            }
            Self::SmoothLines => {
                let class = ws.read_class(input, &unit.name)?;
                let generalized = engine
                    .smooth_lines(&class.features, config.contour.smooth_tolerance)
                    .map_err(local)?;
                Ok(store(ws, output, &name, GeometryKind::Line, class.lineage, generalized.features)?
                    .with_discarded(generalized.discarded))
            }
            Self::TrimLines | Self::TrimPolygons => {
                let class = ws.read_class(input, &unit.name)?;
                let core = class.lineage.as_ref().map(|l| l.core.clone()).ok_or_else(|| {
                    ConfigurationError::new(format!("'{}' carries no tile lineage to trim against", unit.name))
                        .with_field(self.key())
                })?;
                let trimmed = engine.clip_to_region(&class.features, &core).map_err(local)?;
                store(ws, output, &name, class.kind, class.lineage, trimmed)
            }
            Self::Fill => {
                let tile: Raster<f64> = ws.read_raster(input, &unit.name)?;
                let filled = engine.fill(&tile, config.hydrology.fill_epsilon).map_err(local)?;
                ws.write_raster(output, &name, &filled)?;
                Ok(Artifact::raster(output, name))
            }
            Self::Direction => {
                let filled: Raster<f64> = ws.read_raster(input, &unit.name)?;
                let direction = engine.flow_direction(&filled).map_err(local)?;
                ws.write_raster(output, &name, &direction)?;
                Ok(Artifact::raster(output, name))
            }
        }
    }
}

fn store(
    ws: &Workspace,
    location: Location,
    name: &str,
    kind: GeometryKind,
    lineage: Option<Lineage>,
    features: Vec<VectorFeature>,
) -> Result<Artifact> {
    let class = FeatureClass::new(name, kind)
        .with_lineage(lineage)
        .with_features(features);
    ws.write_class(location, &class)?;
    Ok(Artifact::features(location, name, class.len()))
}

impl fmt::Display for TileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TileOp {
    type Err = WatershedError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.key() == s)
            .ok_or_else(|| ConfigurationError::new(format!("unknown stage key '{s}'")).with_field("stage").into())
    }
}
