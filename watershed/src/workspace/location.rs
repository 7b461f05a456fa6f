//! Named places inside a workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A directory inside the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Source elevation rasters.
    Dem,
    /// Elevation tiles.
    Tiles,
    /// Raw contour lines per tile.
    ContourLines,
    /// Simplified contour lines per tile.
    ContourLinesSimplified,
    /// Smoothed contour lines per tile.
    ContourLinesSmoothed,
    /// Smoothed contour lines clipped to their tile's region.
    ContourLinesTrimmed,
    /// Contour polygons per tile.
    ContourPolygons,
    /// Contour polygons clipped to their tile's region.
    ContourPolygonsTrimmed,
    /// Filled elevation per tile.
    Fill,
    /// Flow direction per tile.
    Direction,
    /// The merged direction raster.
    Mosaic,
    /// Stream order.
    Order,
    /// Stream order above the threshold.
    Condition,
    /// Vectorized stream network.
    StreamsIntermediate,
    /// Stream network split per region.
    StreamsSplit,
    /// Features that could not be named.
    Unassigned,
    /// Final named contour lines.
    FinalContourLines,
    /// Final named contour polygons.
    FinalContourPolygons,
    /// Final named streams.
    FinalStreams,
    /// Persisted checkpoints.
    Checkpoints,
}

impl Location {
    /// Directory relative to the workspace root.
    #[must_use]
    pub fn relative_path(self) -> PathBuf {
        let path = match self {
            Self::Dem => "DTM",
            Self::Tiles => "DTM_Split",
            Self::ContourLines => "WatershedIntermediate/ContoursLines",
            Self::ContourLinesSimplified => "WatershedIntermediate/ContoursLinesSimplified",
            Self::ContourLinesSmoothed => "WatershedIntermediate/ContoursLinesSmoothed",
            Self::ContourLinesTrimmed => "WatershedIntermediate/ContoursLinesTrimmed",
            Self::ContourPolygons => "WatershedIntermediate/ContoursPolygons",
            Self::ContourPolygonsTrimmed => "WatershedIntermediate/ContoursPolygonsTrimmed",
            Self::Fill => "Streams/Fill",
            Self::Direction => "Streams/Direction",
            Self::Mosaic => "Streams/Mosaic",
            Self::Order => "Streams/Order",
            Self::Condition => "Streams/Condition",
            Self::StreamsIntermediate => "Streams/Features",
            Self::StreamsSplit => "Streams/Split",
            Self::Unassigned => "Unassigned",
            Self::FinalContourLines => "Watershed/ContoursLines",
            Self::FinalContourPolygons => "Watershed/ContoursPolygons",
            Self::FinalStreams => "Watershed/Streams",
            Self::Checkpoints => "checkpoints",
        };
        PathBuf::from(path)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative_path().display())
    }
}
