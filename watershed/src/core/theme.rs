//! Output themes.

use crate::config::{NamingConfig, ThemeNaming};
use crate::core::GeometryKind;
use crate::workspace::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A final output theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    /// Contour lines.
    ContourLines,
    /// Contour band polygons.
    ContourPolygons,
    /// Stream network.
    Streams,
}

impl Theme {
    /// All themes in merge order.
    pub const ALL: [Self; 3] = [Self::ContourLines, Self::ContourPolygons, Self::Streams];

    /// Snake-case key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ContourLines => "contour_lines",
            Self::ContourPolygons => "contour_polygons",
            Self::Streams => "streams",
        }
    }

    /// Where the per-unit features awaiting names live.
    #[must_use]
    pub const fn naming_input(self) -> Location {
        match self {
            Self::ContourLines => Location::ContourLinesTrimmed,
            Self::ContourPolygons => Location::ContourPolygonsTrimmed,
            Self::Streams => Location::StreamsSplit,
        }
    }

    /// The final theme dataset.
    #[must_use]
    pub const fn dataset(self) -> Location {
        match self {
            Self::ContourLines => Location::FinalContourLines,
            Self::ContourPolygons => Location::FinalContourPolygons,
            Self::Streams => Location::FinalStreams,
        }
    }

    /// Name of the merged class inside the theme dataset.
    #[must_use]
    pub const fn merged_name(self) -> &'static str {
        match self {
            Self::ContourLines => "ContoursLinesMerged",
            Self::ContourPolygons => "ContoursPolygonsMerged",
            Self::Streams => "StreamsMerged",
        }
    }

    /// Geometry kind of the theme.
    #[must_use]
    pub const fn kind(self) -> GeometryKind {
        match self {
            Self::ContourPolygons => GeometryKind::Polygon,
            Self::ContourLines | Self::Streams => GeometryKind::Line,
        }
    }

    /// Prefix and length filter for this theme.
    #[must_use]
    pub fn naming(self, config: &NamingConfig) -> &ThemeNaming {
        match self {
            Self::ContourLines => &config.contour_lines,
            Self::ContourPolygons => &config.contour_polygons,
            Self::Streams => &config.streams,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
