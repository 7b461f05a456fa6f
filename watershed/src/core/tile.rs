//! Tile identity and descriptors.

use crate::raster::{Extent, Lineage, Raster};
use crate::utils::natural_cmp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A tile or feature-class name, ordered numerically where it holds digits.
///
/// `dtm_split_2` sorts before `dtm_split_10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(String);

impl TileId {
    /// Creates a tile id.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The underlying name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for TileId {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

impl PartialOrd for TileId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TileId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Read-only description of a stored elevation tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterTile {
    /// Tile identifier.
    pub id: TileId,
    /// Map extent, overlap included.
    pub extent: Extent,
    /// Cell size.
    pub resolution: f64,
    /// Where the tile was cut from.
    pub lineage: Option<Lineage>,
}

impl RasterTile {
    /// Describes a tile raster.
    #[must_use]
    pub fn describe(id: impl Into<TileId>, raster: &Raster<f64>) -> Self {
        Self {
            id: id.into(),
            extent: raster.extent(),
            resolution: raster.cell_size(),
            lineage: raster.lineage().cloned(),
        }
    }
}
