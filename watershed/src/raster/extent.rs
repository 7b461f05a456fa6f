//! Extents and grid georeferencing.

use geo::{coord, Coord, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// Western edge.
    pub min_x: f64,
    /// Southern edge.
    pub min_y: f64,
    /// Eastern edge.
    pub max_x: f64,
    /// Northern edge.
    pub max_y: f64,
}

impl Extent {
    /// Creates a new extent.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width in map units.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height in map units.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns true if the extent has no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Grows the extent by `distance` on every side.
    #[must_use]
    pub fn expand(&self, distance: f64) -> Self {
        Self::new(
            self.min_x - distance,
            self.min_y - distance,
            self.max_x + distance,
            self.max_y + distance,
        )
    }

    /// Intersection of two extents, if they overlap with positive area.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let out = Self::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        (!out.is_empty()).then_some(out)
    }

    /// Returns true if the point lies inside or on the edge.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// The extent as a closed polygon.
    #[must_use]
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.min_x, self.min_y),
                (self.max_x, self.min_y),
                (self.max_x, self.max_y),
                (self.min_x, self.max_y),
                (self.min_x, self.min_y),
            ]),
            vec![],
        )
    }
}

impl From<Rect<f64>> for Extent {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// North-up georeferencing with square cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the top-left corner.
    pub origin_x: f64,
    /// Y coordinate of the top-left corner.
    pub origin_y: f64,
    /// Cell edge length in map units.
    pub cell_size: f64,
}

impl GeoTransform {
    /// Creates a new transform.
    #[must_use]
    pub const fn new(origin_x: f64, origin_y: f64, cell_size: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            cell_size,
        }
    }

    /// Map coordinate of a cell centre.
    #[must_use]
    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        coord! {
            x: self.origin_x + (col as f64 + 0.5) * self.cell_size,
            y: self.origin_y - (row as f64 + 0.5) * self.cell_size,
        }
    }

    /// Fractional column of an x coordinate.
    #[must_use]
    pub fn col_of(&self, x: f64) -> f64 {
        (x - self.origin_x) / self.cell_size
    }

    /// Fractional row of a y coordinate.
    #[must_use]
    pub fn row_of(&self, y: f64) -> f64 {
        (self.origin_y - y) / self.cell_size
    }

    /// Extent of a `rows × cols` grid.
    #[must_use]
    pub fn extent(&self, rows: usize, cols: usize) -> Extent {
        Extent::new(
            self.origin_x,
            self.origin_y - rows as f64 * self.cell_size,
            self.origin_x + cols as f64 * self.cell_size,
            self.origin_y,
        )
    }

    /// Transform of a window starting at `(row, col)`.
    #[must_use]
    pub fn offset(&self, row: usize, col: usize) -> Self {
        Self::new(
            self.origin_x + col as f64 * self.cell_size,
            self.origin_y - row as f64 * self.cell_size,
            self.cell_size,
        )
    }

    /// Integer `(row, col)` offset of `other`'s origin on this grid, if the
    /// two grids are aligned within `tolerance` cells.
    #[must_use]
    pub fn aligned_offset(&self, other: &Self, tolerance: f64) -> Option<(isize, isize)> {
        if (self.cell_size - other.cell_size).abs() > tolerance * self.cell_size {
            return None;
        }
        let col = self.col_of(other.origin_x);
        let row = self.row_of(other.origin_y);
        let (rc, cc) = (row.round(), col.round());
        if (row - rc).abs() > tolerance || (col - cc).abs() > tolerance {
            return None;
        }
        Some((rc as isize, cc as isize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_intersection() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(5.0, 5.0, 15.0, 15.0);
        assert_eq!(a.intersection(&b), Some(Extent::new(5.0, 5.0, 10.0, 10.0)));

        let c = Extent::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_cell_center_and_extent() {
        let t = GeoTransform::new(100.0, 50.0, 2.0);
        let center = t.cell_center(0, 0);
        assert_eq!((center.x, center.y), (101.0, 49.0));
        assert_eq!(t.extent(5, 10), Extent::new(100.0, 40.0, 120.0, 50.0));
    }

    #[test]
    fn test_aligned_offset() {
        let base = GeoTransform::new(0.0, 100.0, 1.0);
        let window = base.offset(3, 7);
        assert_eq!(base.aligned_offset(&window, 1e-6), Some((3, 7)));

        let shifted = GeoTransform::new(0.5, 100.0, 1.0);
        assert_eq!(base.aligned_offset(&shifted, 1e-6), None);
    }
}
