//! Raster grids and their georeferencing.
//!
//! Grids are north-up with square cells. The origin is the top-left corner
//! of the top-left cell, so cell `(row, col)` spans
//! `[origin_x + col·size, origin_x + (col+1)·size]` horizontally and
//! `[origin_y - (row+1)·size, origin_y - row·size]` vertically.

mod extent;
mod grid;

pub use extent::{Extent, GeoTransform};
pub use grid::{Lineage, Raster, RasterElement};

/// D8 neighbour offsets `(row, col)` indexed by direction code - 1.
///
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
pub const D8_OFFSETS: [(isize, isize); 8] = [
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Direction code for a cell that drains nowhere.
pub const D8_SINK: u8 = 0;

/// Nodata sentinel for direction rasters.
pub const D8_NODATA: u8 = 255;

/// Nodata sentinel for elevation rasters.
pub const ELEVATION_NODATA: f64 = -9999.0;

/// Returns the `(row, col)` a D8 code points at, if it stays on the grid.
#[must_use]
pub fn d8_target(row: usize, col: usize, code: u8, rows: usize, cols: usize) -> Option<(usize, usize)> {
    if !(1..=8).contains(&code) {
        return None;
    }
    let (dr, dc) = D8_OFFSETS[(code - 1) as usize];
    let r = row as isize + dr;
    let c = col as isize + dc;
    if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
        return None;
    }
    Some((r as usize, c as usize))
}
