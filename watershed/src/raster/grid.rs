//! The raster grid type.

use super::{Extent, GeoTransform};
use crate::errors::{ExternalEngineError, Result};
use geo::Polygon;
use ndarray::{s, Array2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Cell value types a raster can hold.
pub trait RasterElement:
    Copy + PartialEq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> RasterElement for T where
    T: Copy + PartialEq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// Where a tile came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    /// Name of the source raster the tile was cut from.
    pub source: String,
    /// Code of the region whose footprint defined the tile.
    pub region_code: String,
    /// The region polygon without overlap padding.
    pub core: Polygon<f64>,
}

/// A north-up grid of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster<T> {
    transform: GeoTransform,
    nodata: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lineage: Option<Lineage>,
    data: Array2<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Creates a raster filled with `value`.
    #[must_use]
    pub fn filled(rows: usize, cols: usize, transform: GeoTransform, value: T, nodata: Option<T>) -> Self {
        Self {
            transform,
            nodata,
            lineage: None,
            data: Array2::from_elem((rows, cols), value),
        }
    }

    /// Wraps an existing array.
    #[must_use]
    pub fn from_array(data: Array2<T>, transform: GeoTransform, nodata: Option<T>) -> Self {
        Self {
            transform,
            nodata,
            lineage: None,
            data,
        }
    }

    /// Builds a raster from row-major values.
    pub fn from_vec(
        rows: usize,
        cols: usize,
        values: Vec<T>,
        transform: GeoTransform,
        nodata: Option<T>,
    ) -> Result<Self> {
        let data = Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| ExternalEngineError::new("raster", e.to_string()))?;
        Ok(Self::from_array(data, transform, nodata))
    }

    /// Attaches tile lineage.
    #[must_use]
    pub fn with_lineage(mut self, lineage: Lineage) -> Self {
        self.lineage = Some(lineage);
        self
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Georeferencing.
    #[must_use]
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Cell edge length.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size
    }

    /// Nodata sentinel, if any.
    #[must_use]
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Tile lineage, if this raster is a tile.
    #[must_use]
    pub fn lineage(&self) -> Option<&Lineage> {
        self.lineage.as_ref()
    }

    /// Map extent.
    #[must_use]
    pub fn extent(&self) -> Extent {
        self.transform.extent(self.rows(), self.cols())
    }

    /// Cell values.
    #[must_use]
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Mutable cell values.
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Returns true if `value` is the nodata sentinel.
    #[must_use]
    pub fn is_nodata(&self, value: T) -> bool {
        self.nodata == Some(value)
    }

    /// Value of a cell, `None` when out of range or nodata.
    #[must_use]
    pub fn value(&self, row: usize, col: usize) -> Option<T> {
        let v = *self.data.get((row, col))?;
        (!self.is_nodata(v)).then_some(v)
    }

    /// Sets a cell value. Out-of-range writes are ignored.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        if let Some(cell) = self.data.get_mut((row, col)) {
            *cell = value;
        }
    }

    /// A new raster on the same grid with the same lineage.
    #[must_use]
    pub fn like<U: RasterElement>(&self, fill: U, nodata: Option<U>) -> Raster<U> {
        Raster {
            transform: self.transform,
            nodata,
            lineage: self.lineage.clone(),
            data: Array2::from_elem(self.data.dim(), fill),
        }
    }

    /// Copies a window of cells. The window is clamped to the grid.
    #[must_use]
    pub fn window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Self {
        let r0 = row.min(self.rows());
        let c0 = col.min(self.cols());
        let r1 = (row + rows).min(self.rows());
        let c1 = (col + cols).min(self.cols());
        Self {
            transform: self.transform.offset(r0, c0),
            nodata: self.nodata,
            lineage: None,
            data: self.data.slice(s![r0..r1, c0..c1]).to_owned(),
        }
    }

    /// Iterates `(row, col, value)` over valid cells.
    pub fn valid_cells(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.data
            .indexed_iter()
            .filter(move |(_, v)| !self.is_nodata(**v))
            .map(|((r, c), v)| (r, c, *v))
    }
}

impl Raster<f64> {
    /// Minimum and maximum of valid, finite cells.
    #[must_use]
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.valid_cells()
            .map(|(_, _, v)| v)
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Raster<f64> {
        Raster::from_vec(
            2,
            3,
            vec![1.0, 2.0, -9999.0, 4.0, 5.0, 6.0],
            GeoTransform::new(0.0, 2.0, 1.0),
            Some(-9999.0),
        )
        .unwrap()
    }

    #[test]
    fn test_value_skips_nodata() {
        let r = sample();
        assert_eq!(r.value(0, 1), Some(2.0));
        assert_eq!(r.value(0, 2), None);
        assert_eq!(r.value(5, 5), None);
    }

    #[test]
    fn test_min_max_ignores_nodata() {
        assert_eq!(sample().min_max(), Some((1.0, 6.0)));
    }

    #[test]
    fn test_window_shifts_origin() {
        let w = sample().window(1, 1, 5, 5);
        assert_eq!((w.rows(), w.cols()), (1, 2));
        assert_eq!(w.transform().origin_x, 1.0);
        assert_eq!(w.transform().origin_y, 1.0);
        assert_eq!(w.value(0, 0), Some(5.0));
    }

    #[test]
    fn test_from_vec_rejects_bad_shape() {
        let err = Raster::from_vec(2, 2, vec![1.0_f64], GeoTransform::new(0.0, 0.0, 1.0), None);
        assert!(err.is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_lineage() {
        let core = Extent::new(0.0, 0.0, 3.0, 2.0).to_polygon();
        let r = sample().with_lineage(Lineage {
            source: "dtm".to_string(),
            region_code: "Q1".to_string(),
            core,
        });
        let json = serde_json::to_string(&r).unwrap();
        let back: Raster<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
