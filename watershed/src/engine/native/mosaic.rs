//! Mosaicking and tiling.

use crate::core::QuarterSection;
use crate::engine::EngineResult;
use crate::errors::ExternalEngineError;
use crate::raster::{GeoTransform, Lineage, Raster, RasterElement};
use ndarray::Array2;

/// Fraction of a cell within which grids count as aligned.
const ALIGN_TOLERANCE: f64 = 1e-6;

/// Slack used when snapping map coordinates to cell boundaries.
const SNAP: f64 = 1e-9;

/// Merges aligned rasters into one covering their union.
///
/// Where inputs overlap, the cell comes from the input in which it lies
/// farthest from the edge; ties go to the later input. Tile edges are where
/// per-tile algorithms see the least context, so this keeps the best-informed
/// value across seams.
pub(super) fn mosaic<T: RasterElement>(operation: &str, inputs: &[Raster<T>], fill: T) -> EngineResult<Raster<T>> {
    let first = inputs
        .first()
        .ok_or_else(|| ExternalEngineError::new(operation, "no input rasters"))?;
    let base = *first.transform();

    let mut placements = Vec::with_capacity(inputs.len());
    let (mut min_r, mut min_c) = (0_isize, 0_isize);
    let (mut max_r, mut max_c) = (first.rows() as isize, first.cols() as isize);
    for (i, input) in inputs.iter().enumerate() {
        let (r, c) = base
            .aligned_offset(input.transform(), ALIGN_TOLERANCE)
            .ok_or_else(|| {
                ExternalEngineError::new(operation, format!("input {i} is not aligned with input 0"))
            })?;
        min_r = min_r.min(r);
        min_c = min_c.min(c);
        max_r = max_r.max(r + input.rows() as isize);
        max_c = max_c.max(c + input.cols() as isize);
        placements.push((r, c));
    }

    let rows = (max_r - min_r) as usize;
    let cols = (max_c - min_c) as usize;
    let transform = GeoTransform::new(
        base.origin_x + min_c as f64 * base.cell_size,
        base.origin_y - min_r as f64 * base.cell_size,
        base.cell_size,
    );
    let mut out = Raster::filled(rows, cols, transform, fill, Some(fill));
    let mut best = Array2::<i64>::from_elem((rows, cols), -1);

    for (input, (r0, c0)) in inputs.iter().zip(&placements) {
        let (tr, tc) = (input.rows(), input.cols());
        let row_base = (r0 - min_r) as usize;
        let col_base = (c0 - min_c) as usize;
        for (r, c, v) in input.valid_cells() {
            let depth = r.min(c).min(tr - 1 - r).min(tc - 1 - c) as i64;
            let (orow, ocol) = (row_base + r, col_base + c);
            if depth >= best[[orow, ocol]] {
                best[[orow, ocol]] = depth;
                out.set(orow, ocol, v);
            }
        }
    }
    Ok(out)
}

/// Cuts one tile per region from `dem`.
pub(super) fn split(
    dem: &Raster<f64>,
    source: &str,
    regions: &[QuarterSection],
    overlap: f64,
) -> EngineResult<Vec<Raster<f64>>> {
    if regions.is_empty() {
        return Err(ExternalEngineError::new("split_raster", "no regions to split by"));
    }
    let t = dem.transform();
    let (rows, cols) = (dem.rows() as f64, dem.cols() as f64);
    let mut tiles = Vec::new();
    for region in regions {
        let extent = region.extent().ok_or_else(|| {
            ExternalEngineError::new("split_raster", format!("region '{}' has no extent", region.code))
        })?;
        let padded = extent.expand(overlap);
        let c0 = (t.col_of(padded.min_x) + SNAP).floor().clamp(0.0, cols) as usize;
        let c1 = (t.col_of(padded.max_x) - SNAP).ceil().clamp(0.0, cols) as usize;
        let r0 = (t.row_of(padded.max_y) + SNAP).floor().clamp(0.0, rows) as usize;
        let r1 = (t.row_of(padded.min_y) - SNAP).ceil().clamp(0.0, rows) as usize;
        if c1 <= c0 || r1 <= r0 {
            continue;
        }
        tiles.push(dem.window(r0, c0, r1 - r0, c1 - c0).with_lineage(Lineage {
            source: source.to_string(),
            region_code: region.code.clone(),
            core: region.polygon.clone(),
        }));
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Extent, D8_NODATA};

    fn grid(rows: usize, cols: usize, origin_x: f64, value: u8) -> Raster<u8> {
        Raster::filled(rows, cols, GeoTransform::new(origin_x, rows as f64, 1.0), value, Some(D8_NODATA))
    }

    #[test]
    fn test_mosaic_prefers_interior_cells() {
        // a covers cols 0..4, b covers cols 2..6 on the same 3-row grid.
        let a = grid(3, 4, 0.0, 1);
        let b = grid(3, 4, 2.0, 2);
        let m = mosaic("mosaic_direction", &[a, b], D8_NODATA).unwrap();

        assert_eq!((m.rows(), m.cols()), (3, 6));
        // col 2: depth 1 in a, 0 in b.
        assert_eq!(m.value(1, 2), Some(1));
        // col 3: depth 0 in a, 1 in b.
        assert_eq!(m.value(1, 3), Some(2));
        assert_eq!(m.value(1, 0), Some(1));
        assert_eq!(m.value(1, 5), Some(2));
    }

    #[test]
    fn test_mosaic_rejects_misaligned_inputs() {
        let a = grid(2, 2, 0.0, 1);
        let b = grid(2, 2, 0.5, 1);
        let err = mosaic("mosaic_direction", &[a, b], D8_NODATA).unwrap_err();
        assert!(err.diagnostic.contains("not aligned"));
    }

    #[test]
    fn test_mosaic_fills_gaps_with_nodata() {
        let a = grid(2, 2, 0.0, 1);
        let b = grid(2, 2, 3.0, 1);
        let m = mosaic("mosaic_direction", &[a, b], D8_NODATA).unwrap();
        assert_eq!(m.cols(), 5);
        assert_eq!(m.value(0, 2), None);
    }

    #[test]
    fn test_split_pads_and_clamps() {
        let dem = Raster::filled(10, 20, GeoTransform::new(0.0, 10.0, 1.0), 5.0, None);
        let regions = vec![
            QuarterSection::new("Q1", Extent::new(0.0, 0.0, 10.0, 10.0).to_polygon()),
            QuarterSection::new("Q2", Extent::new(10.0, 0.0, 20.0, 10.0).to_polygon()),
            QuarterSection::new("far", Extent::new(100.0, 0.0, 110.0, 10.0).to_polygon()),
        ];
        let tiles = split(&dem, "dtm", &regions, 1.0).unwrap();

        assert_eq!(tiles.len(), 2);
        assert_eq!((tiles[0].rows(), tiles[0].cols()), (10, 11));
        assert_eq!(tiles[1].transform().origin_x, 9.0);
        assert_eq!(tiles[1].cols(), 11);
        let lineage = tiles[1].lineage().unwrap();
        assert_eq!(lineage.region_code, "Q2");
        assert_eq!(lineage.source, "dtm");
    }
}
