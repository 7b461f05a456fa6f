//! The valley scenario.
//!
//! A 41 x 90 DEM with unit cells. Elevation rises away from an east-west
//! valley floor on row 20 and climbs gently to the east, so water runs west
//! along the floor. Three quarter sections split the DEM into equal strips
//! `Q1` (x 0..30), `Q2` (x 30..60) and `Q3` (x 60..90).

use crate::config::{
    ContourConfig, HydrologyConfig, NamingConfig, PipelineConfig, ReferenceConfig, ThemeNaming, TilingConfig,
    WorkspaceConfig,
};
use crate::context::PipelineContext;
use crate::core::{FeatureClass, GeometryKind, QuarterSection, VectorFeature};
use crate::engine::OrderMethod;
use crate::raster::{GeoTransform, Lineage, Raster};
use crate::workspace::{write_json, Location};
use geo::polygon;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Rows of the valley DEM.
pub const DEM_ROWS: usize = 41;
/// Columns of the valley DEM.
pub const DEM_COLS: usize = 90;

const VALLEY_ROW: usize = 20;

/// Elevation of the valley DEM at a cell.
fn valley_z(row: usize, col: usize) -> f64 {
    10.0 + 25.0 * row.abs_diff(VALLEY_ROW) as f64 + 0.3 * col as f64
}

/// The valley DEM.
pub fn valley_dem() -> Raster<f64> {
    let values = (0..DEM_ROWS)
        .flat_map(|r| (0..DEM_COLS).map(move |c| valley_z(r, c)))
        .collect();
    Raster::from_vec(DEM_ROWS, DEM_COLS, values, GeoTransform::new(0.0, DEM_ROWS as f64, 1.0), None)
        .expect("valley dimensions match")
}

/// The valley DEM with `pits` single-cell depressions at seeded positions.
pub fn pitted_dem(seed: u64, pits: usize) -> Raster<f64> {
    let mut dem = valley_dem();
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..pits {
        let row = rng.gen_range(1..DEM_ROWS - 1);
        let col = rng.gen_range(1..DEM_COLS - 1);
        let depth = rng.gen_range(1.0..20.0);
        dem.set(row, col, valley_z(row, col) - depth);
    }
    dem
}

/// The three quarter sections.
pub fn quarter_sections() -> Vec<QuarterSection> {
    let top = DEM_ROWS as f64;
    ["Q1", "Q2", "Q3"]
        .iter()
        .enumerate()
        .map(|(i, code)| {
            let x0 = 30.0 * i as f64;
            let x1 = x0 + 30.0;
            QuarterSection::new(
                *code,
                polygon![(x: x0, y: 0.0), (x: x1, y: 0.0), (x: x1, y: top), (x: x0, y: top), (x: x0, y: 0.0)],
            )
        })
        .collect()
}

/// Tiles as the split step cuts them, with one cell of overlap.
pub fn scenario_tiles() -> Vec<Raster<f64>> {
    let dem = valley_dem();
    quarter_sections()
        .into_iter()
        .enumerate()
        .map(|(i, section)| {
            let col = (30 * i).saturating_sub(1);
            let end = (30 * (i + 1) + 1).min(DEM_COLS);
            dem.window(0, col, DEM_ROWS, end - col).with_lineage(Lineage {
                source: "dtm".to_string(),
                region_code: section.code.clone(),
                core: section.polygon,
            })
        })
        .collect()
}

/// A configuration rooted at `root` that suits the valley.
pub fn scenario_config(root: &Path) -> PipelineConfig {
    let theme = |prefix: &str, min_length: f64| ThemeNaming {
        prefix: prefix.to_string(),
        min_length,
    };
    PipelineConfig {
        workspace: WorkspaceConfig { root: root.to_path_buf() },
        reference: ReferenceConfig {
            path: "reference/quarter_sections.fc.json".into(),
            id_field: "SEWMAP".to_string(),
            require_field: None,
        },
        tiling: TilingConfig {
            overlap: 1.0,
            tile_prefix: "dtm_split_".to_string(),
            source_dem: "dtm".to_string(),
        },
        contour: ContourConfig {
            interval: 50.0,
            max_elevation: 500.0,
            polygon_interval: 100.0,
            max_vertices: 10_000,
            min_length: 5.0,
            simplify_tolerance: 0.5,
            smooth_tolerance: 2.0,
        },
        hydrology: HydrologyConfig {
            stream_order_threshold: 5,
            fill_epsilon: 0.0,
            order_method: OrderMethod::Shreve,
        },
        naming: NamingConfig {
            contour_lines: theme("CL", 1.0),
            contour_polygons: theme("CP", 1.0),
            streams: theme("S", 10.0),
            containment_tolerance: 1e-6,
            strict: false,
        },
        parallelism: 2,
        log_level: "debug".to_string(),
    }
}

/// Writes `sections` as the reference layer.
pub fn write_sections(ctx: &PipelineContext, sections: &[QuarterSection]) {
    let id_field = &ctx.config().reference.id_field;
    let features = sections
        .iter()
        .map(|s| VectorFeature::new(s.polygon.clone()).with_attribute(id_field.as_str(), s.code.as_str()))
        .collect();
    let class = FeatureClass::new("quarter_sections", GeometryKind::Polygon).with_features(features);
    write_json(&ctx.config().reference_path(), &class).expect("reference layer is writable");
}

/// Writes the three quarter sections as the reference layer.
pub fn write_reference(ctx: &PipelineContext) {
    write_sections(ctx, &quarter_sections());
}

/// Writes the valley DEM and the reference layer.
pub fn seed_workspace(ctx: &PipelineContext) {
    let name = &ctx.config().tiling.source_dem;
    ctx.workspace()
        .write_raster(Location::Dem, name, &valley_dem())
        .expect("DEM is writable");
    write_reference(ctx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valley_floor_is_lowest_row() {
        let dem = valley_dem();
        for col in [0, 45, 89] {
            let floor = dem.value(VALLEY_ROW, col).unwrap();
            assert!(dem.value(VALLEY_ROW - 1, col).unwrap() > floor);
            assert!(dem.value(VALLEY_ROW + 1, col).unwrap() > floor);
        }
    }

    #[test]
    fn test_tiles_overlap_by_one_cell() {
        let tiles = scenario_tiles();
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[1].extent().min_x, 29.0);
        assert_eq!(tiles[1].extent().max_x, 61.0);
        assert_eq!(tiles[2].extent().max_x, 90.0);
    }

    #[test]
    fn test_pits_are_reproducible() {
        assert_eq!(pitted_dem(7, 5), pitted_dem(7, 5));
        assert_ne!(pitted_dem(7, 5), valley_dem());
    }
}
