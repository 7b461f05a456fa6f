//! Overlay of features against reference regions.

use crate::core::{line_length, QuarterSection, VectorFeature};
use geo::{
    Area, BooleanOps, BoundingRect, Contains, Coord, Geometry, Intersects, LineString, MultiLineString, MultiPolygon,
    Point, Polygon, Rect,
};

/// Clips features to a region. Every resulting piece becomes its own
/// feature carrying the source attributes.
pub(super) fn clip(features: &[VectorFeature], region: &Polygon<f64>) -> Vec<VectorFeature> {
    let mut out = Vec::new();
    for feature in features {
        match &feature.geometry {
            Geometry::LineString(ls) => push_lines(&mut out, feature, region, MultiLineString::new(vec![ls.clone()])),
            Geometry::MultiLineString(mls) => push_lines(&mut out, feature, region, mls.clone()),
            Geometry::Polygon(p) => push_polygons(&mut out, feature, region.intersection(p)),
            Geometry::MultiPolygon(mp) => push_polygons(&mut out, feature, MultiPolygon::new(vec![region.clone()]).intersection(mp)),
            _ => {}
        }
    }
    out
}

fn push_lines(out: &mut Vec<VectorFeature>, feature: &VectorFeature, region: &Polygon<f64>, lines: MultiLineString<f64>) {
    let clipped = region.clip(&lines, false);
    out.extend(
        clipped
            .0
            .into_iter()
            .filter(|ls| ls.0.len() >= 2 && line_length(ls) > 0.0)
            .map(|ls| feature.with_geometry(ls)),
    );
}

fn push_polygons(out: &mut Vec<VectorFeature>, feature: &VectorFeature, pieces: MultiPolygon<f64>) {
    out.extend(
        pieces
            .0
            .into_iter()
            .filter(|p| p.unsigned_area() > 0.0)
            .map(|p| feature.with_geometry(p)),
    );
}

/// Splits lines at region boundaries, grouped by region code in the order
/// the regions are given. Regions that receive nothing are omitted.
pub(super) fn split_by_region(lines: &[VectorFeature], regions: &[QuarterSection]) -> Vec<(String, Vec<VectorFeature>)> {
    regions
        .iter()
        .filter_map(|region| {
            let pieces = clip(lines, &region.polygon);
            (!pieces.is_empty()).then(|| (region.code.clone(), pieces))
        })
        .collect()
}

/// Codes of the regions that completely contain a geometry.
///
/// A sample point counts as contained when it lies inside the region or
/// within `tolerance` of its boundary, so pieces clipped exactly at a
/// boundary still match. At least one sample must be strictly inside.
pub(super) fn containing_regions(geometry: &Geometry<f64>, regions: &[QuarterSection], tolerance: f64) -> Vec<String> {
    let samples = sample_points(geometry);
    let Some(bounds) = geometry.bounding_rect() else {
        return Vec::new();
    };
    if samples.is_empty() {
        return Vec::new();
    }
    regions
        .iter()
        .filter(|region| {
            region
                .polygon
                .bounding_rect()
                .is_some_and(|r| covers(&grow(r, tolerance), &bounds))
        })
        .filter(|region| contains_samples(&region.polygon, &samples, tolerance))
        .map(|region| region.code.clone())
        .collect()
}

fn grow(r: Rect<f64>, by: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: r.min().x - by,
            y: r.min().y - by,
        },
        Coord {
            x: r.max().x + by,
            y: r.max().y + by,
        },
    )
}

fn covers(outer: &Rect<f64>, inner: &Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

fn contains_samples(polygon: &Polygon<f64>, samples: &[Point<f64>], tolerance: f64) -> bool {
    let mut strictly_inside = false;
    for point in samples {
        if polygon.contains(point) {
            strictly_inside = true;
        } else if !polygon.intersects(point) && boundary_distance(polygon, point.0) > tolerance {
            return false;
        }
    }
    strictly_inside
}

/// Vertices plus segment midpoints of every ring or line in the geometry.
fn sample_points(geometry: &Geometry<f64>) -> Vec<Point<f64>> {
    let mut lines: Vec<&LineString<f64>> = Vec::new();
    match geometry {
        Geometry::LineString(ls) => lines.push(ls),
        Geometry::MultiLineString(mls) => lines.extend(mls.0.iter()),
        Geometry::Polygon(p) => {
            lines.push(p.exterior());
            lines.extend(p.interiors());
        }
        Geometry::MultiPolygon(mp) => {
            for p in &mp.0 {
                lines.push(p.exterior());
                lines.extend(p.interiors());
            }
        }
        _ => {}
    }
    let mut out = Vec::new();
    for ls in lines {
        out.extend(ls.0.iter().map(|&c| Point(c)));
        out.extend(ls.0.windows(2).map(|w| {
            Point(Coord {
                x: (w[0].x + w[1].x) / 2.0,
                y: (w[0].y + w[1].y) / 2.0,
            })
        }));
    }
    out
}

fn boundary_distance(polygon: &Polygon<f64>, p: Coord<f64>) -> f64 {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(|ring| ring.0.windows(2).map(|w| segment_distance(p, w[0], w[1])))
        .fold(f64::INFINITY, f64::min)
}

fn segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    };
    (p.x - (a.x + t * dx)).hypot(p.y - (a.y + t * dy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(code: &str, x0: f64, y0: f64, size: f64) -> QuarterSection {
        QuarterSection::new(
            code,
            polygon![
                (x: x0, y: y0),
                (x: x0 + size, y: y0),
                (x: x0 + size, y: y0 + size),
                (x: x0, y: y0 + size),
                (x: x0, y: y0),
            ],
        )
    }

    fn line(coords: Vec<(f64, f64)>) -> VectorFeature {
        VectorFeature::new(LineString::from(coords)).with_attribute("arcid", 7_i64)
    }

    #[test]
    fn test_clip_trims_line_and_keeps_attributes() {
        let region = square("Q1", 0.0, 0.0, 10.0);
        let out = clip(&[line(vec![(-5.0, 5.0), (15.0, 5.0)])], &region.polygon);
        assert_eq!(out.len(), 1);
        assert!((out[0].length() - 10.0).abs() < 1e-9);
        assert_eq!(out[0].attribute("arcid").map(ToString::to_string), Some("7".to_string()));
    }

    #[test]
    fn test_clip_polygon_uses_intersection() {
        let region = square("Q1", 0.0, 0.0, 10.0);
        let band = square("band", 5.0, 5.0, 10.0);
        let out = clip(&[VectorFeature::new(band.polygon)], &region.polygon);
        assert_eq!(out.len(), 1);
        let Geometry::Polygon(p) = &out[0].geometry else {
            panic!("expected polygon");
        };
        assert!((p.unsigned_area() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_by_region_omits_empty_regions() {
        let regions = vec![
            square("Q1", 0.0, 0.0, 10.0),
            square("Q2", 10.0, 0.0, 10.0),
            square("Q3", 0.0, 20.0, 10.0),
        ];
        let out = split_by_region(&[line(vec![(2.0, 5.0), (18.0, 5.0)])], &regions);
        let codes: Vec<&str> = out.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(codes, vec!["Q1", "Q2"]);
        assert!((out[0].1[0].length() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_piece_on_boundary_matches_only_its_region() {
        let regions = vec![square("Q1", 0.0, 0.0, 10.0), square("Q2", 10.0, 0.0, 10.0)];
        let piece = line(vec![(2.0, 5.0), (10.0, 5.0)]);
        assert_eq!(containing_regions(&piece.geometry, &regions, 1e-6), vec!["Q1".to_string()]);
    }

    #[test]
    fn test_crossing_line_matches_nothing() {
        let regions = vec![square("Q1", 0.0, 0.0, 10.0), square("Q2", 10.0, 0.0, 10.0)];
        let crossing = line(vec![(2.0, 5.0), (18.0, 5.0)]);
        assert!(containing_regions(&crossing.geometry, &regions, 1e-6).is_empty());
    }

    #[test]
    fn test_overlapping_regions_are_both_reported() {
        let regions = vec![square("A", 0.0, 0.0, 10.0), square("B", 1.0, 1.0, 10.0)];
        let inner = line(vec![(3.0, 3.0), (6.0, 6.0)]);
        assert_eq!(containing_regions(&inner.geometry, &regions, 1e-6), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_segment_distance() {
        let d = segment_distance(Coord { x: 5.0, y: 3.0 }, Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 0.0 });
        assert!((d - 3.0).abs() < 1e-12);
    }
}
