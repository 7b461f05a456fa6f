//! Line generalization: point removal and smoothing.
//!
//! Both operations work feature by feature. A feature that collapses (fewer
//! than two distinct vertices, or no length) is dropped and counted instead
//! of failing the batch.

use crate::core::{line_length, VectorFeature};
use crate::engine::{EngineResult, Generalized};
use crate::errors::ExternalEngineError;
use geo::{Coord, Geometry, LineString, MultiLineString, Simplify};

fn check_tolerance(operation: &str, tolerance: f64) -> EngineResult<()> {
    if tolerance.is_finite() && tolerance >= 0.0 {
        Ok(())
    } else {
        Err(ExternalEngineError::new(operation, format!("invalid tolerance {tolerance}")))
    }
}

fn collapsed(ls: &LineString<f64>) -> bool {
    ls.0.len() < 2 || line_length(ls) <= 0.0
}

fn apply<F>(features: &[VectorFeature], f: F) -> Generalized
where
    F: Fn(&LineString<f64>) -> LineString<f64>,
{
    let mut out = Generalized::default();
    for feature in features {
        let geometry: Option<Geometry<f64>> = match &feature.geometry {
            Geometry::LineString(ls) => Some(f(ls)).filter(|g| !collapsed(g)).map(Geometry::LineString),
            Geometry::MultiLineString(mls) => {
                let parts: Vec<LineString<f64>> = mls.0.iter().map(&f).filter(|g| !collapsed(g)).collect();
                (!parts.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(parts)))
            }
            _ => None,
        };
        match geometry {
            Some(g) => out.features.push(feature.with_geometry(g)),
            None => out.discarded += 1,
        }
    }
    out
}

/// Douglas-Peucker point removal.
pub(super) fn simplify(features: &[VectorFeature], tolerance: f64) -> EngineResult<Generalized> {
    check_tolerance("simplify_lines", tolerance)?;
    Ok(apply(features, |ls| ls.simplify(&tolerance)))
}

/// Smoothing by a Gaussian-weighted moving average along the line.
///
/// The line is resampled at a quarter of the tolerance, then every sample is
/// replaced by the weighted mean of the samples within `tolerance` of it
/// along the line. Open lines keep their end points; closed lines stay
/// closed.
pub(super) fn smooth(features: &[VectorFeature], tolerance: f64) -> EngineResult<Generalized> {
    check_tolerance("smooth_lines", tolerance)?;
    if tolerance == 0.0 {
        return Ok(apply(features, LineString::clone));
    }
    Ok(apply(features, |ls| smooth_line(ls, tolerance)))
}

fn smooth_line(ls: &LineString<f64>, tolerance: f64) -> LineString<f64> {
    let closed = ls.is_closed() && ls.0.len() > 3;
    let samples = resample(ls, tolerance / 4.0);
    if samples.len() < 3 {
        return ls.clone();
    }
    // Arc-length position of every sample.
    let mut s = vec![0.0; samples.len()];
    for i in 1..samples.len() {
        s[i] = s[i - 1] + dist(samples[i - 1], samples[i]);
    }
    let total = s[s.len() - 1];
    let sigma = tolerance / 2.0;
    // Drop the duplicated closing sample while averaging.
    let n = if closed { samples.len() - 1 } else { samples.len() };

    let mut out: Vec<Coord<f64>> = Vec::with_capacity(samples.len());
    for i in 0..n {
        if !closed && (i == 0 || i == n - 1) {
            out.push(samples[i]);
            continue;
        }
        let (mut wx, mut wy, mut wsum) = (0.0, 0.0, 0.0);
        for j in 0..n {
            let mut d = (s[j] - s[i]).abs();
            if closed {
                d = d.min(total - d);
            }
            if d > tolerance {
                continue;
            }
            let w = (-(d * d) / (2.0 * sigma * sigma)).exp();
            wx += w * samples[j].x;
            wy += w * samples[j].y;
            wsum += w;
        }
        out.push(Coord {
            x: wx / wsum,
            y: wy / wsum,
        });
    }
    if closed {
        out.push(out[0]);
    }
    LineString::new(out)
}

fn dist(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Inserts vertices so no segment is longer than `step`. Original vertices
/// are kept.
fn resample(ls: &LineString<f64>, step: f64) -> Vec<Coord<f64>> {
    let mut out = Vec::with_capacity(ls.0.len());
    for w in ls.0.windows(2) {
        let (a, b) = (w[0], w[1]);
        out.push(a);
        let pieces = (dist(a, b) / step).ceil() as usize;
        for k in 1..pieces {
            let t = k as f64 / pieces as f64;
            out.push(Coord {
                x: a.x + t * (b.x - a.x),
                y: a.y + t * (b.y - a.y),
            });
        }
    }
    if let Some(&last) = ls.0.last() {
        out.push(last);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Polygon;

    fn zigzag() -> VectorFeature {
        let coords: Vec<(f64, f64)> = (0..20)
            .map(|i| (f64::from(i), if i % 2 == 0 { 0.0 } else { 0.3 }))
            .collect();
        VectorFeature::new(LineString::from(coords)).with_attribute("Contour", 50.0)
    }

    #[test]
    fn test_simplify_reduces_vertices_and_keeps_attributes() {
        let out = simplify(&[zigzag()], 1.0).unwrap();
        assert_eq!(out.discarded, 0);
        let Geometry::LineString(ls) = &out.features[0].geometry else {
            panic!("expected line");
        };
        assert_eq!(ls.0.len(), 2);
        assert_eq!(out.features[0].attribute("Contour").and_then(|v| v.as_f64()), Some(50.0));
    }

    #[test]
    fn test_collapsed_and_non_line_features_are_discarded() {
        let point_like = VectorFeature::new(LineString::from(vec![(1.0, 1.0), (1.0, 1.0)]));
        let polygon = VectorFeature::new(Polygon::new(LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]), vec![]));
        let out = simplify(&[point_like, zigzag(), polygon], 1.0).unwrap();
        assert_eq!(out.features.len(), 1);
        assert_eq!(out.discarded, 2);
    }

    #[test]
    fn test_smooth_keeps_open_endpoints() {
        let original = zigzag();
        let out = smooth(&[original.clone()], 2.0).unwrap();
        let (Geometry::LineString(before), Geometry::LineString(after)) =
            (&original.geometry, &out.features[0].geometry)
        else {
            panic!("expected lines");
        };
        assert_eq!(after.0.first(), before.0.first());
        assert_eq!(after.0.last(), before.0.last());
        // Interior wiggle is damped.
        let max_dev = after.0[1..after.0.len() - 1]
            .iter()
            .map(|c| (c.y - 0.15).abs())
            .fold(0.0, f64::max);
        assert!(max_dev < 0.15, "max deviation {max_dev}");
    }

    #[test]
    fn test_smooth_keeps_rings_closed() {
        let ring = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]);
        let out = smooth(&[VectorFeature::new(ring)], 2.0).unwrap();
        let Geometry::LineString(ls) = &out.features[0].geometry else {
            panic!("expected line");
        };
        assert!(ls.is_closed());
    }

    #[test]
    fn test_negative_tolerance_is_engine_error() {
        let err = smooth(&[zigzag()], -1.0).unwrap_err();
        assert_eq!(err.operation, "smooth_lines");
    }
}
