//! Contour lines by marching squares.
//!
//! The sample grid is the set of cell centres. Each 2×2 block of centres
//! contributes up to two segments per level; segments meet on the block
//! edges they cross, so an edge crossing is identified by the edge itself
//! and segments are chained through shared crossings.

use crate::core::VectorFeature;
use crate::engine::EngineResult;
use crate::errors::ExternalEngineError;
use crate::raster::Raster;
use geo::{Coord, LineString};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// A block edge between two adjacent centres: `(row, col, vertical)`.
/// Horizontal edges join `(row, col)`–`(row, col + 1)`, vertical edges join
/// `(row, col)`–`(row + 1, col)`.
type EdgeKey = (usize, usize, bool);

/// Contour levels: multiples of `interval` above `lo`, up to `hi` and not
/// above `max_elevation`. Zero and negative levels are kept.
///
/// A level equal to `lo` has no sample below it and is skipped.
pub(super) fn levels(lo: f64, hi: f64, interval: f64, max_elevation: f64) -> Vec<f64> {
    let top = hi.min(max_elevation);
    let first = (lo / interval).floor() as i64 + 1;
    let last = (top / interval).floor() as i64;
    (first..=last).map(|k| k as f64 * interval).collect()
}

pub(super) fn contour_lines(
    tile: &Raster<f64>,
    interval: f64,
    max_elevation: f64,
    max_vertices: usize,
) -> EngineResult<Vec<VectorFeature>> {
    if !(interval > 0.0) {
        return Err(ExternalEngineError::new("contour_lines", format!("invalid interval {interval}")));
    }
    if max_vertices < 2 {
        return Err(ExternalEngineError::new(
            "contour_lines",
            format!("max_vertices must be at least 2, got {max_vertices}"),
        ));
    }
    let Some((lo, hi)) = tile.min_max() else {
        return Ok(Vec::new());
    };
    let mut features = Vec::new();
    for level in levels(lo, hi, interval, max_elevation) {
        for line in trace_level(tile, level) {
            for piece in split_vertices(line, max_vertices) {
                features.push(VectorFeature::new(piece).with_attribute("Contour", level));
            }
        }
    }
    Ok(features)
}

/// Splits a line into consecutive pieces sharing their end vertices.
fn split_vertices(line: LineString<f64>, max_vertices: usize) -> Vec<LineString<f64>> {
    if line.0.len() <= max_vertices {
        return vec![line];
    }
    let step = max_vertices - 1;
    let mut pieces = Vec::new();
    let mut start = 0;
    while start + 1 < line.0.len() {
        let end = (start + step).min(line.0.len() - 1);
        pieces.push(LineString::from(line.0[start..=end].to_vec()));
        start = end;
    }
    pieces
}

fn trace_level(tile: &Raster<f64>, level: f64) -> Vec<LineString<f64>> {
    let (rows, cols) = (tile.rows(), tile.cols());
    if rows < 2 || cols < 2 {
        return Vec::new();
    }
    let t = *tile.transform();
    let mut points: HashMap<EdgeKey, Coord<f64>> = HashMap::new();
    let mut segments: Vec<[EdgeKey; 2]> = Vec::new();

    let crossing = |(r, c, vertical): EdgeKey| -> Option<Coord<f64>> {
        let b = if vertical { (r + 1, c) } else { (r, c + 1) };
        let va = tile.value(r, c)?;
        let vb = tile.value(b.0, b.1)?;
        let frac = (level - va) / (vb - va);
        let pa = t.cell_center(r, c);
        let pb = t.cell_center(b.0, b.1);
        Some(Coord {
            x: pa.x + frac * (pb.x - pa.x),
            y: pa.y + frac * (pb.y - pa.y),
        })
    };

    for r in 0..rows - 1 {
        for c in 0..cols - 1 {
            let (Some(tl), Some(tr), Some(br), Some(bl)) = (
                tile.value(r, c),
                tile.value(r, c + 1),
                tile.value(r + 1, c + 1),
                tile.value(r + 1, c),
            ) else {
                continue;
            };
            let case = (usize::from(tl > level) << 3)
                | (usize::from(tr > level) << 2)
                | (usize::from(br > level) << 1)
                | usize::from(bl > level);
            if case == 0 || case == 15 {
                continue;
            }

            let top: EdgeKey = (r, c, false);
            let bottom: EdgeKey = (r + 1, c, false);
            let left: EdgeKey = (r, c, true);
            let right: EdgeKey = (r, c + 1, true);

            let center_inside = (tl + tr + br + bl) / 4.0 > level;
            let pairs: Vec<[EdgeKey; 2]> = match case {
                1 | 14 => vec![[left, bottom]],
                2 | 13 => vec![[bottom, right]],
                3 | 12 => vec![[left, right]],
                4 | 11 => vec![[top, right]],
                6 | 9 => vec![[top, bottom]],
                7 | 8 => vec![[left, top]],
                5 if center_inside => vec![[left, top], [bottom, right]],
                5 => vec![[left, bottom], [top, right]],
                10 if center_inside => vec![[top, right], [left, bottom]],
                10 => vec![[left, top], [bottom, right]],
                _ => Vec::new(),
            };
            for pair in &pairs {
                for key in pair {
                    if let Entry::Vacant(slot) = points.entry(*key) {
                        if let Some(p) = crossing(*key) {
                            slot.insert(p);
                        }
                    }
                }
            }
            segments.extend(pairs);
        }
    }

    chain(&segments)
        .into_iter()
        .map(|keys| keys.iter().filter_map(|k| points.get(k).copied()).collect::<LineString<f64>>())
        .filter(|line| crate::core::line_length(line) > 0.0)
        .collect()
}

/// Chains segments through shared edge keys into maximal paths.
///
/// Open paths are traced from their free ends first; what remains are
/// closed loops, which repeat their first key at the end.
fn chain(segments: &[[EdgeKey; 2]]) -> Vec<Vec<EdgeKey>> {
    let mut incident: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
    for (i, seg) in segments.iter().enumerate() {
        for key in seg {
            incident.entry(*key).or_default().push(i);
        }
    }
    let mut used = vec![false; segments.len()];
    let mut paths = Vec::new();

    let walk = |start_seg: usize, start_key: EdgeKey, used: &mut Vec<bool>| -> Vec<EdgeKey> {
        let mut path = vec![start_key];
        let mut seg = start_seg;
        let mut key = start_key;
        loop {
            used[seg] = true;
            let [a, b] = segments[seg];
            key = if a == key { b } else { a };
            path.push(key);
            let next = incident
                .get(&key)
                .and_then(|segs| segs.iter().copied().find(|&s| !used[s]));
            match next {
                Some(s) => seg = s,
                None => break,
            }
        }
        path
    };

    for i in 0..segments.len() {
        if used[i] {
            continue;
        }
        for key in segments[i] {
            if incident.get(&key).map_or(0, Vec::len) == 1 {
                paths.push(walk(i, key, &mut used));
                break;
            }
        }
    }
    for i in 0..segments.len() {
        if !used[i] {
            paths.push(walk(i, segments[i][0], &mut used));
        }
    }
    paths
}
