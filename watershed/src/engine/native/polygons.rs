//! Contour band polygons traced from cell masks.

use crate::core::VectorFeature;
use crate::engine::EngineResult;
use crate::errors::ExternalEngineError;
use crate::raster::{GeoTransform, Raster};
use geo::{Contains, Coord, LineString, Point, Polygon};
use ndarray::Array2;
use std::collections::HashMap;

/// A cell corner as `(col, row)`.
type Vertex = (i64, i64);

pub(super) fn contour_polygons(tile: &Raster<f64>, interval: f64, max_elevation: f64) -> EngineResult<Vec<VectorFeature>> {
    if !(interval > 0.0) {
        return Err(ExternalEngineError::new("contour_polygons", format!("invalid interval {interval}")));
    }
    let Some((lo, hi)) = tile.min_max() else {
        return Ok(Vec::new());
    };
    if lo > max_elevation {
        return Ok(Vec::new());
    }
    let first = (lo / interval).floor() as i64;
    let last = (hi.min(max_elevation) / interval).floor() as i64;

    let mut features = Vec::new();
    for k in first..=last {
        let band_lo = k as f64 * interval;
        let band_hi = band_lo + interval;
        let mask = tile
            .data()
            .map(|&v| !tile.is_nodata(v) && v >= band_lo && v < band_hi && v <= max_elevation);
        for polygon in trace_mask(&mask, tile.transform()) {
            features.push(
                VectorFeature::new(polygon)
                    .with_attribute("ContourMin", band_lo)
                    .with_attribute("ContourMax", band_hi),
            );
        }
    }
    Ok(features)
}

/// Traces the boundary of every 4-connected region of `mask` into polygons.
///
/// Boundary edges are oriented with the region on their left, so shells
/// come out counter-clockwise and holes clockwise in map coordinates.
pub(super) fn trace_mask(mask: &Array2<bool>, transform: &GeoTransform) -> Vec<Polygon<f64>> {
    let (rows, cols) = mask.dim();
    let inside = |r: i64, c: i64| r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols && mask[[r as usize, c as usize]];

    let mut edges: Vec<(Vertex, Vertex)> = Vec::new();
    for ((r, c), &m) in mask.indexed_iter() {
        if !m {
            continue;
        }
        let (r, c) = (r as i64, c as i64);
        if !inside(r + 1, c) {
            edges.push(((c, r + 1), (c + 1, r + 1)));
        }
        if !inside(r, c + 1) {
            edges.push(((c + 1, r + 1), (c + 1, r)));
        }
        if !inside(r - 1, c) {
            edges.push(((c + 1, r), (c, r)));
        }
        if !inside(r, c - 1) {
            edges.push(((c, r), (c, r + 1)));
        }
    }

    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, (from, _)) in edges.iter().enumerate() {
        outgoing.entry(*from).or_default().push(i);
    }
    let mut used = vec![false; edges.len()];
    let mut loops: Vec<Vec<Vertex>> = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut path = vec![edges[start].0];
        let mut position: HashMap<Vertex, usize> = HashMap::from([(edges[start].0, 0)]);
        let mut current = start;
        loop {
            used[current] = true;
            let (from, to) = edges[current];
            if let Some(&j) = position.get(&to) {
                // Back at a vertex of the open path: split off a simple loop.
                let mut ring = path[j..].to_vec();
                ring.push(to);
                for v in &path[j + 1..] {
                    position.remove(v);
                }
                path.truncate(j + 1);
                loops.push(ring);
            } else {
                position.insert(to, path.len());
                path.push(to);
            }
            let heading = (to.0 - from.0, to.1 - from.1);
            let next = outgoing.get(&to).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .filter(|&e| !used[e])
                    .min_by_key(|&e| turn_rank(heading, edges[e]))
            });
            match next {
                Some(e) => current = e,
                None => break,
            }
        }
    }

    let mut shells: Vec<(Vec<Vertex>, f64)> = Vec::new();
    let mut holes: Vec<Vec<Vertex>> = Vec::new();
    for ring in loops {
        let ring = drop_collinear(ring);
        if ring.len() < 4 {
            continue;
        }
        // Map y runs opposite to row index, so the sign flips.
        let area = -signed_area(&ring);
        if area > 0.0 {
            shells.push((ring, area));
        } else if area < 0.0 {
            holes.push(ring);
        }
    }

    let to_map = |ring: &[Vertex]| -> LineString<f64> {
        ring.iter()
            .map(|&(vx, vy)| Coord {
                x: transform.origin_x + vx as f64 * transform.cell_size,
                y: transform.origin_y - vy as f64 * transform.cell_size,
            })
            .collect()
    };
    let shell_polygons: Vec<Polygon<f64>> = shells
        .iter()
        .map(|(ring, _)| Polygon::new(to_map(ring), vec![]))
        .collect();
    let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];
    for hole in holes {
        let (a, b) = (hole[0], hole[1]);
        let inside = Point::new(
            transform.origin_x + (a.0 + b.0) as f64 / 2.0 * transform.cell_size,
            transform.origin_y - (a.1 + b.1) as f64 / 2.0 * transform.cell_size,
        );
        let owner = shell_polygons
            .iter()
            .enumerate()
            .filter(|(_, p)| p.contains(&inside))
            .min_by(|(i, _), (j, _)| shells[*i].1.total_cmp(&shells[*j].1))
            .map(|(i, _)| i);
        if let Some(i) = owner {
            interiors[i].push(to_map(&hole));
        }
    }

    shell_polygons
        .into_iter()
        .zip(interiors)
        .map(|(shell, holes)| Polygon::new(shell.exterior().clone(), holes))
        .collect()
}

/// Left turns first, then straight on, then right, then back.
fn turn_rank(heading: Vertex, edge: (Vertex, Vertex)) -> u8 {
    let e = (edge.1 .0 - edge.0 .0, edge.1 .1 - edge.0 .1);
    // Cross product in map orientation (row axis flipped).
    let cross = e.0 * heading.1 - heading.0 * e.1;
    let dot = heading.0 * e.0 + heading.1 * e.1;
    match (cross.signum(), dot.signum()) {
        (1, _) => 0,
        (0, 1) => 1,
        (-1, _) => 2,
        _ => 3,
    }
}

fn signed_area(ring: &[Vertex]) -> f64 {
    ring.windows(2)
        .map(|w| (w[0].0 * w[1].1 - w[1].0 * w[0].1) as f64)
        .sum::<f64>()
        / 2.0
}

/// Removes vertices that continue straight on. Input and output are closed.
fn drop_collinear(mut ring: Vec<Vertex>) -> Vec<Vertex> {
    ring.pop();
    let n = ring.len();
    if n < 3 {
        return Vec::new();
    }
    let kept: Vec<Vertex> = (0..n)
        .filter(|&i| {
            let p = ring[(i + n - 1) % n];
            let v = ring[i];
            let q = ring[(i + 1) % n];
            (v.0 - p.0) * (q.1 - v.1) - (v.1 - p.1) * (q.0 - v.0) != 0
        })
        .map(|i| ring[i])
        .collect();
    let mut closed = kept;
    if let Some(&first) = closed.first() {
        closed.push(first);
    }
    closed
}
