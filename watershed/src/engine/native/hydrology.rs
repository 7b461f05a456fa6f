//! Depression filling, D8 routing, stream ordering and vectorization.

use crate::core::VectorFeature;
use crate::engine::{EngineResult, OrderMethod};
use crate::errors::ExternalEngineError;
use crate::raster::{d8_target, Raster, D8_NODATA, D8_OFFSETS, D8_SINK};
use geo::LineString;
use ndarray::Array2;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use tracing::warn;

const SQRT_2: f64 = std::f64::consts::SQRT_2;

/// Distance factors indexed like [`D8_OFFSETS`].
const D8_DIST: [f64; 8] = [1.0, SQRT_2, 1.0, SQRT_2, 1.0, SQRT_2, 1.0, SQRT_2];

/// Outward directions tried for edge cells, cardinals first.
const OUTWARD_PREFERENCE: [u8; 8] = [1, 3, 5, 7, 2, 4, 6, 8];

/// Elevation difference below which two cells are on the same flat.
const FLAT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct Cell {
    elevation: f64,
    row: usize,
    col: usize,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    // Reversed so the max-heap pops the lowest cell; position breaks ties
    // so the fill is deterministic.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| (other.row, other.col).cmp(&(self.row, self.col)))
    }
}

fn neighbours(row: usize, col: usize, rows: usize, cols: usize) -> impl Iterator<Item = (usize, usize, usize)> {
    D8_OFFSETS.iter().enumerate().filter_map(move |(k, &(dr, dc))| {
        let r = row as isize + dr;
        let c = col as isize + dc;
        (r >= 0 && c >= 0 && r < rows as isize && c < cols as isize).then(|| (k, r as usize, c as usize))
    })
}

/// True if the cell touches the grid edge or a nodata cell.
fn on_boundary<T: crate::raster::RasterElement>(raster: &Raster<T>, row: usize, col: usize) -> bool {
    let (rows, cols) = (raster.rows(), raster.cols());
    row == 0
        || col == 0
        || row + 1 == rows
        || col + 1 == cols
        || neighbours(row, col, rows, cols).any(|(_, r, c)| raster.value(r, c).is_none())
}

/// Priority-Flood depression filling.
///
/// Boundary cells (grid edge or next to nodata) seed a min-heap; every other
/// cell is raised to at least its lowest path to the boundary, plus
/// `epsilon` per step when `epsilon > 0`.
pub(super) fn fill(dem: &Raster<f64>, epsilon: f64) -> EngineResult<Raster<f64>> {
    if !(epsilon >= 0.0 && epsilon.is_finite()) {
        return Err(ExternalEngineError::new("fill", format!("invalid epsilon {epsilon}")));
    }
    let (rows, cols) = (dem.rows(), dem.cols());
    let mut out = dem.clone();
    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut heap = BinaryHeap::new();

    for ((row, col), &v) in dem.data().indexed_iter() {
        if dem.is_nodata(v) {
            visited[[row, col]] = true;
        } else if on_boundary(dem, row, col) {
            visited[[row, col]] = true;
            heap.push(Cell { elevation: v, row, col });
        }
    }

    while let Some(cell) = heap.pop() {
        for (_, r, c) in neighbours(cell.row, cell.col, rows, cols) {
            if visited[[r, c]] {
                continue;
            }
            visited[[r, c]] = true;
            let original = dem.data()[[r, c]];
            let floor = cell.elevation + epsilon;
            let elevation = if original < floor {
                if epsilon > 0.0 {
                    floor
                } else {
                    cell.elevation
                }
            } else {
                original
            };
            out.set(r, c, elevation);
            heap.push(Cell { elevation, row: r, col: c });
        }
    }
    Ok(out)
}

/// D8 flow direction (1 = E, counter-clockwise to 8 = SE, 0 = sink).
///
/// Boundary cells with no lower neighbour drain out of the grid or into
/// the adjacent nodata cell. Flats drain toward their outlet by
/// breadth-first propagation from cells that already have a direction.
pub(super) fn flow_direction(filled: &Raster<f64>) -> Raster<u8> {
    let (rows, cols) = (filled.rows(), filled.cols());
    let cell_size = filled.cell_size();
    let mut dir = filled.like(D8_SINK, Some(D8_NODATA));

    for row in 0..rows {
        for col in 0..cols {
            let Some(center) = filled.value(row, col) else {
                dir.set(row, col, D8_NODATA);
                continue;
            };
            let mut best = D8_SINK;
            let mut max_drop = 0.0;
            for (k, r, c) in neighbours(row, col, rows, cols) {
                let Some(n) = filled.value(r, c) else { continue };
                let drop = (center - n) / (D8_DIST[k] * cell_size);
                if drop > max_drop {
                    max_drop = drop;
                    best = (k + 1) as u8;
                }
            }
            if best == D8_SINK && on_boundary(filled, row, col) {
                best = OUTWARD_PREFERENCE
                    .into_iter()
                    .find(|&code| match d8_target(row, col, code, rows, cols) {
                        None => true,
                        Some((r, c)) => filled.value(r, c).is_none(),
                    })
                    .unwrap_or(D8_SINK);
            }
            dir.set(row, col, best);
        }
    }

    let mut queue: VecDeque<(usize, usize)> = dir
        .valid_cells()
        .filter(|&(_, _, code)| code != D8_SINK)
        .map(|(r, c, _)| (r, c))
        .collect();
    while let Some((row, col)) = queue.pop_front() {
        let Some(z) = filled.value(row, col) else { continue };
        for (k, r, c) in neighbours(row, col, rows, cols) {
            if dir.value(r, c) != Some(D8_SINK) {
                continue;
            }
            match filled.value(r, c) {
                Some(n) if (n - z).abs() <= FLAT_TOLERANCE => {
                    // Point the flat cell back at the cell it was reached from.
                    dir.set(r, c, ((k + 4) % 8 + 1) as u8);
                    queue.push_back((r, c));
                }
                _ => {}
            }
        }
    }
    dir
}

fn downstream(direction: &Raster<u8>, row: usize, col: usize) -> Option<(usize, usize)> {
    let code = direction.value(row, col)?;
    let (r, c) = d8_target(row, col, code, direction.rows(), direction.cols())?;
    direction.value(r, c).map(|_| (r, c))
}

/// Orders every cell of a direction raster.
///
/// Cells are processed in topological order (upstream first). Cells caught
/// in a flow cycle cannot be ordered and are left as nodata (0).
pub(super) fn stream_order(direction: &Raster<u8>, method: OrderMethod) -> Raster<u32> {
    let (rows, cols) = (direction.rows(), direction.cols());
    let mut order = direction.like(0_u32, Some(0));
    let mut in_degree = Array2::<u32>::zeros((rows, cols));
    // (max inflow order, number of inflows at that order, sum of inflows)
    let mut inflow = Array2::<(u32, u32, u32)>::from_elem((rows, cols), (0, 0, 0));

    for (row, col, _) in direction.valid_cells() {
        if let Some((r, c)) = downstream(direction, row, col) {
            in_degree[[r, c]] += 1;
        }
    }

    let mut queue: VecDeque<(usize, usize)> = direction
        .valid_cells()
        .filter(|&(r, c, _)| in_degree[[r, c]] == 0)
        .map(|(r, c, _)| (r, c))
        .collect();
    let mut ordered = 0_usize;

    while let Some((row, col)) = queue.pop_front() {
        let (max_in, count_max, sum_in) = inflow[[row, col]];
        let value = match method {
            OrderMethod::Strahler if count_max == 0 => 1,
            OrderMethod::Strahler if count_max >= 2 => max_in + 1,
            OrderMethod::Strahler => max_in,
            OrderMethod::Shreve => sum_in.max(1),
        };
        order.set(row, col, value);
        ordered += 1;

        if let Some((r, c)) = downstream(direction, row, col) {
            let entry = &mut inflow[[r, c]];
            match value.cmp(&entry.0) {
                Ordering::Greater => {
                    entry.0 = value;
                    entry.1 = 1;
                }
                Ordering::Equal => entry.1 += 1,
                Ordering::Less => {}
            }
            entry.2 = entry.2.saturating_add(value);
            in_degree[[r, c]] -= 1;
            if in_degree[[r, c]] == 0 {
                queue.push_back((r, c));
            }
        }
    }

    let valid = direction.valid_cells().count();
    if ordered < valid {
        warn!(unordered = valid - ordered, "Flow cycles left cells without an order");
    }
    order
}

/// Keeps cells whose order exceeds `threshold`.
pub(super) fn condition(order: &Raster<u32>, threshold: u32) -> Raster<u32> {
    let mut out = order.like(0_u32, Some(0));
    for (row, col, value) in order.valid_cells() {
        if value > threshold {
            out.set(row, col, value);
        }
    }
    out
}

/// Vectorizes stream cells into reaches.
///
/// A reach starts at a head (no upstream stream cell) or a junction (two or
/// more) and runs downstream to the next junction or to an outlet. Vertices
/// are cell centres.
pub(super) fn stream_to_feature(streams: &Raster<u32>, direction: &Raster<u8>) -> EngineResult<Vec<VectorFeature>> {
    let (rows, cols) = (streams.rows(), streams.cols());
    if (rows, cols) != (direction.rows(), direction.cols()) {
        return Err(ExternalEngineError::new(
            "stream_to_feature",
            format!(
                "stream raster is {rows}x{cols} but direction raster is {}x{}",
                direction.rows(),
                direction.cols()
            ),
        ));
    }
    let is_stream = |r: usize, c: usize| streams.value(r, c).is_some_and(|v| v > 0);
    let next = |r: usize, c: usize| downstream(direction, r, c).filter(|&(nr, nc)| is_stream(nr, nc));

    let mut upstream = Array2::<u32>::zeros((rows, cols));
    for (row, col, _) in streams.valid_cells() {
        if !is_stream(row, col) {
            continue;
        }
        if let Some((r, c)) = next(row, col) {
            upstream[[r, c]] += 1;
        }
    }

    let transform = *streams.transform();
    let node_id = |r: usize, c: usize| (r * cols + c + 1) as i64;
    let mut features = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if !is_stream(row, col) || upstream[[row, col]] == 1 {
                continue;
            }
            let grid_code = streams.value(row, col).unwrap_or(0);
            let mut cells = vec![(row, col)];
            let (mut r, mut c) = (row, col);
            while let Some((nr, nc)) = next(r, c) {
                cells.push((nr, nc));
                if upstream[[nr, nc]] != 1 || cells.len() > rows * cols {
                    break;
                }
                (r, c) = (nr, nc);
            }
            if cells.len() < 2 {
                continue;
            }
            let (er, ec) = cells[cells.len() - 1];
            let line: LineString<f64> = cells.iter().map(|&(r, c)| transform.cell_center(r, c)).collect();
            features.push(
                VectorFeature::new(line)
                    .with_attribute("arcid", features.len() as i64 + 1)
                    .with_attribute("grid_code", grid_code)
                    .with_attribute("from_node", node_id(row, col))
                    .with_attribute("to_node", node_id(er, ec)),
            );
        }
    }
    Ok(features)
}
