//! Iso-line tracing over a scalar grid.
//!
//! Tracing is a narrow collaborator seam: any implementation that can turn
//! a grid and a level into raw point sequences can stand in for the
//! default marching-squares tracer without touching the repair or
//! selection logic built on top of it.

use std::collections::HashMap;

use geo::{Coord, LineString};

use crate::grid::ScalarGrid;

/// Produces raw iso-line components in grid index space (x = column,
/// y = row), one point sequence per component.
///
/// No closure guarantee: components may come back with first != last point
/// and callers must treat that as valid output.
pub trait ContourTracer {
    fn trace(&self, grid: &ScalarGrid, level: f32) -> Vec<LineString<f64>>;
}

/// Default tracer: marching squares with linear interpolation along cell
/// edges. Saddle cells are disambiguated by the cell-center average.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarchingSquares;

impl ContourTracer for MarchingSquares {
    fn trace(&self, grid: &ScalarGrid, level: f32) -> Vec<LineString<f64>> {
        let (rows, cols) = grid.shape();
        if rows < 2 || cols < 2 {
            return Vec::new();
        }

        let mut segments = Vec::new();
        for y in 0..rows - 1 {
            for x in 0..cols - 1 {
                emit_cell_segments(grid, x, y, level, &mut segments);
            }
        }
        chain_segments(&segments)
    }
}

/// One oriented crossing of a cell square. Cells at or above the level lie
/// on the left of the travel direction, so every crossing point has exactly
/// one incoming and one outgoing segment and chaining is deterministic.
#[derive(Debug, Clone, Copy)]
struct Segment {
    from: Coord<f64>,
    to: Coord<f64>,
}

const QUANT: f64 = 1e7;

fn key(c: Coord<f64>) -> (i64, i64) {
    ((c.x * QUANT).round() as i64, (c.y * QUANT).round() as i64)
}

/// Interpolation parameter of the level crossing between two straddling
/// samples. The caller guarantees a and b straddle the level, so a != b.
fn lerp(a: f32, b: f32, level: f32) -> f64 {
    f64::from((level - a) / (b - a))
}

fn emit_cell_segments(
    grid: &ScalarGrid,
    x: usize,
    y: usize,
    level: f32,
    out: &mut Vec<Segment>,
) {
    let tl = grid.get(y, x);
    let tr = grid.get(y, x + 1);
    let br = grid.get(y + 1, x + 1);
    let bl = grid.get(y + 1, x);

    let mut case = 0u8;
    if tl >= level {
        case |= 8;
    }
    if tr >= level {
        case |= 4;
    }
    if br >= level {
        case |= 2;
    }
    if bl >= level {
        case |= 1;
    }
    if case == 0 || case == 15 {
        return;
    }

    let (xf, yf) = (x as f64, y as f64);
    let top = || Coord {
        x: xf + lerp(tl, tr, level),
        y: yf,
    };
    let bottom = || Coord {
        x: xf + lerp(bl, br, level),
        y: yf + 1.0,
    };
    let left = || Coord {
        x: xf,
        y: yf + lerp(tl, bl, level),
    };
    let right = || Coord {
        x: xf + 1.0,
        y: yf + lerp(tr, br, level),
    };

    let mut push = |from: Coord<f64>, to: Coord<f64>| {
        if key(from) != key(to) {
            out.push(Segment { from, to });
        }
    };

    match case {
        8 => push(left(), top()),
        4 => push(top(), right()),
        2 => push(right(), bottom()),
        1 => push(bottom(), left()),
        12 => push(left(), right()),
        3 => push(right(), left()),
        9 => push(bottom(), top()),
        6 => push(top(), bottom()),
        14 => push(left(), bottom()),
        13 => push(bottom(), right()),
        11 => push(right(), top()),
        7 => push(top(), left()),
        10 => {
            // saddle, top-left and bottom-right inside
            if (tl + tr + br + bl) / 4.0 >= level {
                push(left(), bottom());
                push(right(), top());
            } else {
                push(left(), top());
                push(right(), bottom());
            }
        }
        5 => {
            // saddle, top-right and bottom-left inside
            if (tl + tr + br + bl) / 4.0 >= level {
                push(top(), left());
                push(bottom(), right());
            } else {
                push(top(), right());
                push(bottom(), left());
            }
        }
        _ => unreachable!("cell case is a 4-bit value"),
    }
}

/// Stitches oriented segments into polylines by matching endpoints.
fn chain_segments(segments: &[Segment]) -> Vec<LineString<f64>> {
    let mut start_of: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, s) in segments.iter().enumerate() {
        start_of.entry(key(s.from)).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut lines = Vec::new();

    for i in 0..segments.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut coords = vec![segments[i].from, segments[i].to];
        let first = key(segments[i].from);
        let mut cursor = key(segments[i].to);

        while cursor != first {
            let next = start_of
                .get(&cursor)
                .and_then(|ids| ids.iter().copied().find(|&j| !used[j]));
            match next {
                Some(j) => {
                    used[j] = true;
                    coords.push(segments[j].to);
                    cursor = key(segments[j].to);
                }
                // open component; the extractor closes these
                None => break,
            }
        }
        lines.push(LineString::new(coords));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridTransform;

    fn index_grid(rows: usize, cols: usize, values: Vec<f32>) -> ScalarGrid {
        ScalarGrid::new(
            rows,
            cols,
            values,
            GridTransform {
                origin_x: 0.0,
                origin_y: 0.0,
                x_res: 1.0,
                y_res: 1.0,
            },
            String::new(),
        )
    }

    fn shoelace(ring: &LineString<f64>) -> f64 {
        let pts = &ring.0;
        let mut sum = 0.0;
        for w in pts.windows(2) {
            sum += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        (sum / 2.0).abs()
    }

    #[test]
    fn test_single_cell_yields_diamond() {
        // lone inside sample in the middle of a 3x3 lattice
        let grid = index_grid(
            3,
            3,
            vec![
                0.0, 0.0, 0.0, //
                0.0, 50.0, 0.0, //
                0.0, 0.0, 0.0, //
            ],
        );
        let lines = MarchingSquares.trace(&grid, 25.0);
        assert_eq!(lines.len(), 1);
        let ring = &lines[0];
        assert!(ring.is_closed());
        // crossing at the midpoint of each lattice edge around (1, 1)
        assert_eq!(ring.0.len(), 5);
        assert!((shoelace(ring) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_two_blobs_yield_two_components() {
        let grid = index_grid(
            3,
            5,
            vec![
                0.0, 0.0, 0.0, 0.0, 0.0, //
                0.0, 50.0, 0.0, 50.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, //
            ],
        );
        let lines = MarchingSquares.trace(&grid, 25.0);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.is_closed()));
    }

    #[test]
    fn test_interpolation_is_subpixel() {
        // 10 -> 40 straddles level 25 at t = 0.5; 10 -> 70 at t = 0.25
        assert_eq!(lerp(10.0, 40.0, 25.0), 0.5);
        assert_eq!(lerp(10.0, 70.0, 25.0), 0.25);
        assert_eq!(lerp(70.0, 10.0, 25.0), 0.75);
    }

    #[test]
    fn test_degenerate_lattice_is_empty() {
        let grid = index_grid(1, 3, vec![0.0, 50.0, 0.0]);
        assert!(MarchingSquares.trace(&grid, 25.0).is_empty());
    }

    #[test]
    fn test_shared_edges_produce_watertight_chains() {
        // 2x2 inside block: a single closed octagon, no broken chains
        let grid = index_grid(
            4,
            4,
            vec![
                0.0, 0.0, 0.0, 0.0, //
                0.0, 50.0, 50.0, 0.0, //
                0.0, 50.0, 50.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, //
            ],
        );
        let lines = MarchingSquares.trace(&grid, 25.0);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].is_closed());
        // 4 edge crossings + 4 chamfer crossings, plus the closing point
        assert_eq!(lines[0].0.len(), 9);
    }
}
