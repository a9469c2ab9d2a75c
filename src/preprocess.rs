//! Raster cleaning ahead of contour extraction.
//!
//! All steps are pure grid-to-grid transforms; an all-zero result is the
//! valid "no land detected in tile" terminal state, not an error.

use tracing::debug;

use crate::grid::ScalarGrid;

/// Knobs for [`clean`].
///
/// Thresholds are calibration inputs supplied per acquisition epoch and are
/// never hard-coded by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanParams {
    /// Cells at or below this value become background.
    pub extract_threshold: f32,
    /// Odd side length of the local-maximum window.
    pub denoise_window: usize,
    /// Cells whose window maximum stays below this value are noise.
    pub denoise_threshold: f32,
    /// Connected components smaller than this are removed.
    pub min_cluster_size: usize,
    /// Value written into filled holes.
    pub hole_fill_value: f32,
    /// Enclosed zero-regions larger than this stay open water.
    pub max_hole_cells: usize,
    /// Components whose member-value median stays below this are removed.
    pub median_threshold: f32,
}

/// Cleans a raw classification grid: threshold, denoise, size filter,
/// bounded hole fill, median rejection.
///
/// Idempotent as long as `hole_fill_value` itself survives every step,
/// i.e. cleaning an already-clean grid changes nothing.
pub fn clean(grid: &ScalarGrid, params: &CleanParams) -> ScalarGrid {
    let (rows, cols) = grid.shape();
    let mut values = grid.values.clone();

    // extraction: background at or below the threshold
    for v in values.iter_mut() {
        if *v <= params.extract_threshold {
            *v = 0.0;
        }
    }

    // isolated low-confidence cells with nothing significant nearby
    let local_max = window_max(&values, rows, cols, params.denoise_window);
    for (v, m) in values.iter_mut().zip(local_max.iter()) {
        if *m < params.denoise_threshold {
            *v = 0.0;
        }
    }

    drop_small_components(&mut values, rows, cols, params.min_cluster_size);
    fill_bounded_holes(
        &mut values,
        rows,
        cols,
        params.hole_fill_value,
        params.max_hole_cells,
    );
    drop_weak_components(&mut values, rows, cols, params.median_threshold);

    ScalarGrid::new(rows, cols, values, grid.transform, grid.crs.clone())
}

/// Square-window maximum filter, run as two separable passes.
fn window_max(values: &[f32], rows: usize, cols: usize, window: usize) -> Vec<f32> {
    let half = window / 2;

    let mut row_max = vec![f32::NEG_INFINITY; values.len()];
    for r in 0..rows {
        let base = r * cols;
        for c in 0..cols {
            let lo = c.saturating_sub(half);
            let hi = (c + half).min(cols - 1);
            let mut m = f32::NEG_INFINITY;
            for i in lo..=hi {
                m = m.max(values[base + i]);
            }
            row_max[base + c] = m;
        }
    }

    let mut out = vec![f32::NEG_INFINITY; values.len()];
    for c in 0..cols {
        for r in 0..rows {
            let lo = r.saturating_sub(half);
            let hi = (r + half).min(rows - 1);
            let mut m = f32::NEG_INFINITY;
            for i in lo..=hi {
                m = m.max(row_max[i * cols + c]);
            }
            out[r * cols + c] = m;
        }
    }
    out
}

/// 4-connected components of the cells selected by `in_set`, as lists of
/// flat cell indices.
fn connected_components<F>(rows: usize, cols: usize, in_set: F) -> Vec<Vec<usize>>
where
    F: Fn(usize) -> bool,
{
    let n = rows * cols;
    let mut seen = vec![false; n];
    let mut stack = Vec::new();
    let mut components = Vec::new();

    for start in 0..n {
        if seen[start] || !in_set(start) {
            continue;
        }
        seen[start] = true;
        stack.push(start);
        let mut members = Vec::new();
        while let Some(idx) = stack.pop() {
            members.push(idx);
            let r = idx / cols;
            let c = idx % cols;
            let mut visit = |nidx: usize| {
                if !seen[nidx] && in_set(nidx) {
                    seen[nidx] = true;
                    stack.push(nidx);
                }
            };
            if r > 0 {
                visit(idx - cols);
            }
            if r + 1 < rows {
                visit(idx + cols);
            }
            if c > 0 {
                visit(idx - 1);
            }
            if c + 1 < cols {
                visit(idx + 1);
            }
        }
        components.push(members);
    }
    components
}

fn drop_small_components(values: &mut [f32], rows: usize, cols: usize, min_cluster_size: usize) {
    let components = connected_components(rows, cols, |idx| values[idx] != 0.0);
    let mut dropped = 0usize;
    for members in &components {
        if members.len() < min_cluster_size {
            for &idx in members {
                values[idx] = 0.0;
            }
            dropped += 1;
        }
    }
    if dropped > 0 {
        debug!(
            "Removed {} cluster(s) below {} cells",
            dropped, min_cluster_size
        );
    }
}

/// Fills enclosed zero-regions of at most `max_hole_cells` cells.
///
/// A zero-region touching the grid border is connected to open water and is
/// never a hole; a larger enclosed region is assumed to be a real lagoon or
/// inlet rather than sensor noise and must not be filled.
fn fill_bounded_holes(
    values: &mut [f32],
    rows: usize,
    cols: usize,
    hole_fill_value: f32,
    max_hole_cells: usize,
) {
    let components = connected_components(rows, cols, |idx| values[idx] == 0.0);
    let mut filled = 0usize;
    for members in &components {
        let touches_border = members.iter().any(|&idx| {
            let r = idx / cols;
            let c = idx % cols;
            r == 0 || r + 1 == rows || c == 0 || c + 1 == cols
        });
        if touches_border || members.len() > max_hole_cells {
            continue;
        }
        for &idx in members {
            values[idx] = hole_fill_value;
        }
        filled += 1;
    }
    if filled > 0 {
        debug!("Filled {} enclosed hole(s)", filled);
    }
}

fn drop_weak_components(values: &mut [f32], rows: usize, cols: usize, median_threshold: f32) {
    let components = connected_components(rows, cols, |idx| values[idx] != 0.0);
    let mut dropped = 0usize;
    for members in &components {
        let mut sample: Vec<f32> = members.iter().map(|&idx| values[idx]).collect();
        if median(&mut sample) < median_threshold {
            for &idx in members {
                values[idx] = 0.0;
            }
            dropped += 1;
        }
    }
    if dropped > 0 {
        debug!("Removed {} weak cluster(s)", dropped);
    }
}

fn median(sample: &mut [f32]) -> f32 {
    sample.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sample.len();
    if n % 2 == 1 {
        sample[n / 2]
    } else {
        (sample[n / 2 - 1] + sample[n / 2]) / 2.0
    }
}
