//! Boundary extraction: padding, tracing, closure, offset correction.

use geo::{Coord, LineString};
use tracing::debug;

use crate::grid::ScalarGrid;
use crate::trace::ContourTracer;

/// One traced iso-line component in world coordinates.
pub type Contour = LineString<f64>;

/// Extracts closed boundary contours from a cleaned grid at `iso_level`.
///
/// The grid is zero-padded by one cell before tracing so that land touching
/// the tile edge produces a closed ring instead of a clipped open line.
/// Open components the tracer still returns (floating precision, degenerate
/// tangency) are closed by appending their first point: sub-pixel
/// boundaries are real and must not be lost to an ambiguous trace.
pub fn extract(grid: &ScalarGrid, iso_level: f32, tracer: &dyn ContourTracer) -> Vec<Contour> {
    if grid.is_blank() {
        return Vec::new();
    }

    let padded = grid.padded();
    let raw = tracer.trace(&padded, iso_level);

    let transform = grid.transform;
    let mut closed = 0usize;
    let contours: Vec<Contour> = raw
        .into_iter()
        .filter(|component| component.0.len() >= 2)
        .map(|mut component| {
            if !component.is_closed() {
                component.close();
                closed += 1;
            }
            // Padded indices through the parent transform, then half a
            // signed cell back per axis: one constant shift undoes both
            // the pad and the tracer's cell-center convention.
            let coords = component
                .0
                .iter()
                .map(|c| {
                    let world = transform.apply(c.x, c.y);
                    Coord {
                        x: world.x - transform.x_res / 2.0,
                        y: world.y - transform.y_res / 2.0,
                    }
                })
                .collect();
            LineString::new(coords)
        })
        .collect();

    if closed > 0 {
        debug!("Closed {} open contour component(s)", closed);
    }
    contours
}
