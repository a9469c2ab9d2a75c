//! Topology repair: rings to valid polygons, then a vector open-then-close.
//!
//! The buffer round-trip (inflate, merge, deflate) removes slivers,
//! single-cell notches and near-miss gaps left by raster quantization while
//! approximately preserving the boundary location. An asymmetric pair
//! (inflate further than the deflate) leaves a net outward bias that favors
//! over-inclusion of ambiguous coastal pixels.

use std::cmp::Ordering;

use geo::orient::{Direction, Orient};
use geo::{Area, Contains, InteriorPoint, LineString, MultiPolygon, Polygon};
use tracing::{debug, warn};

use crate::extract::Contour;

/// Rebuilds valid polygons from closed contours and heals them with a
/// buffer round-trip. Disjoint land masses always come back as separate
/// polygons; geometry that collapses to zero area is dropped.
pub fn repair(
    contours: &[Contour],
    positive_buffer: f64,
    negative_buffer: f64,
) -> Vec<Polygon<f64>> {
    let candidates = polygonize(contours);
    if candidates.is_empty() {
        return Vec::new();
    }

    let assembled = MultiPolygon::new(candidates);
    let healed = buffer_round_trip(&assembled, positive_buffer, negative_buffer);

    // disjoint components stay separate records, never one multi-part blob
    healed
        .0
        .into_iter()
        .filter(|polygon| {
            let kept = polygon.unsigned_area() > 0.0;
            if !kept {
                warn!("Dropping polygon collapsed by the buffer round-trip");
            }
            kept
        })
        .collect()
}

/// Planar polygon construction from closed rings.
///
/// Rings nested at even depth become exterior rings; rings at odd depth
/// become holes of their innermost enclosing exterior. Degenerate rings
/// (open, under 4 points, non-finite or zero-area) are dropped with a
/// warning rather than aborting the tile.
pub fn polygonize(contours: &[Contour]) -> Vec<Polygon<f64>> {
    let mut rings: Vec<(f64, LineString<f64>)> = Vec::new();
    for contour in contours {
        if contour.0.len() < 4 || !contour.is_closed() {
            warn!("Dropping degenerate contour ({} points)", contour.0.len());
            continue;
        }
        if contour.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            warn!("Dropping contour with non-finite coordinates");
            continue;
        }
        let area = Polygon::new(contour.clone(), vec![]).unsigned_area();
        if area == 0.0 {
            debug!("Dropping zero-area contour");
            continue;
        }
        rings.push((area, contour.clone()));
    }

    // largest first so enclosing rings precede the rings they contain
    rings.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let shells: Vec<Polygon<f64>> = rings
        .iter()
        .map(|(_, ring)| Polygon::new(ring.clone(), vec![]))
        .collect();

    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    // for each ring, the polygon index it became the exterior of
    let mut owner: Vec<Option<usize>> = Vec::with_capacity(rings.len());

    for (i, (_, ring)) in rings.iter().enumerate() {
        let probe = match shells[i].interior_point() {
            Some(p) => p,
            None => {
                owner.push(None);
                continue;
            }
        };

        let mut depth = 0usize;
        let mut innermost: Option<usize> = None;
        // scan smaller enclosing rings first: the first hit is innermost
        for j in (0..i).rev() {
            if shells[j].contains(&probe) {
                depth += 1;
                if innermost.is_none() {
                    innermost = Some(j);
                }
            }
        }

        if depth % 2 == 0 {
            owner.push(Some(polygons.len()));
            polygons.push(Polygon::new(ring.clone(), vec![]));
        } else {
            owner.push(None);
            match innermost.and_then(|j| owner[j]) {
                Some(k) => polygons[k].interiors_push(ring.clone()),
                None => warn!("Dropping hole ring without an enclosing exterior"),
            }
        }
    }

    polygons
        .into_iter()
        .map(|p| p.orient(Direction::Default))
        .collect()
}

/// Expand by `grow`, merge, contract by `shrink`, both with rounded joins.
/// `grow >= shrink` is enforced by configuration validation.
fn buffer_round_trip(shapes: &MultiPolygon<f64>, grow: f64, shrink: f64) -> MultiPolygon<f64> {
    if grow <= 0.0 && shrink <= 0.0 {
        return shapes.clone();
    }
    let inflated = geo_buffer::buffer_multi_polygon_rounded(shapes, grow);
    if shrink <= 0.0 {
        return inflated;
    }
    geo_buffer::buffer_multi_polygon_rounded(&inflated, -shrink)
}
