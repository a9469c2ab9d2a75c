//! Region validation against the authoritative reference boundary.

use std::cmp::Ordering;

use geo::{Contains, GeodesicArea, InteriorPoint, Intersects, MultiPolygon, Polygon};
use tracing::{debug, warn};

/// How a candidate polygon must relate to the containment boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectParams {
    /// `true`: the representative interior point must lie within the
    /// boundary. `false`: any intersection with the boundary is enough.
    pub center_point_required: bool,
}

/// A validated polygon with provenance and geodesic attributes.
#[derive(Debug, Clone)]
pub struct Region {
    pub polygon: Polygon<f64>,
    /// Source tile identifier.
    pub tile_id: String,
    /// Ellipsoidal area in square kilometers.
    pub geo_area_km2: f64,
    /// Ellipsoidal perimeter in kilometers.
    pub geo_length_km: f64,
}

/// Validates candidates against the containment boundary and keeps the
/// dominant region for the tile.
///
/// Multiple valid fragments from one tile are assumed to be a single true
/// landmass split by the buffer round-trip, so only the fragment with the
/// largest geodesic area is retained; the rest is residual noise. An empty
/// result means the tile contributes nothing to the country coastline.
pub fn select(
    candidates: Vec<Polygon<f64>>,
    boundary: &MultiPolygon<f64>,
    params: &SelectParams,
    tile_id: &str,
) -> Vec<Region> {
    let mut valid: Vec<(f64, Polygon<f64>)> = Vec::new();

    for polygon in candidates {
        let inside = if params.center_point_required {
            match polygon.interior_point() {
                Some(point) => boundary.contains(&point),
                None => {
                    warn!("Tile {}: candidate without interior point dropped", tile_id);
                    false
                }
            }
        } else {
            polygon.intersects(boundary)
        };

        if inside {
            let area = polygon.geodesic_area_unsigned();
            valid.push((area, polygon));
        }
    }

    if valid.is_empty() {
        return Vec::new();
    }

    valid.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    if valid.len() > 1 {
        debug!(
            "Tile {}: {} valid fragments, keeping the largest",
            tile_id,
            valid.len()
        );
    }

    let (area, polygon) = valid.swap_remove(0);
    let perimeter = polygon.geodesic_perimeter();
    vec![Region {
        polygon,
        tile_id: tile_id.to_string(),
        geo_area_km2: area / 1_000_000.0,
        geo_length_km: perimeter / 1_000.0,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn boundary() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]
    }

    fn params() -> SelectParams {
        SelectParams {
            center_point_required: true,
        }
    }

    #[test]
    fn test_representative_point_must_be_inside() {
        let inside = square(0.4, 0.4, 0.1);
        let outside = square(5.0, 5.0, 0.1);
        let regions = select(vec![inside, outside], &boundary(), &params(), "AA_r2c3");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].tile_id, "AA_r2c3");

        let probe = regions[0].polygon.interior_point().unwrap();
        assert!(boundary().contains(&probe));
    }

    #[test]
    fn test_largest_fragment_wins() {
        // ~11 km2 vs ~25 km2 near the equator
        let small = square(0.1, 0.1, 0.03);
        let large = square(0.5, 0.5, 0.045);
        let regions = select(vec![small, large], &boundary(), &params(), "AA_r0c0");
        assert_eq!(regions.len(), 1);
        assert!(
            regions[0].geo_area_km2 > 20.0,
            "kept the smaller fragment: {} km2",
            regions[0].geo_area_km2
        );
    }

    #[test]
    fn test_intersection_mode() {
        // straddles the boundary edge with its center outside
        let straddling = square(-0.08, 0.4, 0.1);
        let strict = select(
            vec![straddling.clone()],
            &boundary(),
            &params(),
            "AA_r1c0",
        );
        assert!(strict.is_empty());

        let relaxed = select(
            vec![straddling],
            &boundary(),
            &SelectParams {
                center_point_required: false,
            },
            "AA_r1c0",
        );
        assert_eq!(relaxed.len(), 1);
    }

    #[test]
    fn test_no_valid_polygons_is_not_an_error() {
        let regions = select(vec![square(5.0, 5.0, 0.1)], &boundary(), &params(), "AA_r9c9");
        assert!(regions.is_empty());
    }

    #[test]
    fn test_geodesic_attributes_are_plausible() {
        // 0.045 deg square at the equator: about 5 km a side
        let regions = select(vec![square(0.5, 0.5, 0.045)], &boundary(), &params(), "AA_r0c0");
        let region = &regions[0];
        assert!(region.geo_area_km2 > 20.0 && region.geo_area_km2 < 30.0);
        assert!(region.geo_length_km > 18.0 && region.geo_length_km < 22.0);
    }
}
