//! Cross-tile dissolve, smoothing and final geodesic attribution.

use geo::{BooleanOps, Coord, GeodesicArea, LineString, MultiPolygon, Polygon};
use tracing::{info, warn};

use crate::repair;
use crate::select::Region;

/// The dissolved, smoothed union of all regions for one country/year.
/// Terminal artifact of the pipeline; written once and never mutated.
#[derive(Debug, Clone)]
pub struct CountryCoastline {
    /// Country/year identifier carried into the output `UID` field.
    pub uid: String,
    pub geometry: MultiPolygon<f64>,
    /// Ellipsoidal area in square kilometers, measured after smoothing.
    pub geo_area_km2: f64,
    /// Ellipsoidal perimeter in kilometers, measured after smoothing.
    pub geo_length_km: f64,
}

impl CountryCoastline {
    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }

    fn empty(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            geometry: MultiPolygon::new(Vec::new()),
            geo_area_km2: 0.0,
            geo_length_km: 0.0,
        }
    }
}

/// Dissolves all regions of a country/year into one coastline geometry and
/// smooths away the raster staircase.
///
/// Overlapping tile buffers are resolved by geometric union, not by
/// concatenation, and the union's rings are re-polygonized before
/// smoothing so the smoother never sees self-intersecting input. The
/// reported area/length are computed on the smoothed result: the published
/// value is the measured value.
pub fn merge(uid: &str, regions: &[Region], smoothing_tolerance: f64) -> CountryCoastline {
    if regions.is_empty() {
        warn!("{}: no regions to merge, coastline is empty", uid);
        return CountryCoastline::empty(uid);
    }

    let mut dissolved = MultiPolygon::new(vec![regions[0].polygon.clone()]);
    for region in &regions[1..] {
        dissolved = dissolved.union(&MultiPolygon::new(vec![region.polygon.clone()]));
    }

    // ring round trip: polygons -> lines -> polygons
    let rings: Vec<LineString<f64>> = dissolved
        .0
        .iter()
        .flat_map(|p| {
            std::iter::once(p.exterior().clone()).chain(p.interiors().iter().cloned())
        })
        .collect();
    let rebuilt = repair::polygonize(&rings);

    let smoothed: Vec<Polygon<f64>> = rebuilt
        .into_iter()
        .filter_map(|polygon| {
            let exterior = smooth_closed_ring(polygon.exterior(), smoothing_tolerance);
            if exterior.0.len() < 4 {
                warn!("{}: exterior ring degenerated during smoothing", uid);
                return None;
            }
            let interiors: Vec<LineString<f64>> = polygon
                .interiors()
                .iter()
                .map(|ring| smooth_closed_ring(ring, smoothing_tolerance))
                .filter(|ring| ring.0.len() >= 4)
                .collect();
            Some(Polygon::new(exterior, interiors))
        })
        .collect();

    let geometry = MultiPolygon::new(smoothed);
    let geo_area_km2 = geometry.geodesic_area_unsigned() / 1_000_000.0;
    let geo_length_km = geometry.geodesic_perimeter() / 1_000.0;
    info!(
        "{}: merged {} region(s) into {} part(s), {:.3} km2",
        uid,
        regions.len(),
        geometry.0.len(),
        geo_area_km2
    );

    CountryCoastline {
        uid: uid.to_string(),
        geometry,
        geo_area_km2,
        geo_length_km,
    }
}

/// Moving-window average along a closed ring, window span `tolerance`
/// centred on each vertex, endpoints wrapping (closed endpoint policy).
///
/// A tolerance of zero, or one too small to reach a neighboring vertex,
/// returns the ring unchanged.
pub fn smooth_closed_ring(ring: &LineString<f64>, tolerance: f64) -> LineString<f64> {
    if tolerance <= 0.0 || ring.0.len() < 5 {
        return ring.clone();
    }
    let points = &ring.0[..ring.0.len() - 1];
    let n = points.len();
    let half = tolerance / 2.0;

    // chord length from vertex i to vertex i+1, wrapping
    let chord: Vec<f64> = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            (a.x - b.x).hypot(a.y - b.y)
        })
        .collect();

    let mut out: Vec<Coord<f64>> = Vec::with_capacity(n + 1);
    for i in 0..n {
        let mut sum_x = points[i].x;
        let mut sum_y = points[i].y;
        let mut count = 1.0;

        let mut travelled = 0.0;
        let mut j = i;
        for _ in 0..n - 1 {
            let prev = (j + n - 1) % n;
            travelled += chord[prev];
            if travelled > half || count >= n as f64 {
                break;
            }
            sum_x += points[prev].x;
            sum_y += points[prev].y;
            count += 1.0;
            j = prev;
        }

        travelled = 0.0;
        j = i;
        for _ in 0..n - 1 {
            travelled += chord[j];
            let next = (j + 1) % n;
            if travelled > half || count >= n as f64 {
                break;
            }
            sum_x += points[next].x;
            sum_y += points[next].y;
            count += 1.0;
            j = next;
        }

        out.push(Coord {
            x: sum_x / count,
            y: sum_y / count,
        });
    }

    let first = out[0];
    out.push(first);
    LineString::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area};

    fn region(polygon: Polygon<f64>, tile_id: &str) -> Region {
        let area = polygon.geodesic_area_unsigned();
        let perimeter = polygon.geodesic_perimeter();
        Region {
            polygon,
            tile_id: tile_id.to_string(),
            geo_area_km2: area / 1_000_000.0,
            geo_length_km: perimeter / 1_000.0,
        }
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

    #[test]
    fn test_empty_region_set_yields_empty_coastline() {
        let coastline = merge("AA_2020", &[], 0.0);
        assert!(coastline.is_empty());
        assert_eq!(coastline.geo_area_km2, 0.0);
        assert_eq!(coastline.uid, "AA_2020");
    }

    #[test]
    fn test_overlapping_tiles_dissolve_into_one_boundary() {
        let a = region(square(0.0, 0.0, 0.1), "AA_r0c0");
        let b = region(square(0.05, 0.0, 0.1), "AA_r0c1");
        let coastline = merge("AA_2020", &[a, b], 0.0);
        assert_eq!(coastline.geometry.0.len(), 1);

        // union, not concatenation: 0.15 x 0.1 deg, not 2 x 0.01 deg2
        let planar: f64 = coastline.geometry.unsigned_area();
        assert!((planar - 0.015).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_tiles_stay_multi_part() {
        let a = region(square(0.0, 0.0, 0.1), "AA_r0c0");
        let b = region(square(1.0, 0.0, 0.1), "AA_r5c0");
        let coastline = merge("AA_2020", &[a, b], 0.0);
        assert_eq!(coastline.geometry.0.len(), 2);
    }

    #[test]
    fn test_zero_tolerance_smoothing_is_identity() {
        let a = region(square(0.0, 0.0, 0.1), "AA_r0c0");
        let coastline = merge("AA_2020", &[a.clone()], 0.0);
        assert_eq!(coastline.geometry.0.len(), 1);
        let diff = (coastline.geo_area_km2 - a.geo_area_km2).abs();
        assert!(diff < 1e-9, "area drifted by {} km2", diff);
    }

    #[test]
    fn test_smoothing_relaxes_staircase() {
        // an 8-step staircase ring between (0,0) and (4,4)
        let mut coords = Vec::new();
        for i in 0..4 {
            coords.push(Coord {
                x: f64::from(i),
                y: f64::from(i),
            });
            coords.push(Coord {
                x: f64::from(i + 1),
                y: f64::from(i),
            });
        }
        coords.push(Coord { x: 4.0, y: 4.0 });
        coords.push(Coord { x: 0.0, y: 4.0 });
        coords.push(Coord { x: 0.0, y: 0.0 });
        let ring = LineString::new(coords);

        let smoothed = smooth_closed_ring(&ring, 2.0);
        assert!(smoothed.is_closed());
        assert_eq!(smoothed.0.len(), ring.0.len());

        let roughness = |ls: &LineString<f64>| -> f64 {
            ls.0.windows(2)
                .map(|w| (w[0].x - w[1].x).hypot(w[0].y - w[1].y))
                .sum()
        };
        assert!(roughness(&smoothed) < roughness(&ring));
    }

    #[test]
    fn test_small_tolerance_smoothing_is_noop() {
        let ring = square(0.0, 0.0, 10.0).exterior().clone();
        let smoothed = smooth_closed_ring(&ring, 0.5);
        assert_eq!(smoothed, ring);
    }
}
