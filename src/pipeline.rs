//! Stage composition: one tile through clean/extract/repair/select, and
//! the per-country fan-in.
//!
//! Every stage consumes immutable input and produces new output, so tiles
//! of the same country/year can run on independent worker threads; the
//! only synchronization point is the merge, which needs all tiles of a
//! unit. Re-running an aborted unit is safe: the stages are pure functions
//! keyed by (country, year, tile).

use geo::MultiPolygon;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::extract;
use crate::grid::ScalarGrid;
use crate::merge::{self, CountryCoastline};
use crate::preprocess;
use crate::repair;
use crate::select::{self, Region, SelectParams};
use crate::trace::ContourTracer;

/// Runs one raster tile through the reconstruction stages.
///
/// Empty results at any stage short-circuit to "tile contributes nothing",
/// which is a valid outcome and not an error.
pub fn process_tile(
    grid: &ScalarGrid,
    boundary: &MultiPolygon<f64>,
    config: &PipelineConfig,
    tracer: &dyn ContourTracer,
    tile_id: &str,
) -> Vec<Region> {
    let cleaned = preprocess::clean(grid, &config.clean);
    if cleaned.is_blank() {
        info!("Tile {}: no land detected", tile_id);
        return Vec::new();
    }

    let contours = extract::extract(&cleaned, config.iso_level, tracer);
    debug!("Tile {}: {} contour(s) traced", tile_id, contours.len());

    let polygons = repair::repair(&contours, config.positive_buffer, config.negative_buffer);
    debug!("Tile {}: {} candidate polygon(s)", tile_id, polygons.len());

    let regions = select::select(
        polygons,
        boundary,
        &SelectParams {
            center_point_required: config.center_point_required,
        },
        tile_id,
    );
    info!("Tile {}: {} region(s) selected", tile_id, regions.len());
    regions
}

/// Fan-in: dissolves the regions of all tiles of one country/year.
pub fn merge_country(uid: &str, regions: &[Region], config: &PipelineConfig) -> CountryCoastline {
    merge::merge(uid, regions, config.smoothing_tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridTransform;
    use crate::trace::MarchingSquares;
    use geo::polygon;

    fn tile_boundary() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 99.0, y: 9.0),
            (x: 101.0, y: 9.0),
            (x: 101.0, y: 11.0),
            (x: 99.0, y: 11.0),
            (x: 99.0, y: 9.0),
        ]])
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.clean.extract_threshold = 10.0;
        config.clean.denoise_window = 3;
        config.clean.min_cluster_size = 1;
        // grid-scale tile: buffers in degrees, not the metre calibration
        config.positive_buffer = 0.0;
        config.negative_buffer = 0.0;
        config
    }

    fn land_tile() -> ScalarGrid {
        let mut values = vec![0.0f32; 64];
        for r in 2..6 {
            for c in 2..6 {
                values[r * 8 + c] = 50.0;
            }
        }
        ScalarGrid::new(
            8,
            8,
            values,
            GridTransform {
                origin_x: 100.0,
                origin_y: 10.0,
                x_res: 0.01,
                y_res: -0.01,
            },
            "EPSG:4326".to_string(),
        )
    }

    #[test]
    fn test_tile_with_land_produces_one_region() {
        let regions = process_tile(
            &land_tile(),
            &tile_boundary(),
            &config(),
            &MarchingSquares,
            "AA_r0c0",
        );
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].tile_id, "AA_r0c0");
        assert!(regions[0].geo_area_km2 > 0.0);
    }

    #[test]
    fn test_water_only_tile_produces_nothing() {
        let grid = ScalarGrid::new(
            8,
            8,
            vec![2.0f32; 64],
            land_tile().transform,
            "EPSG:4326".to_string(),
        );
        let regions = process_tile(
            &grid,
            &tile_boundary(),
            &config(),
            &MarchingSquares,
            "AA_r0c1",
        );
        assert!(regions.is_empty());
    }

    #[test]
    fn test_foreign_land_is_rejected() {
        // boundary far away from the tile: detection leaks from a
        // neighboring country and must not survive selection
        let far_boundary = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);
        let regions = process_tile(
            &land_tile(),
            &far_boundary,
            &config(),
            &MarchingSquares,
            "AA_r0c0",
        );
        assert!(regions.is_empty());
    }

    #[test]
    fn test_merge_country_round_trip() {
        let config = config();
        let regions = process_tile(
            &land_tile(),
            &tile_boundary(),
            &config,
            &MarchingSquares,
            "AA_r0c0",
        );
        let coastline = merge_country("AA_2020", &regions, &config);
        assert!(!coastline.is_empty());
        let diff = (coastline.geo_area_km2 - regions[0].geo_area_km2).abs();
        assert!(diff < 1e-9);
    }
}
