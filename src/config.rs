//! Explicit pipeline configuration.
//!
//! Everything the stages need travels in this struct, passed by value into
//! the pipeline; there is no ambient global state. Thresholds are
//! calibrated per acquisition epoch and supplied by the caller.

use crate::error::{Error, Result};
use crate::preprocess::CleanParams;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub clean: CleanParams,
    /// Scalar level the boundary is traced at.
    pub iso_level: f32,
    /// Outward buffer distance of the repair round-trip, in CRS units.
    pub positive_buffer: f64,
    /// Inward buffer distance of the repair round-trip, in CRS units.
    pub negative_buffer: f64,
    /// Containment predicate for region selection.
    pub center_point_required: bool,
    /// Smoothing window span in CRS units; 0 disables smoothing.
    pub smoothing_tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clean: CleanParams {
                extract_threshold: 1.0,
                denoise_window: 31,
                denoise_threshold: 5.0,
                min_cluster_size: 4,
                hole_fill_value: 50.0,
                max_hole_cells: 500,
                median_threshold: 5.0,
            },
            iso_level: 25.0,
            positive_buffer: 40.0,
            negative_buffer: 35.0,
            center_point_required: true,
            smoothing_tolerance: 0.0,
        }
    }
}

impl PipelineConfig {
    /// Startup validation. A bad configuration invalidates the whole run
    /// and is never recoverable per-tile.
    pub fn validate(&self) -> Result<()> {
        let clean = &self.clean;
        if clean.denoise_window % 2 == 0 {
            return Err(Error::Config(format!(
                "denoise_window must be odd, got {}",
                clean.denoise_window
            )));
        }
        for (name, value) in [
            ("extract_threshold", clean.extract_threshold),
            ("denoise_threshold", clean.denoise_threshold),
            ("hole_fill_value", clean.hole_fill_value),
            ("median_threshold", clean.median_threshold),
            ("iso_level", self.iso_level),
        ] {
            if !value.is_finite() {
                return Err(Error::Config(format!("{} must be finite", name)));
            }
        }
        if self.iso_level <= 0.0 {
            return Err(Error::Config(format!(
                "iso_level must be positive, got {}",
                self.iso_level
            )));
        }
        if !self.positive_buffer.is_finite()
            || !self.negative_buffer.is_finite()
            || self.positive_buffer < 0.0
            || self.negative_buffer < 0.0
        {
            return Err(Error::Config(
                "buffer distances must be finite and non-negative".to_string(),
            ));
        }
        if self.positive_buffer < self.negative_buffer {
            return Err(Error::Config(format!(
                "positive_buffer ({}) must not be smaller than negative_buffer ({})",
                self.positive_buffer, self.negative_buffer
            )));
        }
        if !self.smoothing_tolerance.is_finite() || self.smoothing_tolerance < 0.0 {
            return Err(Error::Config(
                "smoothing_tolerance must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
