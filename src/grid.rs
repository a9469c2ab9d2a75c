use geo::Coord;

/// Affine georeferencing without rotation: origin corner plus signed cell
/// sizes. Rotated rasters are rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    /// X coordinate of the outer corner of the first (top-left) cell.
    pub origin_x: f64,
    /// Y coordinate of the outer corner of the first (top-left) cell.
    pub origin_y: f64,
    /// Cell size along X. Positive for west-to-east grids.
    pub x_res: f64,
    /// Cell size along Y. Negative for north-up grids.
    pub y_res: f64,
}

impl GridTransform {
    /// Builds from a GDAL 6-element geo transform. Returns `None` when the
    /// transform carries rotation terms.
    pub fn from_gdal(gt: &[f64; 6]) -> Option<Self> {
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return None;
        }
        Some(Self {
            origin_x: gt[0],
            origin_y: gt[3],
            x_res: gt[1],
            y_res: gt[5],
        })
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [self.origin_x, self.x_res, 0.0, self.origin_y, 0.0, self.y_res]
    }

    /// Maps fractional (column, row) grid indices to world coordinates.
    pub fn apply(&self, col: f64, row: f64) -> Coord<f64> {
        Coord {
            x: self.origin_x + col * self.x_res,
            y: self.origin_y + row * self.y_res,
        }
    }
}

/// A single-band scalar raster held entirely in memory.
///
/// Values are stored row-major, top row first. Pipeline stages never mutate
/// a grid in place; each stage produces a new grid, so no state is shared
/// across stage boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarGrid {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f32>,
    pub transform: GridTransform,
    pub crs: String,
}

impl ScalarGrid {
    pub fn new(
        rows: usize,
        cols: usize,
        values: Vec<f32>,
        transform: GridTransform,
        crs: String,
    ) -> Self {
        assert_eq!(
            values.len(),
            rows * cols,
            "value count must match grid shape"
        );
        Self {
            rows,
            cols,
            values,
            transform,
            crs,
        }
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.cols + col]
    }

    /// True when no cell holds a non-zero value ("no land detected").
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Copy of this grid with a one-cell ring of zeros on every side.
    ///
    /// The parent transform is kept unchanged on purpose: boundary
    /// extraction corrects the pad and the tracer's cell-center convention
    /// together with a single half-cell shift.
    pub fn padded(&self) -> ScalarGrid {
        let rows = self.rows + 2;
        let cols = self.cols + 2;
        let mut values = vec![0.0f32; rows * cols];
        for r in 0..self.rows {
            let src = r * self.cols;
            let dst = (r + 1) * cols + 1;
            values[dst..dst + self.cols].copy_from_slice(&self.values[src..src + self.cols]);
        }
        ScalarGrid::new(rows, cols, values, self.transform, self.crs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_transform() -> GridTransform {
        GridTransform {
            origin_x: 0.0,
            origin_y: 0.0,
            x_res: 1.0,
            y_res: -1.0,
        }
    }

    #[test]
    fn test_rotated_transform_rejected() {
        let gt = [135.0, 0.001, 0.00002, 35.0, 0.0, -0.001];
        assert!(GridTransform::from_gdal(&gt).is_none());

        let gt = [135.0, 0.001, 0.0, 35.0, 0.0, -0.001];
        let transform = GridTransform::from_gdal(&gt).unwrap();
        assert_eq!(transform.origin_x, 135.0);
        assert_eq!(transform.y_res, -0.001);
        assert_eq!(transform.to_gdal(), gt);
    }

    #[test]
    fn test_apply_maps_indices() {
        let transform = GridTransform {
            origin_x: 10.0,
            origin_y: 20.0,
            x_res: 0.5,
            y_res: -0.5,
        };
        let world = transform.apply(2.0, 4.0);
        assert_eq!(world.x, 11.0);
        assert_eq!(world.y, 18.0);
    }

    #[test]
    fn test_padded_keeps_values_and_transform() {
        let grid = ScalarGrid::new(
            2,
            3,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            unit_transform(),
            "EPSG:4326".to_string(),
        );
        let padded = grid.padded();
        assert_eq!(padded.shape(), (4, 5));
        assert_eq!(padded.transform, grid.transform);
        assert_eq!(padded.get(0, 0), 0.0);
        assert_eq!(padded.get(1, 1), 1.0);
        assert_eq!(padded.get(2, 3), 6.0);
        assert_eq!(padded.get(3, 4), 0.0);
    }

    #[test]
    fn test_blank_grid() {
        let grid = ScalarGrid::new(2, 2, vec![0.0; 4], unit_transform(), String::new());
        assert!(grid.is_blank());
        let grid = ScalarGrid::new(2, 2, vec![0.0, 0.1, 0.0, 0.0], unit_transform(), String::new());
        assert!(!grid.is_blank());
    }
}
