use thiserror::Error;

/// Failures that invalidate a whole run or a single input unit.
///
/// Empty stage results (no land, no contours, no valid regions) are not
/// errors; stages return empty collections and downstream code degrades to
/// "no output for this unit".
#[derive(Debug, Error)]
pub enum Error {
    /// Bad parameters detected at startup. Not recoverable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The input raster cannot be used as a pipeline grid.
    #[error("unsupported raster {path}: {reason}")]
    UnsupportedRaster { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
