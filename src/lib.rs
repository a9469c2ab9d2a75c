pub mod config;
pub mod error;
pub mod extract;
pub mod grid;
pub mod io;
pub mod merge;
pub mod pipeline;
pub mod preprocess;
pub mod repair;
pub mod select;
pub mod trace;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use grid::{GridTransform, ScalarGrid};
pub use merge::CountryCoastline;
pub use preprocess::CleanParams;
pub use select::Region;
pub use trace::{ContourTracer, MarchingSquares};
