//! # Terraclass Core
//!
//! Core types and contracts shared by the terraclass algorithms.
//!
//! This crate provides:
//! - `Raster`: multi-band raster grid with per-band no-data and data type
//! - `RasterRead` / `RasterWrite`: the pixel access contract algorithms consume
//! - `RasterFactory`: explicit registry of drivers that create output rasters
//! - Polygon pixel extraction (`vector`)
//! - `Progress`: step reporting and cancellation polling
//! - Algorithm traits for consistent API

pub mod error;
pub mod progress;
pub mod raster;
pub mod vector;

pub use error::{Error, Result};
pub use progress::{Progress, TaskProgress};
pub use raster::{
    Band, DataType, GeoTransform, MemDriver, OutputRasterSpec, Raster, RasterDriver,
    RasterFactory, RasterInfo, RasterRead, RasterWrite,
};
pub use vector::{pixel_window_polygon, polygon_area, values_in_polygon, PolygonPixels};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::progress::{Progress, TaskProgress};
    pub use crate::raster::{
        DataType, GeoTransform, OutputRasterSpec, Raster, RasterFactory, RasterInfo, RasterRead,
        RasterWrite,
    };
    pub use crate::Algorithm;
}

/// Core trait for whole-raster algorithms.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
