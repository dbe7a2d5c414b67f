//! Raster data structures and the pixel access contract

mod access;
mod band;
mod factory;
mod geotransform;
mod grid;

pub use access::{RasterRead, RasterWrite};
pub use band::{Band, DataType};
pub use factory::{MemDriver, OutputRasterSpec, RasterDriver, RasterFactory, RasterInfo};
pub use geotransform::GeoTransform;
pub use grid::Raster;
