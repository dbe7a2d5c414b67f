//! Supervised raster classification
//!
//! Three interchangeable strategies that label every pixel of a raster:
//! - **ED**: nearest class mean by squared Euclidean distance
//! - **MAP**: Gaussian maximum a posteriori discriminant with optional
//!   priori estimation from the raster
//! - **ISOSeg**: region merging over polygon statistics, painted back by
//!   polygon membership
//!
//! [`Classifier`] wraps the strategies behind a tagged parameter enum and
//! creates the output raster through a [`RasterFactory`](terraclass_core::RasterFactory).

mod classifier;
mod ed;
mod isoseg;
mod map;
mod samples;
mod strategy;

pub use classifier::{Classifier, ClassifierInput, ClassifierParams, ClassifierStrategyKind};
pub use ed::{EdParams, EuclideanDistanceStrategy};
pub use isoseg::{
    chi_square_threshold, DistanceType, IsoSegParams, IsoSegReport, IsoSegStrategy,
};
pub use map::{MapParams, MaximumAPosterioriStrategy};
pub use samples::{
    class_means, class_statistics, covariance_matrix, mean_vector, ClassEntry, ClassId,
    ClassSamples, ClassStatistics, Sample,
};
pub use strategy::ClassifierStrategy;

use terraclass_core::{Error, RasterRead, Result};

/// Check that `bands` is non-empty and every index exists in `raster`.
pub(crate) fn check_bands<R: RasterRead + ?Sized>(raster: &R, bands: &[usize]) -> Result<()> {
    if bands.is_empty() {
        return Err(Error::invalid_parameter("bands", "[]", "at least one band is required"));
    }
    if let Some(&bad) = bands.iter().find(|&&b| b >= raster.band_count()) {
        return Err(Error::invalid_parameter(
            "bands",
            bad,
            format!("raster has {} bands", raster.band_count()),
        ));
    }
    Ok(())
}
