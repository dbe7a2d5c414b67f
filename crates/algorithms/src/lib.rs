//! # Terraclass Algorithms
//!
//! Raster classification and feature extraction built on `terraclass-core`.
//!
//! ## Modules
//!
//! - **classification**: Euclidean distance, maximum a posteriori and ISOSeg
//!   strategies behind the `Classifier` facade
//! - **linalg**: determinant, inverse, pseudo-inverse and symmetric eigen
//!   decomposition of small dense matrices
//! - **skeleton**: binary skeleton extraction by gradient vector diffusion

pub mod classification;
pub mod linalg;
pub mod skeleton;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{
        Classifier, ClassifierInput, ClassifierParams, ClassifierStrategy, ClassSamples,
        DistanceType, EdParams, EuclideanDistanceStrategy, IsoSegParams, IsoSegStrategy,
        MapParams, MaximumAPosterioriStrategy,
    };
    pub use crate::skeleton::{Skeleton, SkeletonParams};
    pub use terraclass_core::prelude::*;
    pub use terraclass_parallel::ProcessingMode;
}
