//! Skeleton extraction by gradient vector diffusion
//!
//! Pipeline over one raster band:
//! 1. load the band (masked-out and no-data pixels become 0)
//! 2. 3x3 mean smoothing
//! 3. edge strength map
//! 4. unit gradient vector field of the smoothed data
//! 5. iterative vector diffusion
//! 6. skeleton strength blended with the inverted edge map
//! 7. threshold into a binary `U8` raster (255 = skeleton)

mod diffusion;
mod fields;

pub use diffusion::{diffuse, DiffusionReport, DiffusionSettings, DIFFUSION_MARGIN};
pub use fields::{
    edge_strength, gradient_field, load_band, skeleton_strength, smooth, VectorField,
};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use terraclass_core::progress::{pulse_and_check, start_stage};
use terraclass_core::{
    Algorithm, DataType, Error, OutputRasterSpec, Progress, Raster, RasterFactory, RasterInfo,
    RasterRead, RasterWrite, Result,
};
use terraclass_parallel::{Executor, ProcessingMode};

/// Pixels this close to the border are never marked as skeleton.
pub const OUTPUT_MARGIN: usize = 2;

/// Value written for skeleton pixels.
pub const SKELETON_VALUE: f64 = 255.0;

/// Parameters for skeleton extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonParams {
    /// Input band to skeletonize
    pub band: usize,
    /// Diffusion stops once an iteration changes no vector by this much (> 0)
    pub diffusion_threshold: f64,
    /// Weight of the neighbour average in each diffusion update, in (0, 1]
    pub diffusion_regularization: f64,
    /// Diffusion iteration cap, 0 for none
    pub diffusion_max_iterations: usize,
    /// Blended strength above which a pixel is skeleton, in [0, 1]
    pub skeleton_threshold: f64,
    pub processing: ProcessingMode,
    pub output: OutputRasterSpec,
}

impl Default for SkeletonParams {
    fn default() -> Self {
        Self {
            band: 0,
            diffusion_threshold: 0.01,
            diffusion_regularization: 0.5,
            diffusion_max_iterations: 100,
            skeleton_threshold: 0.75,
            processing: ProcessingMode::Parallel,
            output: OutputRasterSpec::default(),
        }
    }
}

impl SkeletonParams {
    fn validate(&self) -> Result<()> {
        if !(self.diffusion_threshold > 0.0) {
            return Err(Error::invalid_parameter(
                "diffusion_threshold",
                self.diffusion_threshold,
                "must be > 0",
            ));
        }
        let r = self.diffusion_regularization;
        if !(r > 0.0 && r <= 1.0) {
            return Err(Error::invalid_parameter(
                "diffusion_regularization",
                r,
                "must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.skeleton_threshold) {
            return Err(Error::invalid_parameter(
                "skeleton_threshold",
                self.skeleton_threshold,
                "must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Intermediate maps of one run, for inspection.
#[derive(Debug, Clone)]
pub struct SkeletonMaps {
    pub edges: Array2<f64>,
    pub field: VectorField,
    /// `(strength + (1 - edges)) / 2`
    pub blended: Array2<f64>,
    pub diffusion: DiffusionReport,
}

/// Skeleton extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct Skeleton;

impl Skeleton {
    /// Run steps 1 to 6 of the pipeline.
    pub fn compute_maps<R, M>(
        &self,
        input: &R,
        mask: Option<&M>,
        params: &SkeletonParams,
        progress: Option<&dyn Progress>,
    ) -> Result<SkeletonMaps>
    where
        R: RasterRead + ?Sized,
        M: RasterRead + ?Sized,
    {
        params.validate()?;
        let executor = Executor::new(params.processing)
            .map_err(|e| Error::Algorithm(e.to_string()))?;

        start_stage(progress, "Preparing skeleton fields", 1);
        let data = load_band(input, params.band, mask)?;
        let smoothed = smooth(&data);
        let edges = edge_strength(&smoothed);
        let mut field = gradient_field(&smoothed);
        pulse_and_check(progress)?;

        let settings = DiffusionSettings {
            threshold: params.diffusion_threshold,
            regularization: params.diffusion_regularization,
            max_iterations: params.diffusion_max_iterations,
        };
        let diffusion = diffuse(&mut field, &settings, &executor, progress)?;

        let strength = skeleton_strength(&field);
        let blended = (&strength + &edges.mapv(|e| 1.0 - e)) / 2.0;

        Ok(SkeletonMaps {
            edges,
            field,
            blended,
            diffusion,
        })
    }

    /// Extract the skeleton of `input` into a raster created by `factory`.
    ///
    /// The output has one `U8` band without no-data and the input's
    /// transform; skeleton pixels are 255, all others 0.
    pub fn extract<R, M>(
        &self,
        input: &R,
        mask: Option<&M>,
        params: &SkeletonParams,
        factory: &RasterFactory,
        progress: Option<&dyn Progress>,
    ) -> Result<Box<dyn RasterWrite + Send>>
    where
        R: RasterRead + ?Sized,
        M: RasterRead + ?Sized,
    {
        let maps = self.compute_maps(input, mask, params, progress)?;

        let (rows, cols) = input.shape();
        let info = RasterInfo::new(rows, cols, 1, DataType::U8).with_transform(*input.transform());
        let mut output = factory.create_from_spec(&params.output, &info)?;

        let mut skeleton_pixels = 0usize;
        for row in 0..rows {
            for col in 0..cols {
                let inside = row >= OUTPUT_MARGIN
                    && col >= OUTPUT_MARGIN
                    && row + OUTPUT_MARGIN < rows
                    && col + OUTPUT_MARGIN < cols;
                let value = if inside && maps.blended[[row, col]] > params.skeleton_threshold {
                    skeleton_pixels += 1;
                    SKELETON_VALUE
                } else {
                    0.0
                };
                output.set_value(row, col, 0, value);
            }
        }

        tracing::info!(
            rows,
            cols,
            iterations = maps.diffusion.iterations,
            skeleton_pixels,
            "skeleton extracted"
        );
        Ok(output)
    }
}

impl Algorithm for Skeleton {
    type Input = Raster;
    type Output = Raster;
    type Params = SkeletonParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Skeleton"
    }

    fn description(&self) -> &'static str {
        "Binary skeleton by gradient vector diffusion"
    }

    fn execute(&self, input: Raster, params: SkeletonParams) -> Result<Raster> {
        let factory = RasterFactory::default();
        let output = self.extract::<_, Raster>(&input, None, &params, &factory, None)?;
        output.into_raster().ok_or_else(|| {
            Error::Other(format!(
                "driver {} did not return an in-memory raster",
                params.output.driver
            ))
        })
    }
}
