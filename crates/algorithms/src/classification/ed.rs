//! Euclidean distance (minimum distance to mean) classification

use geo::Polygon;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use terraclass_core::progress::{pulse_and_check, start_stage};
use terraclass_core::{Error, Progress, RasterRead, RasterWrite, Result};

use super::samples::{class_means, ClassId, ClassSamples};
use super::strategy::{check_execute, nodata_sentinel, read_pixel, ClassifierStrategy};

/// Parameters for [`EuclideanDistanceStrategy`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdParams {
    /// Training samples; class order decides ties
    pub samples: ClassSamples,
}

/// Assigns each pixel to the class whose mean is nearest in squared
/// Euclidean distance, ties going to the first class in insertion order.
///
/// Pixels where any input band holds no-data are written as no-data.
#[derive(Debug, Clone, Default)]
pub struct EuclideanDistanceStrategy {
    classes: Option<Vec<(ClassId, Array1<f64>)>>,
}

impl EuclideanDistanceStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Class ids and means, once initialized.
    pub fn class_means(&self) -> Option<&[(ClassId, Array1<f64>)]> {
        self.classes.as_deref()
    }
}

/// Squared distance, or `None` as soon as the running sum exceeds `bound`.
#[inline]
fn bounded_distance(sample: &[f64], mean: &Array1<f64>, bound: f64) -> Option<f64> {
    let mut acc = 0.0;
    for (s, m) in sample.iter().zip(mean.iter()) {
        let d = s - m;
        acc += d * d;
        if acc > bound {
            return None;
        }
    }
    Some(acc)
}

/// Index of the nearest mean, starting the search from `reference`.
///
/// Every candidate is compared against the best so far; an equal distance
/// only wins with a lower index, so the result is the first minimum in
/// class order whatever the reference.
#[inline]
fn nearest_class(sample: &[f64], means: &[(ClassId, Array1<f64>)], reference: usize) -> usize {
    let mut best_idx = reference;
    let mut best = bounded_distance(sample, &means[reference].1, f64::INFINITY)
        .unwrap_or(f64::INFINITY);

    for (j, (_, mean)) in means.iter().enumerate() {
        if j == reference {
            continue;
        }
        if let Some(d) = bounded_distance(sample, mean, best) {
            if d < best || (d == best && j < best_idx) {
                best = d;
                best_idx = j;
            }
        }
    }
    best_idx
}

impl ClassifierStrategy for EuclideanDistanceStrategy {
    type Params = EdParams;

    fn name(&self) -> &'static str {
        "ED"
    }

    fn initialize(&mut self, params: &EdParams) -> Result<()> {
        self.classes = None;
        let means = class_means(&params.samples)?;
        tracing::debug!(classes = means.len(), "euclidean distance strategy initialized");
        self.classes = Some(means);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.classes.is_some()
    }

    fn execute<I, O>(
        &self,
        input: &I,
        bands: &[usize],
        _polygons: &[Polygon<f64>],
        output: &mut O,
        output_band: usize,
        progress: Option<&dyn Progress>,
    ) -> Result<()>
    where
        I: RasterRead + ?Sized,
        O: RasterWrite + ?Sized,
    {
        let classes = self
            .classes
            .as_deref()
            .ok_or(Error::NotInitialized("Euclidean distance strategy"))?;
        let dim = classes.first().map(|(_, m)| m.len());
        check_execute(input, bands, &*output, output_band, dim)?;

        let (rows, cols) = input.shape();
        let out_nodata = output.nodata(output_band);
        start_stage(progress, "Euclidean distance classification", rows as u64);

        let mut sample = vec![0.0; bands.len()];
        let mut reference = 0;
        for row in 0..rows {
            for col in 0..cols {
                if let Some(b) = read_pixel(input, bands, row, col, &mut sample) {
                    let nd = nodata_sentinel(input, out_nodata, b);
                    output.set_value(row, col, output_band, nd);
                    continue;
                }
                reference = nearest_class(&sample, classes, reference);
                output.set_value(row, col, output_band, classes[reference].0 as f64);
            }
            pulse_and_check(progress)?;
        }

        tracing::info!(rows, cols, classes = classes.len(), "euclidean distance classification done");
        Ok(())
    }
}
