//! Maximum a posteriori (Gaussian discriminant) classification

use geo::Polygon;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use terraclass_core::progress::{pulse_and_check, start_stage};
use terraclass_core::{Error, Progress, RasterRead, RasterWrite, Result};

use super::samples::{class_statistics, ClassId, ClassSamples};
use super::strategy::{check_execute, nodata_sentinel, read_pixel, ClassifierStrategy};
use crate::linalg;

/// Parameters for [`MaximumAPosterioriStrategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapParams {
    /// Training samples; class order decides ties
    pub samples: ClassSamples,
    /// Priori probability per class in class order, each in [0, 1].
    /// Estimated from the input raster when absent.
    pub priori: Option<Vec<f64>>,
    /// Row and column stride of the priori estimation pass (>= 1)
    pub priori_stride: usize,
    /// Write no-data for pixels where any input band is no-data instead of
    /// classifying them
    pub skip_nodata: bool,
}

impl Default for MapParams {
    fn default() -> Self {
        Self {
            samples: ClassSamples::default(),
            priori: None,
            priori_stride: 2,
            skip_nodata: false,
        }
    }
}

/// Per-class quantities cached for the discriminant.
#[derive(Debug, Clone)]
struct MapClass {
    id: ClassId,
    mean: Array1<f64>,
    inverse: Array2<f64>,
    /// `-0.5 * ln(det(covariance))`, or 0 for a non-positive determinant
    log_det_term: f64,
}

#[derive(Debug, Clone)]
struct MapState {
    classes: Vec<MapClass>,
    priori: Option<Vec<f64>>,
    stride: usize,
    skip_nodata: bool,
}

/// Gaussian maximum a posteriori classifier.
///
/// For a pixel `x` the discriminant of class `c` is
/// `ln(p_c) - 0.5 ln|Σc| - 0.5 (x-μc)ᵗ Σc⁻¹ (x-μc)` and the pixel takes the
/// class with the largest value, the first class winning ties.
#[derive(Debug, Clone, Default)]
pub struct MaximumAPosterioriStrategy {
    state: Option<MapState>,
}

impl MaximumAPosterioriStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<&MapState> {
        self.state
            .as_ref()
            .ok_or(Error::NotInitialized("Maximum a posteriori strategy"))
    }

    /// Priori probabilities supplied at initialization, if any.
    pub fn priori(&self) -> Option<&[f64]> {
        self.state.as_ref().and_then(|s| s.priori.as_deref())
    }

    pub fn class_ids(&self) -> Vec<ClassId> {
        self.state
            .as_ref()
            .map(|s| s.classes.iter().map(|c| c.id).collect())
            .unwrap_or_default()
    }

    /// Class frequencies over the pixels sampled every `stride` rows and
    /// columns, each classified with flat `1 / classes` priori.
    ///
    /// Falls back to flat priori when no pixel could be sampled.
    pub fn estimate_priori<I: RasterRead + ?Sized>(
        &self,
        input: &I,
        bands: &[usize],
        stride: usize,
        progress: Option<&dyn Progress>,
    ) -> Result<Vec<f64>> {
        let state = self.state()?;
        if stride == 0 {
            return Err(Error::invalid_parameter("priori_stride", stride, "must be >= 1"));
        }
        super::check_bands(input, bands)?;
        check_dimension(state, bands)?;

        let n = state.classes.len();
        let flat = vec![-(n as f64).ln(); n];
        let (rows, cols) = input.shape();
        let sampled_rows = rows.div_ceil(stride);
        start_stage(progress, "Estimating priori probabilities", sampled_rows as u64);

        let mut counts = vec![0usize; n];
        let mut sample = vec![0.0; bands.len()];
        let mut delta = Array1::<f64>::zeros(bands.len());
        for row in (0..rows).step_by(stride) {
            for col in (0..cols).step_by(stride) {
                if read_pixel(input, bands, row, col, &mut sample).is_some() {
                    if state.skip_nodata {
                        continue;
                    }
                    read_raw(input, bands, row, col, &mut sample);
                }
                counts[best_class(&state.classes, &flat, &sample, &mut delta)] += 1;
            }
            pulse_and_check(progress)?;
        }

        let total: usize = counts.iter().sum();
        let priori = if total == 0 {
            vec![1.0 / n as f64; n]
        } else {
            counts.iter().map(|&c| c as f64 / total as f64).collect()
        };
        tracing::debug!(?priori, sampled = total, "estimated priori probabilities");
        Ok(priori)
    }
}

/// Raw pixel values, no-data sentinels included.
#[inline]
fn read_raw<I: RasterRead + ?Sized>(
    input: &I,
    bands: &[usize],
    row: usize,
    col: usize,
    sample: &mut [f64],
) {
    for (slot, &band) in sample.iter_mut().zip(bands) {
        *slot = input.value(row, col, band);
    }
}

fn check_dimension(state: &MapState, bands: &[usize]) -> Result<()> {
    let dim = state.classes.first().map(|c| c.mean.len()).unwrap_or(0);
    if dim != bands.len() {
        return Err(Error::invalid_parameter(
            "bands",
            bands.len(),
            format!("training samples have dimension {dim}"),
        ));
    }
    Ok(())
}

/// Index of the class with the largest discriminant; strict `>` keeps the
/// first class on ties and when every value is `-inf`.
#[inline]
fn best_class(
    classes: &[MapClass],
    ln_priori: &[f64],
    sample: &[f64],
    delta: &mut Array1<f64>,
) -> usize {
    let mut best = f64::NEG_INFINITY;
    let mut best_idx = 0;
    for (idx, (class, &ln_p)) in classes.iter().zip(ln_priori).enumerate() {
        for ((d, &x), &m) in delta.iter_mut().zip(sample).zip(class.mean.iter()) {
            *d = x - m;
        }
        let mahalanobis = delta.dot(&class.inverse.dot(&*delta));
        let value = ln_p + class.log_det_term - 0.5 * mahalanobis;
        if value > best {
            best = value;
            best_idx = idx;
        }
    }
    best_idx
}

impl ClassifierStrategy for MaximumAPosterioriStrategy {
    type Params = MapParams;

    fn name(&self) -> &'static str {
        "MAP"
    }

    fn initialize(&mut self, params: &MapParams) -> Result<()> {
        self.state = None;

        if params.priori_stride == 0 {
            return Err(Error::invalid_parameter(
                "priori_stride",
                params.priori_stride,
                "must be >= 1",
            ));
        }
        let stats = class_statistics(&params.samples)?;

        if let Some(priori) = &params.priori {
            if priori.len() != stats.len() {
                return Err(Error::invalid_parameter(
                    "priori",
                    priori.len(),
                    format!("expected one value per class ({})", stats.len()),
                ));
            }
            if let Some(p) = priori.iter().find(|p| !(0.0..=1.0).contains(*p)) {
                return Err(Error::invalid_parameter("priori", p, "must be in [0, 1]"));
            }
        }

        let mut classes = Vec::with_capacity(stats.len());
        for s in stats {
            let inverse = linalg::inverse(s.covariance.view()).map_err(|e| {
                tracing::debug!(class = s.id, "class covariance is not invertible");
                e
            })?;
            let det = linalg::determinant(s.covariance.view())?;
            let log_det_term = if det > 0.0 { -0.5 * det.ln() } else { 0.0 };
            classes.push(MapClass {
                id: s.id,
                mean: s.mean,
                inverse,
                log_det_term,
            });
        }

        tracing::debug!(
            classes = classes.len(),
            explicit_priori = params.priori.is_some(),
            "maximum a posteriori strategy initialized"
        );
        self.state = Some(MapState {
            classes,
            priori: params.priori.clone(),
            stride: params.priori_stride,
            skip_nodata: params.skip_nodata,
        });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
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
        let state = self.state()?;
        let dim = state.classes.first().map(|c| c.mean.len());
        check_execute(input, bands, &*output, output_band, dim)?;

        let priori = match &state.priori {
            Some(p) => p.clone(),
            None => self.estimate_priori(input, bands, state.stride, progress)?,
        };
        let ln_priori: Vec<f64> = priori.iter().map(|p| p.ln()).collect();

        let (rows, cols) = input.shape();
        let out_nodata = output.nodata(output_band);
        start_stage(progress, "Maximum a posteriori classification", rows as u64);

        let mut sample = vec![0.0; bands.len()];
        let mut delta = Array1::<f64>::zeros(bands.len());
        for row in 0..rows {
            for col in 0..cols {
                if let Some(b) = read_pixel(input, bands, row, col, &mut sample) {
                    if state.skip_nodata {
                        let nd = nodata_sentinel(input, out_nodata, b);
                        output.set_value(row, col, output_band, nd);
                        continue;
                    }
                    read_raw(input, bands, row, col, &mut sample);
                }
                let idx = best_class(&state.classes, &ln_priori, &sample, &mut delta);
                output.set_value(row, col, output_band, state.classes[idx].id as f64);
            }
            pulse_and_check(progress)?;
        }

        tracing::info!(rows, cols, classes = state.classes.len(), "maximum a posteriori classification done");
        Ok(())
    }
}
