//! Common classifier strategy contract

use geo::Polygon;
use terraclass_core::{Error, Progress, RasterRead, RasterWrite, Result};

/// A classification algorithm: build statistics once, then label a raster.
pub trait ClassifierStrategy {
    type Params;

    fn name(&self) -> &'static str;

    /// Build the strategy's internal state from `params`.
    ///
    /// On failure the strategy is left uninitialized.
    fn initialize(&mut self, params: &Self::Params) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Label `input` into `output_band` of `output`.
    ///
    /// `bands` selects the input bands forming each pixel's feature vector.
    /// `polygons` is only used by region based strategies. Progress is
    /// pulsed once per completed unit of work and cancellation leaves rows
    /// already written in place.
    fn execute<I, O>(
        &self,
        input: &I,
        bands: &[usize],
        polygons: &[Polygon<f64>],
        output: &mut O,
        output_band: usize,
        progress: Option<&dyn Progress>,
    ) -> Result<()>
    where
        I: RasterRead + ?Sized,
        O: RasterWrite + ?Sized;
}

/// Preconditions shared by every strategy's `execute`.
pub(crate) fn check_execute<I, O>(
    input: &I,
    bands: &[usize],
    output: &O,
    output_band: usize,
    dimension: Option<usize>,
) -> Result<()>
where
    I: RasterRead + ?Sized,
    O: RasterRead + ?Sized,
{
    super::check_bands(input, bands)?;
    if output_band >= output.band_count() {
        return Err(Error::invalid_parameter(
            "output_band",
            output_band,
            format!("output raster has {} bands", output.band_count()),
        ));
    }
    if input.shape() != output.shape() {
        return Err(Error::SizeMismatch {
            er: input.rows(),
            ec: input.cols(),
            ar: output.rows(),
            ac: output.cols(),
        });
    }
    if let Some(dim) = dimension {
        if dim != bands.len() {
            return Err(Error::invalid_parameter(
                "bands",
                bands.len(),
                format!("training samples have dimension {dim}"),
            ));
        }
    }
    Ok(())
}

/// Read the pixel at `(row, col)` into `sample`.
///
/// Returns the first band holding no-data, leaving `sample` partially filled.
#[inline]
pub(crate) fn read_pixel<I: RasterRead + ?Sized>(
    input: &I,
    bands: &[usize],
    row: usize,
    col: usize,
    sample: &mut [f64],
) -> Option<usize> {
    for (slot, &b) in sample.iter_mut().zip(bands) {
        let v = input.value(row, col, b);
        if input.is_nodata(b, v) {
            return Some(b);
        }
        *slot = v;
    }
    None
}

/// Sentinel written for a no-data pixel: the output band's, else the one of
/// the input band that triggered, else NaN.
#[inline]
pub(crate) fn nodata_sentinel<I: RasterRead + ?Sized>(
    input: &I,
    output_nodata: Option<f64>,
    band: usize,
) -> f64 {
    output_nodata.or(input.nodata(band)).unwrap_or(f64::NAN)
}
