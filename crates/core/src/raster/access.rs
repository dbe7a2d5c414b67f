//! Pixel access contract consumed by the algorithms

use super::GeoTransform;

/// Read access to a multi-band raster.
///
/// Coordinates are `(row, col, band)`. Implementations may panic on
/// out-of-range indices; callers validate shapes up front.
pub trait RasterRead {
    fn rows(&self) -> usize;

    fn cols(&self) -> usize;

    fn band_count(&self) -> usize;

    /// Value stored at `(row, col)` of `band`.
    fn value(&self, row: usize, col: usize, band: usize) -> f64;

    /// Declared no-data sentinel of `band`.
    fn nodata(&self, band: usize) -> Option<f64>;

    fn transform(&self) -> &GeoTransform;

    /// `(rows, cols)`
    fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Whether `value` read from `band` counts as no-data (NaN always does).
    fn is_nodata(&self, band: usize, value: f64) -> bool {
        super::band::is_nodata_value(value, self.nodata(band))
    }
}

/// Write access to a multi-band raster.
pub trait RasterWrite: RasterRead {
    /// Store `value` at `(row, col)` of `band`, converted to the band's type.
    fn set_value(&mut self, row: usize, col: usize, band: usize, value: f64);

    /// Downcast helper for rasters created through a factory.
    fn into_raster(self: Box<Self>) -> Option<super::Raster>;
}
