//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{Band, DataType, GeoTransform, RasterRead, RasterWrite};
use ndarray::Array2;

/// A georeferenced multi-band raster grid.
///
/// Every band shares the raster's `(rows, cols)` shape and transform, and
/// carries its own no-data sentinel and storage type.
///
/// # Example
///
/// ```ignore
/// use terraclass_core::{DataType, Raster};
///
/// // Two-band 100x100 raster filled with zeros
/// let mut raster = Raster::new(100, 100, 2, DataType::F64)?;
///
/// raster.set(10, 20, 1, 42.0)?;
/// let value = raster.get(10, 20, 1)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster {
    bands: Vec<Band>,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
}

impl Raster {
    /// Zero-filled raster with `band_count` bands of `data_type`.
    pub fn new(rows: usize, cols: usize, band_count: usize, data_type: DataType) -> Result<Self> {
        if band_count == 0 {
            return Err(Error::invalid_parameter(
                "band_count",
                band_count,
                "a raster needs at least one band",
            ));
        }
        Ok(Self {
            bands: (0..band_count)
                .map(|_| Band::new(rows, cols, data_type))
                .collect(),
            rows,
            cols,
            transform: GeoTransform::default(),
        })
    }

    /// Raster from existing bands, which must all have the same shape.
    pub fn from_bands(bands: Vec<Band>) -> Result<Self> {
        let Some(first) = bands.first() else {
            return Err(Error::invalid_parameter(
                "bands",
                0,
                "a raster needs at least one band",
            ));
        };
        let (rows, cols) = first.shape();
        for band in &bands[1..] {
            let (r, c) = band.shape();
            if (r, c) != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar: r,
                    ac: c,
                });
            }
        }
        Ok(Self {
            bands,
            rows,
            cols,
            transform: GeoTransform::default(),
        })
    }

    /// Raster from one `f64` array per band.
    pub fn from_arrays(arrays: Vec<Array2<f64>>) -> Result<Self> {
        Self::from_bands(
            arrays
                .into_iter()
                .map(|a| Band::from_array(a, DataType::F64))
                .collect(),
        )
    }

    /// Single-band raster from row-major values.
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array =
            Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
        Self::from_arrays(vec![array])
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Declare the no-data sentinel of `band`.
    pub fn set_nodata(&mut self, band: usize, nodata: Option<f64>) -> Result<()> {
        self.band_mut(band)?.nodata = nodata;
        Ok(())
    }

    pub fn band(&self, band: usize) -> Result<&Band> {
        let bands = self.bands.len();
        self.bands
            .get(band)
            .ok_or_else(|| self.out_of_bounds(0, 0, band, bands))
    }

    pub fn band_mut(&mut self, band: usize) -> Result<&mut Band> {
        let bands = self.bands.len();
        let err = self.out_of_bounds(0, 0, band, bands);
        self.bands.get_mut(band).ok_or(err)
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Bounds-checked read.
    pub fn get(&self, row: usize, col: usize, band: usize) -> Result<f64> {
        self.check(row, col, band)?;
        Ok(self.bands[band].data[[row, col]])
    }

    /// Bounds-checked write, quantized to the band's type.
    pub fn set(&mut self, row: usize, col: usize, band: usize, value: f64) -> Result<()> {
        self.check(row, col, band)?;
        let b = &mut self.bands[band];
        b.data[[row, col]] = b.data_type.quantize(value);
        Ok(())
    }

    /// Values of `band` as an array view.
    pub fn band_data(&self, band: usize) -> Result<&Array2<f64>> {
        Ok(&self.band(band)?.data)
    }

    fn check(&self, row: usize, col: usize, band: usize) -> Result<()> {
        if row >= self.rows || col >= self.cols || band >= self.bands.len() {
            return Err(self.out_of_bounds(row, col, band, self.bands.len()));
        }
        Ok(())
    }

    fn out_of_bounds(&self, row: usize, col: usize, band: usize, bands: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            band,
            rows: self.rows,
            cols: self.cols,
            bands,
        }
    }
}

impl RasterRead for Raster {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn value(&self, row: usize, col: usize, band: usize) -> f64 {
        self.bands[band].data[[row, col]]
    }

    fn nodata(&self, band: usize) -> Option<f64> {
        self.bands[band].nodata
    }

    fn transform(&self) -> &GeoTransform {
        &self.transform
    }
}

impl RasterWrite for Raster {
    fn set_value(&mut self, row: usize, col: usize, band: usize, value: f64) {
        let b = &mut self.bands[band];
        b.data[[row, col]] = b.data_type.quantize(value);
    }

    fn into_raster(self: Box<Self>) -> Option<Raster> {
        Some(*self)
    }
}
