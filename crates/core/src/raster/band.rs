//! Raster bands and their storage type

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Storage type declared for a band.
///
/// Values are always held as `f64`; integer types only constrain what a
/// write stores (rounded, then clamped to the type range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataType {
    U8,
    U16,
    I32,
    U32,
    F32,
    #[default]
    F64,
}

impl DataType {
    /// Inclusive value range of integer types, `None` for floating types.
    pub fn range(self) -> Option<(f64, f64)> {
        match self {
            DataType::U8 => Some((0.0, u8::MAX as f64)),
            DataType::U16 => Some((0.0, u16::MAX as f64)),
            DataType::I32 => Some((i32::MIN as f64, i32::MAX as f64)),
            DataType::U32 => Some((0.0, u32::MAX as f64)),
            DataType::F32 | DataType::F64 => None,
        }
    }

    /// Value actually stored when `value` is written to a band of this type.
    pub fn quantize(self, value: f64) -> f64 {
        match self {
            DataType::F64 => value,
            DataType::F32 => value as f32 as f64,
            _ => {
                if value.is_nan() {
                    return 0.0;
                }
                let (lo, hi) = self.range().unwrap_or((f64::MIN, f64::MAX));
                value.round().clamp(lo, hi)
            }
        }
    }
}

/// One band of a raster: values plus an optional no-data sentinel.
#[derive(Debug, Clone)]
pub struct Band {
    pub(crate) data: Array2<f64>,
    pub(crate) nodata: Option<f64>,
    pub(crate) data_type: DataType,
}

impl Band {
    /// Zero-filled band.
    pub fn new(rows: usize, cols: usize, data_type: DataType) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            nodata: None,
            data_type,
        }
    }

    /// Band over existing values, quantized to `data_type`.
    pub fn from_array(mut data: Array2<f64>, data_type: DataType) -> Self {
        if data_type != DataType::F64 {
            data.mapv_inplace(|v| data_type.quantize(v));
        }
        Self {
            data,
            nodata: None,
            data_type,
        }
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Whether `value` is this band's no-data sentinel. NaN always counts.
    pub fn is_nodata(&self, value: f64) -> bool {
        is_nodata_value(value, self.nodata)
    }
}

/// `true` when `value` is NaN or equals the declared sentinel.
pub(crate) fn is_nodata_value(value: f64, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return true;
    }
    match nodata {
        Some(nd) => value == nd,
        None => false,
    }
}
