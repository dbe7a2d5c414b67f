//! Raster fields of the skeleton pipeline: smoothing, edge strength,
//! gradient vectors and skeleton strength

use ndarray::Array2;
use terraclass_core::{Error, RasterRead, Result};

/// 2D vector field, `x` along columns and `y` along rows.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
}

impl VectorField {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            x: Array2::zeros((rows, cols)),
            y: Array2::zeros((rows, cols)),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.x.dim()
    }

    #[inline]
    pub fn magnitude(&self, row: usize, col: usize) -> f64 {
        self.x[[row, col]].hypot(self.y[[row, col]])
    }
}

/// Offsets `(drow, dcol)` of the 8 neighbours.
pub(crate) const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[inline]
pub(crate) fn offset(row: usize, col: usize, d: (isize, isize)) -> (usize, usize) {
    (
        (row as isize + d.0) as usize,
        (col as isize + d.1) as usize,
    )
}

/// Values of `band`, with no-data pixels and pixels masked out by `mask`
/// (band 0 equal to 0 or no-data) set to 0.
pub fn load_band<R, M>(input: &R, band: usize, mask: Option<&M>) -> Result<Array2<f64>>
where
    R: RasterRead + ?Sized,
    M: RasterRead + ?Sized,
{
    if band >= input.band_count() {
        return Err(Error::invalid_parameter(
            "band",
            band,
            format!("raster has {} bands", input.band_count()),
        ));
    }
    let (rows, cols) = input.shape();
    if let Some(m) = mask {
        if m.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: m.rows(),
                ac: m.cols(),
            });
        }
        if m.band_count() == 0 {
            return Err(Error::invalid_parameter("mask", 0, "mask raster has no bands"));
        }
    }

    let mut data = Array2::<f64>::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            if let Some(m) = mask {
                let mv = m.value(row, col, 0);
                if mv == 0.0 || m.is_nodata(0, mv) {
                    continue;
                }
            }
            let v = input.value(row, col, band);
            if !input.is_nodata(band, v) {
                data[[row, col]] = v;
            }
        }
    }
    Ok(data)
}

/// 3x3 mean filter; border pixels are copied unchanged.
pub fn smooth(data: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = data.dim();
    let mut out = data.clone();
    if rows < 3 || cols < 3 {
        return out;
    }
    for row in 1..rows - 1 {
        for col in 1..cols - 1 {
            let mut sum = 0.0;
            for r in row - 1..=row + 1 {
                for c in col - 1..=col + 1 {
                    sum += data[[r, c]];
                }
            }
            out[[row, col]] = sum / 9.0;
        }
    }
    out
}

/// Edge strength in [0, 1]: the larger of the absolute differences between
/// opposite 3-pixel column sums and row sums, min/max normalised over the
/// interior. Border pixels and constant maps are 0.
pub fn edge_strength(data: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = data.dim();
    let mut out = Array2::<f64>::zeros((rows, cols));
    if rows < 3 || cols < 3 {
        return out;
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for row in 1..rows - 1 {
        for col in 1..cols - 1 {
            let z = |r: usize, c: usize| data[[r, c]];
            let left = z(row - 1, col - 1) + z(row, col - 1) + z(row + 1, col - 1);
            let right = z(row - 1, col + 1) + z(row, col + 1) + z(row + 1, col + 1);
            let top = z(row - 1, col - 1) + z(row - 1, col) + z(row - 1, col + 1);
            let bottom = z(row + 1, col - 1) + z(row + 1, col) + z(row + 1, col + 1);

            let s = (right - left).abs().max((bottom - top).abs());
            out[[row, col]] = s;
            min = min.min(s);
            max = max.max(s);
        }
    }

    normalize_interior(&mut out, min, max);
    out
}

/// Sobel gradient of `data`, each vector scaled to unit length when
/// non-zero. Border vectors are zero.
pub fn gradient_field(data: &Array2<f64>) -> VectorField {
    let (rows, cols) = data.dim();
    let mut field = VectorField::zeros(rows, cols);
    if rows < 3 || cols < 3 {
        return field;
    }

    for row in 1..rows - 1 {
        for col in 1..cols - 1 {
            let z1 = data[[row - 1, col - 1]];
            let z2 = data[[row - 1, col]];
            let z3 = data[[row - 1, col + 1]];
            let z4 = data[[row, col - 1]];
            let z6 = data[[row, col + 1]];
            let z7 = data[[row + 1, col - 1]];
            let z8 = data[[row + 1, col]];
            let z9 = data[[row + 1, col + 1]];

            let gx = (z3 + 2.0 * z6 + z9) - (z1 + 2.0 * z4 + z7);
            let gy = (z7 + 2.0 * z8 + z9) - (z1 + 2.0 * z2 + z3);
            let mag = gx.hypot(gy);
            if mag > 0.0 {
                field.x[[row, col]] = gx / mag;
                field.y[[row, col]] = gy / mag;
            }
        }
    }
    field
}

/// Convergence of the field at every interior pixel.
///
/// For each neighbour `n` the vector difference `v_n - v_c` is projected on
/// the unit vector pointing from `n` to the centre; the mean of the 8
/// projections, clamped at 0, is normalised to [0, 1] over the interior.
pub fn skeleton_strength(field: &VectorField) -> Array2<f64> {
    let (rows, cols) = field.shape();
    let mut out = Array2::<f64>::zeros((rows, cols));
    if rows < 3 || cols < 3 {
        return out;
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for row in 1..rows - 1 {
        for col in 1..cols - 1 {
            let (cx, cy) = (field.x[[row, col]], field.y[[row, col]]);
            let mut sum = 0.0;
            for d in NEIGHBOURS {
                let (r, c) = offset(row, col, d);
                // Unit vector from the neighbour towards the centre
                let (ux, uy) = (-d.1 as f64, -d.0 as f64);
                let norm = ux.hypot(uy);
                let dx = field.x[[r, c]] - cx;
                let dy = field.y[[r, c]] - cy;
                sum += (dx * ux + dy * uy) / norm;
            }
            let s = (sum / 8.0).max(0.0);
            out[[row, col]] = s;
            min = min.min(s);
            max = max.max(s);
        }
    }

    normalize_interior(&mut out, min, max);
    out
}

/// Rescale interior values from `[min, max]` to `[0, 1]`; a flat range maps to 0.
fn normalize_interior(out: &mut Array2<f64>, min: f64, max: f64) {
    let (rows, cols) = out.dim();
    let range = max - min;
    for row in 1..rows - 1 {
        for col in 1..cols - 1 {
            out[[row, col]] = if range > 0.0 {
                (out[[row, col]] - min) / range
            } else {
                0.0
            };
        }
    }
}
