//! Polygon pixel extraction
//!
//! A pixel belongs to a polygon when its centre lies strictly inside it.

use geo::{Area, BoundingRect, Contains, Coord, LineString, Point, Polygon};

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterRead};

/// Iterator over the `(row, col)` pixels of a raster whose centres fall
/// inside a polygon, rows ascending then columns ascending.
#[derive(Debug, Clone)]
pub struct PolygonPixels<'a> {
    polygon: &'a Polygon<f64>,
    transform: GeoTransform,
    row: usize,
    col: usize,
    row_end: usize,
    col_start: usize,
    col_end: usize,
}

impl<'a> PolygonPixels<'a> {
    /// Pixels of a `rows x cols` grid georeferenced by `transform`.
    pub fn new(polygon: &'a Polygon<f64>, transform: GeoTransform, rows: usize, cols: usize) -> Self {
        let empty = Self {
            polygon,
            transform,
            row: 0,
            col: 0,
            row_end: 0,
            col_start: 0,
            col_end: 0,
        };

        let Some(rect) = polygon.bounding_rect() else {
            return empty;
        };
        let (min, max) = (rect.min(), rect.max());
        let corners = [
            transform.geo_to_pixel(min.x, min.y),
            transform.geo_to_pixel(min.x, max.y),
            transform.geo_to_pixel(max.x, min.y),
            transform.geo_to_pixel(max.x, max.y),
        ];
        if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
            return empty;
        }

        let col_lo = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let col_hi = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let row_lo = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let row_hi = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

        let (col_start, col_end) = pixel_span(col_lo, col_hi, cols);
        let (row_start, row_end) = pixel_span(row_lo, row_hi, rows);
        if col_start >= col_end || row_start >= row_end {
            return empty;
        }

        Self {
            row: row_start,
            col: col_start,
            row_end,
            col_start,
            col_end,
            ..empty
        }
    }

    /// Pixels of `raster` inside `polygon`.
    pub fn over<R: RasterRead + ?Sized>(polygon: &'a Polygon<f64>, raster: &R) -> Self {
        Self::new(polygon, *raster.transform(), raster.rows(), raster.cols())
    }
}

/// Half-open range of pixel indices whose centres may lie in `[lo, hi]`.
fn pixel_span(lo: f64, hi: f64, n: usize) -> (usize, usize) {
    let start = (lo - 0.5).ceil().max(0.0);
    let end = ((hi - 0.5).floor() + 1.0).min(n as f64);
    if end <= start {
        return (0, 0);
    }
    (start as usize, end as usize)
}

impl Iterator for PolygonPixels<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.row < self.row_end {
            while self.col < self.col_end {
                let (row, col) = (self.row, self.col);
                self.col += 1;
                let (x, y) = self.transform.pixel_center(row, col);
                if self.polygon.contains(&Point::new(x, y)) {
                    return Some((row, col));
                }
            }
            self.row += 1;
            self.col = self.col_start;
        }
        None
    }
}

/// Values of `bands` at every pixel inside `polygon`, one list per band.
///
/// Pixels where any requested band holds no-data (or NaN) are skipped, so
/// all lists have the same length.
pub fn values_in_polygon<R: RasterRead + ?Sized>(
    raster: &R,
    bands: &[usize],
    polygon: &Polygon<f64>,
) -> Result<Vec<Vec<f64>>> {
    if let Some(&bad) = bands.iter().find(|&&b| b >= raster.band_count()) {
        return Err(Error::invalid_parameter(
            "bands",
            bad,
            format!("raster has {} bands", raster.band_count()),
        ));
    }

    let mut values = vec![Vec::new(); bands.len()];
    let mut pixel = Vec::with_capacity(bands.len());
    'pixels: for (row, col) in PolygonPixels::over(polygon, raster) {
        pixel.clear();
        for &b in bands {
            let v = raster.value(row, col, b);
            if raster.is_nodata(b, v) {
                continue 'pixels;
            }
            pixel.push(v);
        }
        for (list, &v) in values.iter_mut().zip(&pixel) {
            list.push(v);
        }
    }
    Ok(values)
}

/// Unsigned geometric area of `polygon`.
pub fn polygon_area(polygon: &Polygon<f64>) -> f64 {
    polygon.unsigned_area()
}

/// Polygon covering the window of `rows x cols` pixels whose upper-left
/// pixel is `(row, col)`.
pub fn pixel_window_polygon(
    transform: &GeoTransform,
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
) -> Polygon<f64> {
    let (r0, c0) = (row as f64, col as f64);
    let (r1, c1) = ((row + rows) as f64, (col + cols) as f64);
    let ring: Vec<Coord<f64>> = [(c0, r0), (c1, r0), (c1, r1), (c0, r1), (c0, r0)]
        .iter()
        .map(|&(c, r)| {
            let (x, y) = transform.to_geo(c, r);
            Coord { x, y }
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}
