//! Affine pixel/geographic transformation

use serde::{Deserialize, Serialize};

/// Affine transformation between pixel space and geographic space.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// Pixel space is continuous: pixel `(row, col)` covers `[col, col + 1) x [row, row + 1)`
/// and its centre sits at `(col + 0.5, row + 0.5)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation term applied to rows in X (usually 0)
    pub row_rotation: f64,
    /// Rotation term applied to columns in Y (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform without rotation.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Geographic coordinates of a continuous pixel-space position.
    pub fn to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Geographic coordinates of the centre of pixel `(row, col)`.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Continuous pixel-space `(col, row)` of a geographic position.
    ///
    /// Returns NaN coordinates for a degenerate transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        (col, row)
    }
}

impl Default for GeoTransform {
    /// Identity-like north-up transform: pixel `(row, col)` has its upper-left
    /// corner at `(col, -row)`.
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
