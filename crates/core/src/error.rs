//! Error types for terraclass

use thiserror::Error;

/// Main error type for terraclass operations.
///
/// Every condition under which an operation cannot proceed is reported as one
/// of these variants; the message is meant for humans, not for matching.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}, band {band}) in raster of size ({rows}, {cols}, {bands})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        band: usize,
        rows: usize,
        cols: usize,
        bands: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("Singular {size}x{size} matrix")]
    SingularMatrix { size: usize },

    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unknown raster driver: {0}")]
    UnknownDriver(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidParameter`].
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for terraclass operations
pub type Result<T> = std::result::Result<T, Error>;
