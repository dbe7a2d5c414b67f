//! Output raster creation through named drivers

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::{Band, DataType, GeoTransform, Raster, RasterWrite};

/// Layout of a raster to be created by a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub rows: usize,
    pub cols: usize,
    pub bands: usize,
    pub data_type: DataType,
    /// Sentinel declared on every band
    pub nodata: Option<f64>,
    pub transform: GeoTransform,
}

impl RasterInfo {
    pub fn new(rows: usize, cols: usize, bands: usize, data_type: DataType) -> Self {
        Self {
            rows,
            cols,
            bands,
            data_type,
            nodata: None,
            transform: GeoTransform::default(),
        }
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// A backend able to create writable rasters.
pub trait RasterDriver: Send + Sync {
    /// Name the driver is registered under.
    fn name(&self) -> &str;

    /// Create a raster laid out as `info`; `options` are driver specific
    /// (e.g. `{"URI": path}` for file backed drivers).
    fn create(
        &self,
        info: &RasterInfo,
        options: &HashMap<String, String>,
    ) -> Result<Box<dyn RasterWrite + Send>>;
}

/// In-memory driver, registered as `"MEM"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemDriver;

impl RasterDriver for MemDriver {
    fn name(&self) -> &str {
        "MEM"
    }

    fn create(
        &self,
        info: &RasterInfo,
        _options: &HashMap<String, String>,
    ) -> Result<Box<dyn RasterWrite + Send>> {
        if info.rows == 0 || info.cols == 0 {
            return Err(Error::InvalidDimensions {
                width: info.cols,
                height: info.rows,
            });
        }
        let bands = (0..info.bands)
            .map(|_| Band::new(info.rows, info.cols, info.data_type).with_nodata(info.nodata))
            .collect();
        let raster = Raster::from_bands(bands)?.with_transform(info.transform);
        Ok(Box::new(raster))
    }
}

/// Registry of raster drivers, populated by the caller.
pub struct RasterFactory {
    drivers: HashMap<String, Box<dyn RasterDriver>>,
}

impl RasterFactory {
    /// Registry without any driver.
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Register `driver` under its name, replacing any previous one.
    pub fn register(&mut self, driver: Box<dyn RasterDriver>) {
        self.drivers.insert(driver.name().to_string(), driver);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Create a raster through the driver named `driver`.
    pub fn create(
        &self,
        driver: &str,
        info: &RasterInfo,
        options: &HashMap<String, String>,
    ) -> Result<Box<dyn RasterWrite + Send>> {
        let d = self
            .drivers
            .get(driver)
            .ok_or_else(|| Error::UnknownDriver(driver.to_string()))?;
        tracing::debug!(
            driver,
            rows = info.rows,
            cols = info.cols,
            bands = info.bands,
            "creating output raster"
        );
        d.create(info, options)
    }

    /// Create a raster as described by `spec`.
    pub fn create_from_spec(
        &self,
        spec: &OutputRasterSpec,
        info: &RasterInfo,
    ) -> Result<Box<dyn RasterWrite + Send>> {
        self.create(&spec.driver, info, &spec.options)
    }
}

impl Default for RasterFactory {
    fn default() -> Self {
        let mut factory = Self::new();
        factory.register(Box::new(MemDriver));
        factory
    }
}

impl fmt::Debug for RasterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.drivers.keys().collect();
        names.sort();
        f.debug_struct("RasterFactory")
            .field("drivers", &names)
            .finish()
    }
}

/// Driver name plus driver options for an output raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputRasterSpec {
    pub driver: String,
    pub options: HashMap<String, String>,
}

impl OutputRasterSpec {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            options: HashMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl Default for OutputRasterSpec {
    fn default() -> Self {
        Self::new("MEM")
    }
}
