//! Classifier facade: strategy selection and output raster creation

use geo::Polygon;
use serde::{Deserialize, Serialize};
use terraclass_core::{
    DataType, Error, OutputRasterSpec, Progress, RasterFactory, RasterInfo, RasterRead,
    RasterWrite, Result,
};

use super::ed::{EdParams, EuclideanDistanceStrategy};
use super::isoseg::{IsoSegParams, IsoSegStrategy};
use super::map::{MapParams, MaximumAPosterioriStrategy};
use super::strategy::ClassifierStrategy;

/// Strategy choice together with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy")]
pub enum ClassifierParams {
    #[serde(rename = "ed")]
    Ed(EdParams),
    #[serde(rename = "map")]
    Map(MapParams),
    #[serde(rename = "isoseg")]
    IsoSeg(IsoSegParams),
}

impl ClassifierParams {
    pub fn strategy_name(&self) -> &'static str {
        match self {
            ClassifierParams::Ed(_) => "ed",
            ClassifierParams::Map(_) => "map",
            ClassifierParams::IsoSeg(_) => "isoseg",
        }
    }
}

/// An initialized strategy.
#[derive(Debug, Clone)]
pub enum ClassifierStrategyKind {
    Ed(EuclideanDistanceStrategy),
    Map(MaximumAPosterioriStrategy),
    IsoSeg(IsoSegStrategy),
}

impl ClassifierStrategyKind {
    /// Build and initialize the strategy selected by `params`.
    pub fn from_params(params: &ClassifierParams) -> Result<Self> {
        Ok(match params {
            ClassifierParams::Ed(p) => {
                let mut s = EuclideanDistanceStrategy::new();
                s.initialize(p)?;
                ClassifierStrategyKind::Ed(s)
            }
            ClassifierParams::Map(p) => {
                let mut s = MaximumAPosterioriStrategy::new();
                s.initialize(p)?;
                ClassifierStrategyKind::Map(s)
            }
            ClassifierParams::IsoSeg(p) => {
                let mut s = IsoSegStrategy::new();
                s.initialize(p)?;
                ClassifierStrategyKind::IsoSeg(s)
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClassifierStrategyKind::Ed(s) => s.name(),
            ClassifierStrategyKind::Map(s) => s.name(),
            ClassifierStrategyKind::IsoSeg(s) => s.name(),
        }
    }

    pub fn execute<I, O>(
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
        O: RasterWrite + ?Sized,
    {
        match self {
            ClassifierStrategyKind::Ed(s) => {
                s.execute(input, bands, polygons, output, output_band, progress)
            }
            ClassifierStrategyKind::Map(s) => {
                s.execute(input, bands, polygons, output, output_band, progress)
            }
            ClassifierStrategyKind::IsoSeg(s) => {
                s.execute(input, bands, polygons, output, output_band, progress)
            }
        }
    }
}

/// Everything a classification run reads.
#[derive(Clone)]
pub struct ClassifierInput<'a> {
    pub raster: &'a dyn RasterRead,
    /// Input bands forming each pixel's feature vector
    pub bands: Vec<usize>,
    /// Region polygons (ISOSeg only)
    pub polygons: Vec<Polygon<f64>>,
    pub params: ClassifierParams,
}

impl<'a> ClassifierInput<'a> {
    pub fn new(raster: &'a dyn RasterRead, bands: Vec<usize>, params: ClassifierParams) -> Self {
        Self {
            raster,
            bands,
            polygons: Vec::new(),
            params,
        }
    }

    pub fn with_polygons(mut self, polygons: Vec<Polygon<f64>>) -> Self {
        self.polygons = polygons;
        self
    }
}

/// Runs one classification strategy over a raster and returns the labels
/// in a newly created single-band raster.
///
/// ```ignore
/// let input = ClassifierInput::new(&raster, vec![0, 1], ClassifierParams::Ed(params));
/// let mut classifier = Classifier::new();
/// classifier.initialize(input)?;
/// let labels = classifier.execute(&OutputRasterSpec::default(), &RasterFactory::default(), None)?;
/// ```
#[derive(Default)]
pub struct Classifier<'a> {
    state: Option<(ClassifierInput<'a>, ClassifierStrategyKind)>,
}

impl<'a> Classifier<'a> {
    pub fn new() -> Self {
        Self { state: None }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Validate `input` and initialize the selected strategy.
    pub fn initialize(&mut self, input: ClassifierInput<'a>) -> Result<()> {
        self.state = None;
        let strategy = input.params.strategy_name();
        let result = validate(&input).and_then(|_| ClassifierStrategyKind::from_params(&input.params));
        match result {
            Ok(kind) => {
                tracing::debug!(strategy, "classifier initialized");
                self.state = Some((input, kind));
                Ok(())
            }
            Err(e) => {
                tracing::error!(strategy, error = %e, "classifier initialization failed");
                Err(e)
            }
        }
    }

    /// Classify into a new raster created by `factory` as described by `output`.
    ///
    /// The output has one `F64` band with the input's shape and transform,
    /// and the no-data of the first selected input band.
    pub fn execute(
        &self,
        output: &OutputRasterSpec,
        factory: &RasterFactory,
        progress: Option<&dyn Progress>,
    ) -> Result<Box<dyn RasterWrite + Send>> {
        let (input, kind) = self
            .state
            .as_ref()
            .ok_or(Error::NotInitialized("Classifier"))?;
        let raster = input.raster;

        let nodata = input.bands.first().and_then(|&b| raster.nodata(b));
        let info = RasterInfo::new(raster.rows(), raster.cols(), 1, DataType::F64)
            .with_nodata(nodata)
            .with_transform(*raster.transform());

        let result = factory.create_from_spec(output, &info).and_then(|mut out| {
            kind.execute(raster, &input.bands, &input.polygons, &mut *out, 0, progress)?;
            Ok(out)
        });

        match &result {
            Ok(_) => tracing::info!(strategy = kind.name(), driver = %output.driver, "classification finished"),
            Err(Error::Cancelled) => tracing::info!(strategy = kind.name(), "classification cancelled"),
            Err(e) => tracing::error!(strategy = kind.name(), error = %e, "classification failed"),
        }
        result
    }
}

fn validate(input: &ClassifierInput<'_>) -> Result<()> {
    let raster = input.raster;
    if raster.rows() == 0 || raster.cols() == 0 {
        return Err(Error::InvalidDimensions {
            width: raster.cols(),
            height: raster.rows(),
        });
    }
    super::check_bands(raster, &input.bands)?;
    let samples = match &input.params {
        ClassifierParams::Ed(p) => &p.samples,
        ClassifierParams::Map(p) => &p.samples,
        ClassifierParams::IsoSeg(_) => {
            if input.polygons.is_empty() {
                return Err(Error::invalid_parameter(
                    "polygons",
                    0,
                    "ISOSeg requires at least one polygon",
                ));
            }
            return Ok(());
        }
    };
    let dim = samples.dimension()?;
    if dim != input.bands.len() {
        return Err(Error::invalid_parameter(
            "bands",
            input.bands.len(),
            format!("training samples have dimension {dim}"),
        ));
    }
    Ok(())
}
