//! Training samples and per-class statistics

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use terraclass_core::{Error, RasterRead, Result};

/// Values observed at one training location, one per band.
pub type Sample = Vec<f64>;

/// External class identifier written to the output raster.
pub type ClassId = u32;

/// Samples of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub id: ClassId,
    pub samples: Vec<Sample>,
}

/// Training samples grouped by class, in insertion order.
///
/// Insertion order is the class iteration order of the classifiers, so it
/// decides ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassSamples {
    classes: Vec<ClassEntry>,
}

impl ClassSamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class with its samples. Fails if `id` is already present.
    pub fn insert(&mut self, id: ClassId, samples: Vec<Sample>) -> Result<()> {
        if self.classes.iter().any(|c| c.id == id) {
            return Err(Error::invalid_parameter("class", id, "duplicate class id"));
        }
        self.classes.push(ClassEntry { id, samples });
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_class(mut self, id: ClassId, samples: Vec<Sample>) -> Result<Self> {
        self.insert(id, samples)?;
        Ok(self)
    }

    /// Append one sample to `id`, creating the class at the end if needed.
    pub fn push_sample(&mut self, id: ClassId, sample: Sample) {
        match self.classes.iter_mut().find(|c| c.id == id) {
            Some(entry) => entry.samples.push(sample),
            None => self.classes.push(ClassEntry {
                id,
                samples: vec![sample],
            }),
        }
    }

    pub fn classes(&self) -> &[ClassEntry] {
        &self.classes
    }

    pub fn ids(&self) -> Vec<ClassId> {
        self.classes.iter().map(|c| c.id).collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Common sample dimension after checking that there is at least one
    /// class, every class has samples and every sample has the same
    /// non-zero length.
    pub fn dimension(&self) -> Result<usize> {
        let first = self
            .classes
            .first()
            .ok_or_else(|| Error::Algorithm("No training classes".into()))?;
        let dim = first.samples.first().map(Vec::len).unwrap_or(0);
        if dim == 0 {
            return Err(Error::Algorithm(format!(
                "Class {} has no usable samples",
                first.id
            )));
        }

        for class in &self.classes {
            if class.samples.is_empty() {
                return Err(Error::Algorithm(format!(
                    "Class {} has no samples",
                    class.id
                )));
            }
            if let Some(s) = class.samples.iter().find(|s| s.len() != dim) {
                return Err(Error::Algorithm(format!(
                    "Class {} has a sample of dimension {} (expected {})",
                    class.id,
                    s.len(),
                    dim
                )));
            }
        }
        Ok(dim)
    }

    /// Collect samples from a label raster and a value raster.
    ///
    /// Every pixel whose label (band 0 of `labels`) is valid becomes a sample
    /// of class `label.round()`, with the values of `bands` in `values`.
    /// Pixels with a no-data label or value, or a negative label, are
    /// skipped. Classes appear in order of first occurrence in row-major scan.
    pub fn from_training_raster<L, V>(labels: &L, values: &V, bands: &[usize]) -> Result<Self>
    where
        L: RasterRead + ?Sized,
        V: RasterRead + ?Sized,
    {
        let (rows, cols) = labels.shape();
        if values.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: values.rows(),
                ac: values.cols(),
            });
        }
        if labels.band_count() == 0 {
            return Err(Error::invalid_parameter("labels", 0, "label raster has no bands"));
        }
        super::check_bands(values, bands)?;

        let mut samples = Self::new();
        for row in 0..rows {
            'cols: for col in 0..cols {
                let label = labels.value(row, col, 0);
                if labels.is_nodata(0, label) || label < 0.0 || label > ClassId::MAX as f64 {
                    continue;
                }
                let mut sample = Vec::with_capacity(bands.len());
                for &b in bands {
                    let v = values.value(row, col, b);
                    if values.is_nodata(b, v) {
                        continue 'cols;
                    }
                    sample.push(v);
                }
                samples.push_sample(label.round() as ClassId, sample);
            }
        }
        Ok(samples)
    }
}

/// Mean and population covariance of one class.
#[derive(Debug, Clone)]
pub struct ClassStatistics {
    pub id: ClassId,
    pub mean: Array1<f64>,
    pub covariance: Array2<f64>,
    pub sample_count: usize,
}

/// Per-band mean of non-empty, equal-length samples.
pub fn mean_vector(samples: &[Sample]) -> Array1<f64> {
    let dim = samples.first().map(Vec::len).unwrap_or(0);
    let mut mean = Array1::<f64>::zeros(dim);
    for s in samples {
        for (m, v) in mean.iter_mut().zip(s) {
            *m += v;
        }
    }
    if !samples.is_empty() {
        mean /= samples.len() as f64;
    }
    mean
}

/// Population covariance (divisor `n`) of samples around `mean`.
pub fn covariance_matrix(samples: &[Sample], mean: &Array1<f64>) -> Array2<f64> {
    let dim = mean.len();
    let mut cov = Array2::<f64>::zeros((dim, dim));
    for s in samples {
        for d1 in 0..dim {
            let a = s[d1] - mean[d1];
            for d2 in 0..=d1 {
                cov[[d1, d2]] += a * (s[d2] - mean[d2]);
            }
        }
    }
    if !samples.is_empty() {
        cov /= samples.len() as f64;
    }
    for d1 in 0..dim {
        for d2 in 0..d1 {
            cov[[d2, d1]] = cov[[d1, d2]];
        }
    }
    cov
}

/// Mean vector and covariance matrix per class, in class order.
pub fn class_statistics(samples: &ClassSamples) -> Result<Vec<ClassStatistics>> {
    samples.dimension()?;
    Ok(samples
        .classes()
        .iter()
        .map(|class| {
            let mean = mean_vector(&class.samples);
            let covariance = covariance_matrix(&class.samples, &mean);
            ClassStatistics {
                id: class.id,
                mean,
                covariance,
                sample_count: class.samples.len(),
            }
        })
        .collect())
}

/// Mean vector per class, in class order.
pub fn class_means(samples: &ClassSamples) -> Result<Vec<(ClassId, Array1<f64>)>> {
    samples.dimension()?;
    Ok(samples
        .classes()
        .iter()
        .map(|class| (class.id, mean_vector(&class.samples)))
        .collect())
}
