//! ISOSeg region-merging classification
//!
//! Each polygon becomes a region described by the mean, covariance and
//! area of the pixels it covers. Regions start as their own clusters and
//! clusters are merged pairwise while their distance stays within a
//! chi-square critical value, until a full pass merges nothing. Surviving
//! clusters are numbered 1..N and painted back polygon by polygon.

use std::collections::HashSet;

use geo::Polygon;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use terraclass_core::progress::{pulse_and_check, start_stage};
use terraclass_core::vector::{polygon_area, values_in_polygon, PolygonPixels};
use terraclass_core::{Error, Progress, RasterRead, RasterWrite, Result};

use super::strategy::{check_execute, ClassifierStrategy};
use crate::linalg;

/// Distance used to compare two clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceType {
    /// Smaller of the two directional Mahalanobis distances
    #[default]
    Mahalanobis,
    /// Bhattacharyya distance over the pooled covariance
    Bhattacharyya,
}

/// Parameters for [`IsoSegStrategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsoSegParams {
    /// Acceptance threshold in percent, in (0, 100]
    pub acceptance_threshold: f64,
    pub distance: DistanceType,
}

impl Default for IsoSegParams {
    fn default() -> Self {
        Self {
            acceptance_threshold: 99.0,
            distance: DistanceType::Mahalanobis,
        }
    }
}

/// Outcome of one ISOSeg run.
#[derive(Debug, Clone, PartialEq)]
pub struct IsoSegReport {
    /// Merge passes, the last one performing no merge
    pub passes: usize,
    /// Clusters left after each pass
    pub clusters_per_pass: Vec<usize>,
    /// Dense label (1..N) of each polygon, in polygon order
    pub labels: Vec<u32>,
}

impl IsoSegReport {
    pub fn cluster_count(&self) -> usize {
        self.labels.iter().copied().max().unwrap_or(0) as usize
    }
}

/// Critical chi-square values for 1 to 6 degrees of freedom at 75, 90, 95,
/// 99 and 99.9 % confidence, then 100 %.
const CHI_SQUARE: [[f64; 6]; 6] = [
    [1.32, 2.71, 3.84, 6.64, 10.83, f64::MAX],
    [2.77, 4.61, 5.99, 9.21, 13.82, f64::MAX],
    [4.11, 6.25, 7.82, 11.35, 16.27, f64::MAX],
    [5.39, 7.78, 9.49, 13.28, 18.47, f64::MAX],
    [6.63, 9.24, 11.07, 15.09, 20.52, f64::MAX],
    [7.84, 10.65, 12.59, 16.81, 22.46, f64::MAX],
];

/// Merge threshold for an acceptance percentage and a band count.
///
/// The percentage falls into the highest confidence bucket it reaches
/// (below 90 % uses 75 %). Band counts above 6 use the 6 band row.
pub fn chi_square_threshold(acceptance: f64, bands: usize) -> f64 {
    let row = bands.clamp(1, 6) - 1;
    let col = if acceptance < 90.0 {
        0
    } else if acceptance < 95.0 {
        1
    } else if acceptance < 99.0 {
        2
    } else if acceptance < 99.9 {
        3
    } else if acceptance < 100.0 {
        4
    } else {
        5
    };
    CHI_SQUARE[row][col]
}

/// Region or cluster statistics.
#[derive(Debug, Clone)]
struct Pattern {
    area: f64,
    mean: Array1<f64>,
    covariance: Array2<f64>,
    inverse: Array2<f64>,
}

impl Pattern {
    /// Absorb `other`: area-weighted mean, and the covariance of whichever
    /// side covers more area.
    fn absorb(&mut self, other: &Pattern) {
        let total = self.area + other.area;
        if total > 0.0 {
            self.mean = (&self.mean * self.area + &other.mean * other.area) / total;
        }
        if other.area > self.area {
            self.covariance = other.covariance.clone();
            self.inverse = other.inverse.clone();
        }
        self.area = total;
    }

    /// `(μa - μb)ᵗ Σa⁻¹ (μa - μb)`
    fn mahalanobis_to(&self, other: &Pattern) -> f64 {
        let delta = &self.mean - &other.mean;
        delta.dot(&self.inverse.dot(&delta))
    }
}

/// Non-finite or negative distances are never within a finite threshold.
fn sanitize(d: f64) -> f64 {
    if d.is_finite() && d >= 0.0 {
        d
    } else {
        f64::MAX
    }
}

fn cluster_distance(a: &Pattern, b: &Pattern, kind: DistanceType) -> Result<f64> {
    match kind {
        DistanceType::Mahalanobis => {
            let ab = sanitize(a.mahalanobis_to(b));
            let ba = sanitize(b.mahalanobis_to(a));
            Ok(ab.min(ba))
        }
        DistanceType::Bhattacharyya => {
            let pooled = (&a.covariance + &b.covariance) * 0.5;
            let inverse = invert_with_ridge(&pooled)?;
            let delta = &a.mean - &b.mean;
            let quad = delta.dot(&inverse.dot(&delta)) / 8.0;
            let log_term = match (
                linalg::log_determinant(pooled.view())?,
                linalg::log_determinant(a.covariance.view())?,
                linalg::log_determinant(b.covariance.view())?,
            ) {
                (Some(p), Some(la), Some(lb)) => 0.5 * (p - 0.5 * (la + lb)),
                _ => 0.0,
            };
            Ok(sanitize(quad + log_term))
        }
    }
}

/// Inverse of `m`, retried once with a small ridge on the diagonal.
fn invert_with_ridge(m: &Array2<f64>) -> Result<Array2<f64>> {
    match linalg::inverse(m.view()) {
        Ok(inv) => Ok(inv),
        Err(Error::SingularMatrix { .. }) => {
            let dim = m.nrows().max(1) as f64;
            let scale = (m.diag().sum() / dim).max(1.0);
            let ridged = m + &(Array2::<f64>::eye(m.nrows()) * (1e-6 * scale));
            linalg::inverse(ridged.view())
        }
        Err(e) => Err(e),
    }
}

/// Union-find over cluster ids with path compression.
#[derive(Debug, Clone)]
struct Clusters {
    parent: Vec<usize>,
}

impl Clusters {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Attach the cluster rooted at `absorbed` under `survivor`.
    fn attach(&mut self, absorbed: usize, survivor: usize) {
        self.parent[absorbed] = survivor;
    }

    fn count(&mut self) -> usize {
        (0..self.parent.len()).filter(|&i| self.find(i) == i).count()
    }
}

/// Region-merging classifier over polygon statistics.
#[derive(Debug, Clone, Default)]
pub struct IsoSegStrategy {
    params: Option<IsoSegParams>,
}

impl IsoSegStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the classification and report the merge history.
    pub fn execute_with_report<I, O>(
        &self,
        input: &I,
        bands: &[usize],
        polygons: &[Polygon<f64>],
        output: &mut O,
        output_band: usize,
        progress: Option<&dyn Progress>,
    ) -> Result<IsoSegReport>
    where
        I: RasterRead + ?Sized,
        O: RasterWrite + ?Sized,
    {
        let params = self
            .params
            .as_ref()
            .ok_or(Error::NotInitialized("ISOSeg strategy"))?;
        check_execute(input, bands, &*output, output_band, None)?;
        if polygons.is_empty() {
            return Err(Error::Algorithm("ISOSeg requires at least one polygon".into()));
        }

        let regions = extract_regions(input, bands, polygons, progress)?;
        let threshold = chi_square_threshold(params.acceptance_threshold, bands.len());
        tracing::debug!(
            regions = regions.len(),
            threshold,
            distance = ?params.distance,
            "ISOSeg regions extracted"
        );

        // Area descending; the stable sort keeps polygon order among equal areas
        let mut order: Vec<usize> = (0..regions.len()).collect();
        order.sort_by(|&a, &b| regions[b].area.total_cmp(&regions[a].area));

        let mut clusters = regions.clone();
        let mut sets = Clusters::new(regions.len());
        let mut clusters_per_pass = Vec::new();

        start_stage(progress, "Merging regions", regions.len() as u64);
        loop {
            let mut merges = 0;
            let mut compared: HashSet<(usize, usize)> = HashSet::new();
            for (pos, &a) in order.iter().enumerate() {
                for &b in &order[pos..] {
                    let ca = sets.find(a);
                    let cb = sets.find(b);
                    if ca == cb || !compared.insert((ca.min(cb), ca.max(cb))) {
                        continue;
                    }
                    let d = cluster_distance(&clusters[ca], &clusters[cb], params.distance)?;
                    if d <= threshold {
                        let absorbed = clusters[cb].clone();
                        clusters[ca].absorb(&absorbed);
                        sets.attach(cb, ca);
                        merges += 1;
                    }
                }
            }

            let remaining = sets.count();
            clusters_per_pass.push(remaining);
            tracing::debug!(pass = clusters_per_pass.len(), merges, remaining, "ISOSeg merge pass");
            pulse_and_check(progress)?;
            if merges == 0 {
                break;
            }
        }

        // Dense labels in ascending cluster id
        let mut roots: Vec<usize> = (0..regions.len()).map(|i| sets.find(i)).collect();
        let mut ids = roots.clone();
        ids.sort_unstable();
        ids.dedup();
        for root in roots.iter_mut() {
            let dense = ids.binary_search(root).unwrap_or(0);
            *root = dense + 1;
        }
        let labels: Vec<u32> = roots.iter().map(|&l| l as u32).collect();

        // Largest region first, so smaller overlapping polygons keep their pixels
        start_stage(progress, "Rasterizing clusters", polygons.len() as u64);
        for &idx in &order {
            let label = labels[idx] as f64;
            for (row, col) in PolygonPixels::over(&polygons[idx], input) {
                output.set_value(row, col, output_band, label);
            }
            pulse_and_check(progress)?;
        }

        let passes = clusters_per_pass.len();
        tracing::info!(
            polygons = polygons.len(),
            clusters = ids.len(),
            passes,
            "ISOSeg classification done"
        );
        Ok(IsoSegReport {
            passes,
            clusters_per_pass,
            labels,
        })
    }
}

/// Per-polygon statistics of the pixels it covers.
fn extract_regions<I: RasterRead + ?Sized>(
    input: &I,
    bands: &[usize],
    polygons: &[Polygon<f64>],
    progress: Option<&dyn Progress>,
) -> Result<Vec<Pattern>> {
    start_stage(progress, "Extracting region statistics", polygons.len() as u64);
    let dim = bands.len();
    let mut regions = Vec::with_capacity(polygons.len());

    for (idx, polygon) in polygons.iter().enumerate() {
        let values = values_in_polygon(input, bands, polygon)?;
        let n = values.first().map(Vec::len).unwrap_or(0);
        if n == 0 {
            return Err(Error::Algorithm(format!(
                "Polygon {idx} covers no valid pixel"
            )));
        }

        let mean = Array1::from_iter(values.iter().map(|v| v.iter().sum::<f64>() / n as f64));
        let mut covariance = Array2::<f64>::zeros((dim, dim));
        for d1 in 0..dim {
            for d2 in 0..=d1 {
                let c = values[d1]
                    .iter()
                    .zip(&values[d2])
                    .map(|(a, b)| (a - mean[d1]) * (b - mean[d2]))
                    .sum::<f64>()
                    / n as f64;
                covariance[[d1, d2]] = c;
                covariance[[d2, d1]] = c;
            }
        }

        let inverse = match linalg::inverse(covariance.view()) {
            Ok(inv) => inv,
            Err(Error::SingularMatrix { .. }) => {
                tracing::warn!(
                    polygon = idx,
                    pixels = n,
                    "singular region covariance, regularizing"
                );
                invert_with_ridge(&covariance)?
            }
            Err(e) => return Err(e),
        };

        regions.push(Pattern {
            area: polygon_area(polygon),
            mean,
            covariance,
            inverse,
        });
        pulse_and_check(progress)?;
    }
    Ok(regions)
}

impl ClassifierStrategy for IsoSegStrategy {
    type Params = IsoSegParams;

    fn name(&self) -> &'static str {
        "ISOSeg"
    }

    fn initialize(&mut self, params: &IsoSegParams) -> Result<()> {
        self.params = None;
        let t = params.acceptance_threshold;
        if !(t > 0.0 && t <= 100.0) {
            return Err(Error::invalid_parameter(
                "acceptance_threshold",
                t,
                "must be in (0, 100]",
            ));
        }
        self.params = Some(params.clone());
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.params.is_some()
    }

    fn execute<I, O>(
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
        self.execute_with_report(input, bands, polygons, output, output_band, progress)
            .map(|_| ())
    }
}
