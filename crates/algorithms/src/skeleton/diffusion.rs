//! Gradient vector diffusion

use terraclass_core::progress::{pulse_and_check, start_stage};
use terraclass_core::{Progress, Result};
use terraclass_parallel::Executor;

use super::fields::{offset, VectorField, NEIGHBOURS};

/// Pixels at this distance from the border are never updated.
pub const DIFFUSION_MARGIN: usize = 4;

/// Stopping rule of [`diffuse`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionSettings {
    /// Stop once the largest relative change of an iteration is below this value
    pub threshold: f64,
    /// Weight of the neighbour average in the update, in (0, 1]
    pub regularization: f64,
    /// Iteration cap, 0 for none
    pub max_iterations: usize,
}

/// Iterations performed and the residue (largest relative change) of each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffusionReport {
    pub iterations: usize,
    pub residues: Vec<f64>,
}

/// Updated vectors of one row plus the largest relative change in it.
struct RowUpdate {
    x: Vec<f64>,
    y: Vec<f64>,
    residue: f64,
}

/// Diffuse `field` in place.
///
/// Every iteration replaces each pixel at least [`DIFFUSION_MARGIN`] pixels
/// inside the border by `r * avg + (1 - r) * old`, where `avg` is the mean
/// of the 8 neighbours whose magnitude is at least the pixel's own. Pixels
/// without such a neighbour keep their vector. The residue of an iteration
/// is the largest `|new - old| / |old|` over the updated pixels; a zero
/// vector that becomes non-zero counts as a change of 1, so the stopping
/// point does not depend on the field's scale. Rows of one iteration read
/// the previous iteration only, so they are computed independently by
/// `executor` and written back after the join.
pub fn diffuse(
    field: &mut VectorField,
    settings: &DiffusionSettings,
    executor: &Executor,
    progress: Option<&dyn Progress>,
) -> Result<DiffusionReport> {
    let (rows, cols) = field.shape();
    let mut report = DiffusionReport::default();
    if rows <= 2 * DIFFUSION_MARGIN || cols <= 2 * DIFFUSION_MARGIN {
        return Ok(report);
    }

    start_stage(progress, "Diffusing gradient vectors", settings.max_iterations as u64);
    tracing::debug!(rows, cols, threads = executor.threads(), "starting vector diffusion");
    let r = settings.regularization;
    let (row_lo, row_hi) = (DIFFUSION_MARGIN, rows - DIFFUSION_MARGIN);
    let (col_lo, col_hi) = (DIFFUSION_MARGIN, cols - DIFFUSION_MARGIN);

    // Ping-pong buffers: `field` holds the current state, `next` the update
    let mut next = field.clone();
    loop {
        let current: &VectorField = field;
        let updates = executor.par_map(row_lo..row_hi, |row| {
            let mut update = RowUpdate {
                x: Vec::with_capacity(col_hi - col_lo),
                y: Vec::with_capacity(col_hi - col_lo),
                residue: 0.0,
            };
            for col in col_lo..col_hi {
                let (old_x, old_y) = (current.x[[row, col]], current.y[[row, col]]);
                let mag = current.magnitude(row, col);

                let mut sum_x = 0.0;
                let mut sum_y = 0.0;
                let mut count = 0usize;
                for d in NEIGHBOURS {
                    let (nr, nc) = offset(row, col, d);
                    if current.magnitude(nr, nc) >= mag {
                        sum_x += current.x[[nr, nc]];
                        sum_y += current.y[[nr, nc]];
                        count += 1;
                    }
                }

                let (new_x, new_y) = if count > 0 {
                    let n = count as f64;
                    (
                        r * (sum_x / n) + (1.0 - r) * old_x,
                        r * (sum_y / n) + (1.0 - r) * old_y,
                    )
                } else {
                    (old_x, old_y)
                };
                let change = (new_x - old_x).hypot(new_y - old_y);
                let relative = if mag > 0.0 {
                    change / mag
                } else if change > 0.0 {
                    1.0
                } else {
                    0.0
                };
                update.residue = update.residue.max(relative);
                update.x.push(new_x);
                update.y.push(new_y);
            }
            update
        });

        let mut residue = 0.0f64;
        for (row, update) in (row_lo..row_hi).zip(updates) {
            for (i, col) in (col_lo..col_hi).enumerate() {
                next.x[[row, col]] = update.x[i];
                next.y[[row, col]] = update.y[i];
            }
            residue = residue.max(update.residue);
        }
        std::mem::swap(field, &mut next);

        report.iterations += 1;
        report.residues.push(residue);
        tracing::debug!(iteration = report.iterations, residue, "diffusion iteration");
        pulse_and_check(progress)?;

        if residue < settings.threshold {
            break;
        }
        if settings.max_iterations > 0 && report.iterations >= settings.max_iterations {
            break;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::fields::{gradient_field, smooth};
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use terraclass_parallel::ProcessingMode;

    fn settings(max_iterations: usize) -> DiffusionSettings {
        DiffusionSettings {
            threshold: 1e-9,
            regularization: 0.5,
            max_iterations,
        }
    }

    fn bump(n: usize) -> Array2<f64> {
        let c = (n as f64 - 1.0) / 2.0;
        Array2::from_shape_fn((n, n), |(r, col)| {
            let d2 = (r as f64 - c).powi(2) + (col as f64 - c).powi(2);
            100.0 * (-d2 / 40.0).exp()
        })
    }

    #[test]
    fn test_zero_field_converges_immediately() {
        let mut field = VectorField::zeros(12, 12);
        let report = diffuse(&mut field, &settings(0), &Executor::sequential(), None).unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(report.residues, vec![0.0]);
    }

    #[test]
    fn test_small_field_untouched() {
        let mut field = VectorField::zeros(8, 20);
        field.x.fill(1.0);
        let before = field.clone();
        let report = diffuse(&mut field, &settings(10), &Executor::sequential(), None).unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(field, before);
    }

    #[test]
    fn test_margin_unchanged() {
        let mut field = gradient_field(&smooth(&bump(20)));
        let before = field.clone();
        diffuse(&mut field, &settings(5), &Executor::sequential(), None).unwrap();
        for row in 0..20 {
            for col in 0..20 {
                let inner = (4..16).contains(&row) && (4..16).contains(&col);
                if !inner {
                    assert_eq!(field.x[[row, col]], before.x[[row, col]]);
                    assert_eq!(field.y[[row, col]], before.y[[row, col]]);
                }
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let start = gradient_field(&smooth(&bump(32)));

        let mut seq = start.clone();
        let seq_report = diffuse(&mut seq, &settings(15), &Executor::sequential(), None).unwrap();

        let exec = Executor::new(ProcessingMode::ParallelWith(4)).unwrap();
        let mut par = start.clone();
        let par_report = diffuse(&mut par, &settings(15), &exec, None).unwrap();

        assert_eq!(seq_report, par_report);
        assert_eq!(seq, par);
    }

    /// Uniform `(a, 0)` field with one `(0, a)` vector at the centre.
    fn perturbed(n: usize, a: f64) -> VectorField {
        let mut field = VectorField::zeros(n, n);
        field.x.fill(a);
        field.x[[n / 2, n / 2]] = 0.0;
        field.y[[n / 2, n / 2]] = a;
        field
    }

    #[test]
    fn test_residue_is_relative() {
        let mut field = perturbed(12, 0.1);
        let report = diffuse(&mut field, &settings(1), &Executor::sequential(), None).unwrap();
        // The centre moves from (0, 0.1) to (0.05, 0.05)
        assert_relative_eq!(report.residues[0], 0.5f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_stopping_point_independent_of_scale() {
        let mut stop = settings(50);
        stop.threshold = 0.1;

        let mut small = perturbed(12, 0.1);
        let small_report = diffuse(&mut small, &stop, &Executor::sequential(), None).unwrap();
        let mut large = perturbed(12, 1.6);
        let large_report = diffuse(&mut large, &stop, &Executor::sequential(), None).unwrap();

        assert!(small_report.iterations > 1);
        assert!(small_report.iterations < 50);
        assert_eq!(small_report.iterations, large_report.iterations);
        for (a, b) in small_report.residues.iter().zip(&large_report.residues) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_residue_decreases_on_perturbed_field() {
        let mut field = perturbed(16, 1.0);
        let report = diffuse(&mut field, &settings(40), &Executor::sequential(), None).unwrap();
        assert_eq!(report.residues.len(), report.iterations);
        assert!(report.residues.iter().all(|r| r.is_finite() && *r >= 0.0));
        let first = report.residues[0];
        let last = *report.residues.last().unwrap();
        assert!(last <= first);
    }
}
