//! Symmetric eigendecomposition by cyclic threshold Jacobi rotations

use ndarray::{Array1, Array2, ArrayView2};
use terraclass_core::{Error, Result};

/// Relative precision at which the threshold schedule stops.
const TOLERANCE: f64 = 1e-12;
/// Sweeps allowed at one threshold level.
const MAX_SWEEPS_PER_LEVEL: usize = 50;
/// Threshold levels allowed in total.
const MAX_LEVELS: usize = 200;

/// Eigenpairs of a symmetric matrix, sorted by descending eigenvalue.
#[derive(Debug, Clone)]
pub struct Eigen {
    pub eigenvalues: Array1<f64>,
    /// Column `k` is the unit eigenvector of `eigenvalues[k]`
    pub eigenvectors: Array2<f64>,
}

/// Eigendecomposition of the symmetric matrix `m`.
///
/// Only the lower triangle of `m` is read. The rotation threshold starts at
/// the off-diagonal norm and is divided by the dimension at every level;
/// each level sweeps until no element exceeds its threshold, and the last
/// level is the first one at or below `TOLERANCE * anorm / dim`.
pub fn eigen_symmetric(m: ArrayView2<f64>) -> Result<Eigen> {
    let (rows, cols) = m.dim();
    if rows != cols {
        return Err(Error::NotSquare { rows, cols });
    }
    let n = rows;

    // Symmetrise from the lower triangle
    let mut a = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            a[[i, j]] = m[[i, j]];
            a[[j, i]] = m[[i, j]];
        }
    }
    let mut v = Array2::<f64>::eye(n);

    let mut off = 0.0;
    for i in 0..n {
        for j in 0..i {
            off += a[[i, j]] * a[[i, j]];
        }
    }
    let anorm = (2.0 * off).sqrt();
    if !anorm.is_finite() || a.diag().iter().any(|d| !d.is_finite()) {
        return Err(Error::Algorithm(
            "Eigendecomposition of a matrix with non-finite values".into(),
        ));
    }

    if anorm > 0.0 {
        let dim = n as f64;
        let final_thr = TOLERANCE * anorm / dim;
        let mut thr = anorm;

        for _ in 0..MAX_LEVELS {
            thr /= dim;
            for _ in 0..MAX_SWEEPS_PER_LEVEL {
                let mut rotated = false;
                for p in 0..n {
                    for q in (p + 1)..n {
                        if a[[p, q]].abs() >= thr && a[[p, q]] != 0.0 {
                            rotate(&mut a, &mut v, p, q);
                            rotated = true;
                        }
                    }
                }
                if !rotated {
                    break;
                }
            }
            if thr <= final_thr {
                break;
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

    let eigenvalues = Array1::from_iter(order.iter().map(|&k| a[[k, k]]));
    let mut eigenvectors = Array2::<f64>::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        eigenvectors.column_mut(dst).assign(&v.column(src));
    }

    Ok(Eigen {
        eigenvalues,
        eigenvectors,
    })
}

/// Annihilate `a[p][q]` with one Jacobi rotation, accumulating it into `v`.
fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize) {
    let n = a.nrows();
    let apq = a[[p, q]];
    let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
    let t = if theta.abs() > 1e150 {
        0.5 / theta
    } else {
        theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt())
    };
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    a[[p, p]] -= t * apq;
    a[[q, q]] += t * apq;
    a[[p, q]] = 0.0;
    a[[q, p]] = 0.0;

    for k in 0..n {
        if k != p && k != q {
            let akp = a[[k, p]];
            let akq = a[[k, q]];
            a[[k, p]] = c * akp - s * akq;
            a[[p, k]] = a[[k, p]];
            a[[k, q]] = s * akp + c * akq;
            a[[q, k]] = a[[k, q]];
        }
    }

    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = c * vkp - s * vkq;
        v[[k, q]] = s * vkp + c * vkq;
    }
}
