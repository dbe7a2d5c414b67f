//! LU factorization with partial pivoting

use ndarray::{Array2, ArrayView2};
use terraclass_core::{Error, Result};

/// Relative pivot magnitude below which a matrix is treated as singular.
const SINGULAR_EPS: f64 = 1e-14;

/// Packed `L\U` factors of a square matrix: `P·A = L·U`, with the unit
/// diagonal of `L` implicit.
#[derive(Debug, Clone)]
pub(crate) struct Lu {
    lu: Array2<f64>,
    perm: Vec<usize>,
    /// +1 or -1 depending on the number of row swaps
    sign: f64,
    /// Whether a pivot fell below the singularity threshold
    singular: bool,
}

impl Lu {
    pub(crate) fn factorize(m: ArrayView2<f64>) -> Result<Self> {
        let (rows, cols) = m.dim();
        if rows != cols {
            return Err(Error::NotSquare { rows, cols });
        }
        let n = rows;
        let mut lu = m.to_owned();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut sign = 1.0;
        let mut singular = false;

        let scale = lu.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let tol = SINGULAR_EPS * scale;

        for col in 0..n {
            // Find pivot (max absolute value in column)
            let mut max_val = lu[[col, col]].abs();
            let mut max_row = col;
            for row in (col + 1)..n {
                let val = lu[[row, col]].abs();
                if val > max_val {
                    max_val = val;
                    max_row = row;
                }
            }

            if max_val <= tol || !max_val.is_finite() {
                singular = true;
                continue;
            }

            if max_row != col {
                for j in 0..n {
                    lu.swap([col, j], [max_row, j]);
                }
                perm.swap(col, max_row);
                sign = -sign;
            }

            let pivot = lu[[col, col]];
            for row in (col + 1)..n {
                let factor = lu[[row, col]] / pivot;
                lu[[row, col]] = factor;
                for j in (col + 1)..n {
                    lu[[row, j]] -= factor * lu[[col, j]];
                }
            }
        }

        Ok(Self {
            lu,
            perm,
            sign,
            singular,
        })
    }

    pub(crate) fn dim(&self) -> usize {
        self.perm.len()
    }

    /// Product of the pivots times the permutation sign; zero when singular.
    pub(crate) fn determinant(&self) -> f64 {
        if self.singular {
            return 0.0;
        }
        self.lu.diag().iter().fold(self.sign, |acc, v| acc * v)
    }

    /// Solve `A·X = I` by forward and back substitution.
    pub(crate) fn inverse(&self) -> Result<Array2<f64>> {
        let n = self.dim();
        if self.singular {
            return Err(Error::SingularMatrix { size: n });
        }

        let mut inv = Array2::<f64>::zeros((n, n));
        let mut y = vec![0.0; n];
        for k in 0..n {
            // Column k of P·I
            for i in 0..n {
                let mut sum = if self.perm[i] == k { 1.0 } else { 0.0 };
                for j in 0..i {
                    sum -= self.lu[[i, j]] * y[j];
                }
                y[i] = sum;
            }
            for i in (0..n).rev() {
                let mut sum = y[i];
                for j in (i + 1)..n {
                    sum -= self.lu[[i, j]] * inv[[j, k]];
                }
                inv[[i, k]] = sum / self.lu[[i, i]];
            }
        }

        if inv.iter().any(|v| !v.is_finite()) {
            return Err(Error::SingularMatrix { size: n });
        }
        Ok(inv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_permutation_sign() {
        // One row swap is needed for the first pivot
        let m = array![[0.0, 1.0], [1.0, 0.0]];
        let lu = Lu::factorize(m.view()).unwrap();
        assert_relative_eq!(lu.determinant(), -1.0);
    }

    #[test]
    fn test_singular_flag() {
        let m = array![[1.0, 2.0], [2.0, 4.0]];
        let lu = Lu::factorize(m.view()).unwrap();
        assert_eq!(lu.determinant(), 0.0);
        assert!(matches!(lu.inverse(), Err(Error::SingularMatrix { size: 2 })));
    }
}
