//! Dense matrix kernels for band-sized matrices
//!
//! Determinant, inverse, pseudo-inverse and symmetric eigendecomposition
//! over `ndarray::Array2<f64>`. Everything here is O(n³) and meant for
//! covariance matrices whose dimension is the band count.

mod eigen;
mod lu;

pub use eigen::{eigen_symmetric, Eigen};

use lu::Lu;
use ndarray::{Array2, ArrayView2};
use terraclass_core::Result;

/// Dense matrix of `f64`.
pub type Matrix = Array2<f64>;

/// Determinant by LU factorization with partial pivoting.
///
/// A 0x0 matrix has determinant 0 and a singular one yields 0 without error.
pub fn determinant(m: ArrayView2<f64>) -> Result<f64> {
    let lu = Lu::factorize(m)?;
    if lu.dim() == 0 {
        return Ok(0.0);
    }
    Ok(lu.determinant())
}

/// `ln(det(m))`, or `None` when the determinant is not positive.
pub fn log_determinant(m: ArrayView2<f64>) -> Result<Option<f64>> {
    let det = determinant(m)?;
    Ok((det > 0.0).then(|| det.ln()))
}

/// Inverse of a square matrix.
///
/// Fails with `SingularMatrix` when a pivot vanishes relative to the largest
/// element. A 0x0 matrix inverts to itself.
pub fn inverse(m: ArrayView2<f64>) -> Result<Matrix> {
    Lu::factorize(m)?.inverse()
}

/// Moore-Penrose style pseudo-inverse for full-rank matrices.
///
/// `(MᵗM)⁻¹Mᵗ` for tall matrices, `Mᵗ(MMᵗ)⁻¹` for wide ones, the plain
/// inverse for square ones.
pub fn pseudo_inverse(m: ArrayView2<f64>) -> Result<Matrix> {
    let (rows, cols) = m.dim();
    let mt = m.t();
    if rows > cols {
        let mtm = mt.dot(&m);
        Ok(inverse(mtm.view())?.dot(&mt))
    } else if rows < cols {
        let mmt = m.dot(&mt);
        Ok(mt.dot(&inverse(mmt.view())?))
    } else {
        inverse(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use terraclass_core::Error;

    fn assert_matrix_eq(a: &Matrix, b: &Matrix, eps: f64) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = eps);
        }
    }

    fn sample_3x3() -> Matrix {
        array![[4.0, -2.0, 1.0], [3.0, 6.0, -4.0], [2.0, 1.0, 8.0]]
    }

    #[test]
    fn test_determinant() {
        let m = sample_3x3();
        // 4(48+4) + 2(24+8) + (3-12)
        assert_abs_diff_eq!(determinant(m.view()).unwrap(), 263.0, epsilon = 1e-9);
        assert_abs_diff_eq!(determinant(array![[5.0]].view()).unwrap(), 5.0);
    }

    #[test]
    fn test_determinant_edge_cases() {
        let empty = Matrix::zeros((0, 0));
        assert_eq!(determinant(empty.view()).unwrap(), 0.0);

        let singular = array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 1.0, 1.0]];
        assert_eq!(determinant(singular.view()).unwrap(), 0.0);

        let rect = Matrix::zeros((2, 3));
        assert!(matches!(
            determinant(rect.view()),
            Err(Error::NotSquare { rows: 2, cols: 3 })
        ));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let m = sample_3x3();
        let inv = inverse(m.view()).unwrap();
        assert_matrix_eq(&m.dot(&inv), &Matrix::eye(3), 1e-12);

        let back = inverse(inv.view()).unwrap();
        assert_matrix_eq(&back, &m, 1e-10);
    }

    #[test]
    fn test_inverse_singular() {
        let m = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(matches!(
            inverse(m.view()),
            Err(Error::SingularMatrix { size: 2 })
        ));
        assert!(inverse(Matrix::zeros((3, 3)).view()).is_err());
        assert_eq!(inverse(Matrix::zeros((0, 0)).view()).unwrap().dim(), (0, 0));
    }

    #[test]
    fn test_pseudo_inverse_tall_and_wide() {
        let tall = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let pinv = pseudo_inverse(tall.view()).unwrap();
        assert_eq!(pinv.dim(), (2, 3));
        // Left inverse
        assert_matrix_eq(&pinv.dot(&tall), &Matrix::eye(2), 1e-12);

        let wide = tall.t().to_owned();
        let pinv = pseudo_inverse(wide.view()).unwrap();
        assert_eq!(pinv.dim(), (3, 2));
        // Right inverse
        assert_matrix_eq(&wide.dot(&pinv), &Matrix::eye(2), 1e-12);
    }

    #[test]
    fn test_pseudo_inverse_rank_deficient() {
        let tall = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        assert!(pseudo_inverse(tall.view()).is_err());
    }

    #[test]
    fn test_log_determinant() {
        let m = array![[2.0, 0.0], [0.0, 3.0]];
        assert_abs_diff_eq!(
            log_determinant(m.view()).unwrap().unwrap(),
            6.0f64.ln(),
            epsilon = 1e-12
        );
        let neg = array![[-1.0, 0.0], [0.0, 1.0]];
        assert!(log_determinant(neg.view()).unwrap().is_none());
    }

    #[test]
    fn test_eigen_reconstruction() {
        let m = array![
            [4.0, 1.0, 0.5, 0.2],
            [1.0, 3.0, 0.3, 0.1],
            [0.5, 0.3, 2.0, 0.4],
            [0.2, 0.1, 0.4, 1.0]
        ];
        let e = eigen_symmetric(m.view()).unwrap();
        for w in e.eigenvalues.as_slice().unwrap().windows(2) {
            assert!(w[0] >= w[1]);
        }
        let lambda = Matrix::from_diag(&e.eigenvalues);
        let rebuilt = e.eigenvectors.dot(&lambda).dot(&e.eigenvectors.t());
        assert_matrix_eq(&rebuilt, &m, 1e-9);
        // Orthonormal eigenvectors
        assert_matrix_eq(&e.eigenvectors.t().dot(&e.eigenvectors), &Matrix::eye(4), 1e-9);
    }
}
