//! Covariance matrices built from a composite kernel, the sum of one or more [KernelSpec].
//!
//! The train covariance is regularized on its diagonal before being factorized:
//! `K = sum_k K_k(x, x) + regularization * I`.

use crate::errors::{GpError, Result};
use crate::kernels::{to_f64, KernelSpec};
use linfa::Float;
use linfa_linalg::{cholesky::*, eigh::*, triangular::*, LinalgError};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_stats::QuantileExt;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

fn check_kernels<F: Float>(kernels: &[KernelSpec<F>]) -> Result<()> {
    if kernels.is_empty() {
        return Err(GpError::InvalidKernelSpec(
            "at least one kernel is required".to_string(),
        ));
    }
    Ok(())
}

/// Regularized covariance matrix (n, n) of the training points `x` (n, nx)
pub fn train_covariance<F: Float>(
    kernels: &[KernelSpec<F>],
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    regularization: F,
) -> Result<Array2<F>> {
    if !(regularization >= F::zero() && regularization.is_finite()) {
        return Err(GpError::InvalidValueError(format!(
            "regularization should be a non negative value, got {}",
            regularization
        )));
    }
    let mut k = cross_covariance(kernels, x, x)?;
    k.diag_mut().mapv_inplace(|v| v + regularization);
    Ok(k)
}

/// Covariance matrix (m, n) between test points `x_test` (m, nx) and training points `x_train` (n, nx)
pub fn cross_covariance<F: Float>(
    kernels: &[KernelSpec<F>],
    x_test: &ArrayBase<impl Data<Elem = F>, Ix2>,
    x_train: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    check_kernels(kernels)?;
    let mut k = Array2::zeros((x_test.nrows(), x_train.nrows()));
    for kernel in kernels {
        k += &kernel.matrix(x_test, x_train)?;
    }
    Ok(k)
}

/// Prior variances k(x_i, x_i) of the composite kernel for each row of `x`
pub fn self_covariance<F: Float>(
    kernels: &[KernelSpec<F>],
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array1<F>> {
    check_kernels(kernels)?;
    let mut d = Array1::zeros(x.nrows());
    for kernel in kernels {
        d += &kernel.diag(x)?;
    }
    Ok(d)
}

/// Smallest eigenvalue of a symmetric matrix
pub fn min_eigenvalue<F: Float>(matrix: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<F> {
    let (eigvals, _) = matrix.to_owned().eigh_into()?;
    eigvals
        .min()
        .map(|v| *v)
        .map_err(|_| GpError::InvalidValueError("no eigenvalue to compare".to_string()))
}

/// Cholesky factorization of a regularized covariance matrix K = L.Lt.
///
/// Only L is stored: solves go through two triangular solves and K^-1 is
/// built on request.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct CovarianceFactors<F: Float> {
    /// Lower triangular Cholesky factor L
    chol: Array2<F>,
}

impl<F: Float> CovarianceFactors<F> {
    /// Factorize the covariance `matrix` which was regularized with `regularization`.
    ///
    /// Fails with [GpError::SingularCovariance] when the matrix is not positive definite.
    pub fn new(matrix: Array2<F>, regularization: F) -> Result<Self> {
        let singular = || GpError::SingularCovariance {
            regularization: to_f64(regularization),
        };
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(singular());
        }
        let chol = matrix.cholesky().map_err(|err| match err {
            LinalgError::NotPositiveDefinite => singular(),
            err => GpError::LinalgError(err),
        })?;
        if chol.diag().iter().any(|v| *v <= F::zero() || !v.is_finite()) {
            return Err(singular());
        }
        Ok(CovarianceFactors { chol })
    }

    /// Lower triangular Cholesky factor
    pub fn chol(&self) -> &Array2<F> {
        &self.chol
    }

    /// Inverse of the covariance matrix, computed from the Cholesky factor
    pub fn inverse(&self) -> Result<Array2<F>> {
        solve_with_chol(&self.chol, &Array2::eye(self.chol.nrows()))
    }

    /// Size n of the (n, n) factorized matrix
    pub fn size(&self) -> usize {
        self.chol.nrows()
    }

    /// Solve K.X = rhs
    pub fn solve(&self, rhs: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        solve_with_chol(&self.chol, rhs)
    }

    /// Solve L.X = rhs
    pub fn solve_lower(&self, rhs: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        Ok(self.chol.solve_triangular(rhs, UPLO::Lower)?)
    }

    /// log |K|, twice the sum of the logarithms of the Cholesky diagonal
    pub fn log_det(&self) -> F {
        self.chol.diag().mapv(|v| v.ln()).sum() * F::cast(2.)
    }
}

fn solve_with_chol<F: Float>(
    chol: &Array2<F>,
    rhs: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    let z = chol.solve_triangular(rhs, UPLO::Lower)?;
    Ok(chol.t().solve_triangular_into(z, UPLO::Upper)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::KernelKind;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};

    fn xtrain() -> Array2<f64> {
        Array::from_shape_fn((10, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                0.5 * i as f64
            }
        })
    }

    #[test]
    fn test_composite_kernel_is_a_sum() {
        let x = array![[0., 1.], [1., 0.], [2., 2.]];
        let k1 = KernelSpec::gaussian().with_width(1.5);
        let k2 = KernelSpec::linear().with_scaling(0.1);
        let k = train_covariance(&[k1.clone(), k2.clone()], &x, 0.5).unwrap();
        let expected =
            k1.matrix(&x, &x).unwrap() + k2.matrix(&x, &x).unwrap() + Array2::<f64>::eye(3) * 0.5;
        assert_abs_diff_eq!(k, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(k, k.t(), epsilon = 1e-12);

        let diag = self_covariance(&[k1, k2], &x).unwrap();
        assert_abs_diff_eq!(diag + 0.5, k.diag(), epsilon = 1e-12);
    }

    #[test]
    fn test_cross_covariance_shape() {
        let x = xtrain();
        let xtest = array![[0.5, 0.25], [3., 4.]];
        let kernels = [KernelSpec::laplacian()];
        let k = cross_covariance(&kernels, &xtest, &x).unwrap();
        assert_eq!(k.dim(), (2, 10));
        assert!(matches!(
            cross_covariance(&kernels, &array![[1.]], &x),
            Err(GpError::DimensionMismatch(_))
        ));
        assert!(matches!(
            cross_covariance::<f64>(&[], &xtest, &x),
            Err(GpError::InvalidKernelSpec(_))
        ));
    }

    #[test]
    fn test_factors_inverse() {
        let x = xtrain();
        let k = train_covariance(&[KernelSpec::gaussian()], &x, 1e-3).unwrap();
        let factors = CovarianceFactors::new(k.clone(), 1e-3).unwrap();
        assert_eq!(factors.size(), 10);
        let inverse = factors.inverse().unwrap();
        assert_abs_diff_eq!(k.dot(&inverse), Array2::<f64>::eye(10), epsilon = 1e-6);
        let l = factors.chol();
        assert_abs_diff_eq!(l.dot(&l.t()), k, epsilon = 1e-10);
    }

    #[test]
    fn test_factors_solve_without_inverse() {
        let x = xtrain();
        let k = train_covariance(&[KernelSpec::gaussian().with_width(0.5)], &x, 1e-2).unwrap();
        let factors = CovarianceFactors::new(k.clone(), 1e-2).unwrap();
        let rhs = Array::linspace(1., 10., 10).insert_axis(ndarray::Axis(1));
        let sol = factors.solve(&rhs).unwrap();
        assert_abs_diff_eq!(k.dot(&sol), rhs, epsilon = 1e-8);
        assert_abs_diff_eq!(
            sol,
            factors.inverse().unwrap().dot(&rhs),
            epsilon = 1e-8
        );
        let logdet = factors.log_det();
        let lambda_min = min_eigenvalue(&k).unwrap();
        assert!(logdet.is_finite());
        assert!(logdet >= 10. * lambda_min.ln() - 1e-8);
    }

    #[test]
    fn test_singular_covariance() {
        // duplicated rows with no regularization
        let x = array![[1., 1.], [1., 1.], [2., 0.]];
        let k = train_covariance(&[KernelSpec::gaussian()], &x, 0.).unwrap();
        match CovarianceFactors::new(k, 0.) {
            Err(GpError::SingularCovariance { regularization }) => assert_eq!(regularization, 0.),
            Err(err) => panic!("unexpected error {err}"),
            Ok(_) => panic!("singular covariance expected"),
        }
        let k = train_covariance(&[KernelSpec::gaussian()], &x, 1e-2).unwrap();
        assert!(CovarianceFactors::new(k, 1e-2).is_ok());
    }

    #[test]
    fn test_min_eigenvalue_increases_with_regularization() {
        let x = xtrain();
        let kernels = [KernelSpec::new(KernelKind::Matern52).with_width(2.)];
        let mut previous = f64::NEG_INFINITY;
        for reg in [0., 1e-6, 1e-3, 1e-1, 1., 10.] {
            let k = train_covariance(&kernels, &x, reg).unwrap();
            let lambda = min_eigenvalue(&k).unwrap();
            assert!(lambda >= previous - 1e-10);
            previous = lambda;
        }
        assert!(previous > 9.);
    }

    #[test]
    fn test_negative_regularization() {
        assert!(matches!(
            train_covariance(&[KernelSpec::gaussian()], &xtrain(), -1.),
            Err(GpError::InvalidValueError(_))
        ));
    }
}
