//! Residual bases used to isolate a parametric trend from the GP prediction.
//!
//! A [ResidualBasis] maps features (n, nx) to a design matrix (n, p) whose columns are the
//! basis functions of a linear model fitted on the GP residuals by generalized least squares
//! (see [crate::PredictOptions]).
//!
//! The following bases are implemented:
//! * constant,
//! * linear (affine),
//! * quadratic,
//! * identity (features used as is),
//! * any function through [FnBasis].

use linfa::Float;
use ndarray::{concatenate, s, Array2, Axis};
use paste::paste;
use std::fmt;

/// A trait for basis functions of the residual linear model
pub trait ResidualBasis<F: Float> {
    /// Design matrix (n, p) of the basis functions evaluated at `x` (n, nx)
    fn design(&self, x: &Array2<F>) -> Array2<F>;
}

/// Constant basis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ConstantBasis();

impl<F: Float> ResidualBasis<F> for ConstantBasis {
    /// h(x) = [1]
    fn design(&self, x: &Array2<F>) -> Array2<F> {
        Array2::<F>::ones((x.nrows(), 1))
    }
}

/// Affine basis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LinearBasis();

impl<F: Float> ResidualBasis<F> for LinearBasis {
    /// h(x) = [1, x_1, ..., x_n]
    fn design(&self, x: &Array2<F>) -> Array2<F> {
        concatenate![Axis(1), Array2::ones((x.nrows(), 1)), x.to_owned()]
    }
}

/// 2-degree polynomial basis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct QuadraticBasis();

impl<F: Float> ResidualBasis<F> for QuadraticBasis {
    /// h(x) = [1, { x_i, i = 1,...,n }, { x_i * x_j, (i,j) = 1,...,n, j >= i }]
    fn design(&self, x: &Array2<F>) -> Array2<F> {
        let mut res = concatenate![Axis(1), Array2::ones((x.nrows(), 1)), x.to_owned()];
        for k in 0..x.ncols() {
            let part = x.slice(s![.., k..]).to_owned() * x.slice(s![.., k..k + 1]);
            res = concatenate![Axis(1), res, part]
        }
        res
    }
}

/// Features used as basis functions without intercept
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct IdentityBasis();

impl<F: Float> ResidualBasis<F> for IdentityBasis {
    /// h(x) = [x_1, ..., x_n]
    fn design(&self, x: &Array2<F>) -> Array2<F> {
        x.to_owned()
    }
}

/// Basis given as a function of the features
///
/// ```
/// use fitrank_gp::basis::{FnBasis, ResidualBasis};
/// use ndarray::{array, Array2, Axis};
///
/// // sum of the features as single basis function
/// let basis = FnBasis(|x: &Array2<f64>| x.sum_axis(Axis(1)).insert_axis(Axis(1)));
/// let h = basis.design(&array![[1., 2.], [3., 4.]]);
/// assert_eq!(h, array![[3.], [7.]]);
/// ```
#[derive(Clone, Copy)]
pub struct FnBasis<T>(pub T);

impl<F, T> ResidualBasis<F> for FnBasis<T>
where
    F: Float,
    T: Fn(&Array2<F>) -> Array2<F>,
{
    fn design(&self, x: &Array2<F>) -> Array2<F> {
        (self.0)(x)
    }
}

impl<T> fmt::Debug for FnBasis<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FnBasis")
    }
}

macro_rules! declare_basis_util_impls {
    ($basis:ident) => {
        paste! {
            impl fmt::Display for [<$basis Basis>] {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{}Basis", stringify!($basis))
                }
            }
        }
    };
}

declare_basis_util_impls!(Constant);
declare_basis_util_impls!(Linear);
declare_basis_util_impls!(Quadratic);
declare_basis_util_impls!(Identity);
