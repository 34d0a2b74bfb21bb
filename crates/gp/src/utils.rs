use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A structure to store (n, xdim) matrix data and its mean and standard deviation vectors.
#[derive(Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub(crate) struct NormalizedData<F: Float> {
    /// normalized data
    pub data: Array2<F>,
    /// mean vector computed from data
    pub mean: Array1<F>,
    /// standard deviation vector computed from data
    pub std: Array1<F>,
}

impl<F: Float> Clone for NormalizedData<F> {
    fn clone(&self) -> NormalizedData<F> {
        NormalizedData {
            data: self.data.to_owned(),
            mean: self.mean.to_owned(),
            std: self.std.to_owned(),
        }
    }
}

impl<F: Float> NormalizedData<F> {
    /// Constructor
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> NormalizedData<F> {
        let (data, mean, std) = normalize(x);
        NormalizedData { data, mean, std }
    }

    /// Data kept as is: zero mean and unit standard deviation
    pub fn identity(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> NormalizedData<F> {
        NormalizedData {
            data: x.to_owned(),
            mean: Array1::zeros(x.ncols()),
            std: Array1::ones(x.ncols()),
        }
    }

    /// Dimension of data points
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Apply the stored transform to other data points
    pub fn transform(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        (x - &self.mean) / &self.std
    }
}

pub fn normalize<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> (Array2<F>, Array1<F>, Array1<F>) {
    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let mut x_std = if x.nrows() > 1 {
        x.std_axis(Axis(0), F::one())
    } else {
        Array1::ones(x.ncols())
    };
    x_std.mapv_inplace(|v| if v == F::zero() { F::one() } else { v });
    let xnorm = (x - &x_mean) / &x_std;

    (xnorm, x_mean, x_std)
}

/// Scalar standardization transform of target values: `(y - mean) / std`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Standardizer<F: Float> {
    /// Mean of the target values
    pub mean: F,
    /// Standard deviation of the target values (1 when constant)
    pub std: F,
}

impl<F: Float> Standardizer<F> {
    /// Transform leaving values unchanged
    pub fn identity() -> Self {
        Standardizer {
            mean: F::zero(),
            std: F::one(),
        }
    }

    /// Transform computed from the given values
    pub fn fit(y: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Self {
        let mean = y.mean().unwrap_or_else(F::zero);
        let std = if y.len() > 1 { y.std(F::one()) } else { F::one() };
        let std = if std == F::zero() || !std.is_finite() {
            F::one()
        } else {
            std
        };
        Standardizer { mean, std }
    }

    /// Standardized values
    pub fn transform(&self, y: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array1<F> {
        y.mapv(|v| (v - self.mean) / self.std)
    }

    /// Values back in the original scale
    pub fn inverse(&self, y: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array1<F> {
        y.mapv(|v| v * self.std + self.mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_normalized_matrix() {
        let x = array![[1., 2.], [3., 4.]];
        let xnorm = NormalizedData::new(&x);
        assert_eq!(xnorm.ncols(), 2);
        assert_eq!(array![2., 3.], xnorm.mean);
        assert_eq!(array![f64::sqrt(2.), f64::sqrt(2.)], xnorm.std);
        assert_abs_diff_eq!(xnorm.transform(&x), xnorm.data, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_column() {
        let x = array![[1., 5.], [3., 5.], [2., 5.]];
        let xnorm = NormalizedData::new(&x);
        assert_eq!(xnorm.std[1], 1.);
        assert_abs_diff_eq!(xnorm.data.column(1), array![0., 0., 0.], epsilon = 1e-12);
    }

    #[test]
    fn test_standardizer() {
        let y = array![1., 2., 3., 4., 5.];
        let st = Standardizer::fit(&y);
        assert_abs_diff_eq!(st.mean, 3., epsilon = 1e-12);
        assert_abs_diff_eq!(st.std, f64::sqrt(2.5), epsilon = 1e-12);
        let ys = st.transform(&y);
        assert_abs_diff_eq!(ys.mean().unwrap(), 0., epsilon = 1e-12);
        assert_abs_diff_eq!(st.inverse(&ys), y, epsilon = 1e-12);

        let constant = Standardizer::fit(&array![2., 2.]);
        assert_eq!(constant.std, 1.);
    }
}
