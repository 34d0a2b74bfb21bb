//! A module for metrics to evaluate Gaussian Process models performances:
//! * prediction errors against known targets ([ErrorReport]),
//! * Q2 predictive coefficient by cross validation ([PredictScore]).

use crate::errors::{GpError, Result};
use crate::{GaussianProcess, GpParams};

use linfa::dataset::Dataset;
use linfa::{
    traits::{Fit, Predict, PredictInplace},
    Float, ParamGuard,
};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// An error metric given as its average over all points and its value at each point
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct ErrorSummary<F: Float> {
    /// Metric computed over all points
    pub average: F,
    /// Metric at each point
    pub all: Array1<F>,
}

/// Prediction errors against known targets
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct ErrorReport<F: Float> {
    /// Root mean squared error, per point value is the absolute error
    pub rmse: ErrorSummary<F>,
    /// Mean absolute error
    pub mae: ErrorSummary<F>,
    /// Signed error `prediction - target`, the average measures the bias
    pub signed: ErrorSummary<F>,
}

impl<F: Float> ErrorReport<F> {
    /// Compare `prediction` (n,) to `target` (n,)
    pub fn new(
        prediction: &ArrayBase<impl Data<Elem = F>, Ix1>,
        target: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Self> {
        if prediction.len() != target.len() {
            return Err(GpError::DimensionMismatch(format!(
                "{} predictions for {} targets",
                prediction.len(),
                target.len()
            )));
        }
        if prediction.is_empty() {
            return Err(GpError::InvalidValueError(
                "no prediction to evaluate".to_string(),
            ));
        }
        let n = F::cast(prediction.len());
        let signed = prediction - target;
        let absolute = signed.mapv(|v| num_traits::Float::abs(v));
        let sq_sum = signed.mapv(|v| v * v).sum();

        Ok(ErrorReport {
            rmse: ErrorSummary {
                average: (sq_sum / n).sqrt(),
                all: absolute.clone(),
            },
            mae: ErrorSummary {
                average: absolute.sum() / n,
                all: absolute,
            },
            signed: ErrorSummary {
                average: signed.sum() / n,
                all: signed,
            },
        })
    }
}

/// A trait for Q2 predictive coefficient cross validation score
pub trait PredictScore<F, ER, P, O>
where
    F: Float,
    ER: std::error::Error + From<linfa::error::Error>,
    P: Fit<Array2<F>, Array1<F>, ER, Object = O> + ParamGuard,
    O: PredictInplace<Array2<F>, Array1<F>>,
{
    /// Return the training data (xt, yt)
    fn training_data(&self) -> &(Array2<F>, Array1<F>);

    /// Return the model parameters
    fn params(&self) -> P;

    /// Compute quality metric Q2 with kfold cross validation
    fn q2_score(&self, kfold: usize) -> std::result::Result<F, ER> {
        let (xt, yt) = self.training_data();
        if kfold < 2 || kfold > xt.nrows() {
            return Err(ER::from(linfa::error::Error::Parameters(format!(
                "Q2 cross-validation requires 2 <= kfold <= {}, got {}",
                xt.nrows(),
                kfold
            ))));
        }
        let dataset = Dataset::new(xt.to_owned(), yt.to_owned());
        let yt_mean = yt.mean().unwrap_or_else(F::zero);
        // Predictive Residual Sum of Squares
        let mut press = F::zero();
        // Total Sum of Squares
        let mut tss = F::zero();
        for (train, valid) in dataset.fold(kfold).into_iter() {
            let params = self.params();
            let model: O = params.fit(&train)?;
            let pred = model.predict(valid.records());
            press += (valid.targets() - pred).mapv(|v| v * v).sum();
            tss += (valid.targets() - yt_mean).mapv(|v| v * v).sum();
        }
        Ok(F::one() - press / tss)
    }

    /// Q2 predictive coefficient with Leave-One-Out Cross-Validation
    fn looq2_score(&self) -> std::result::Result<F, ER> {
        self.q2_score(self.training_data().0.nrows())
    }
}

impl<F: Float> PredictScore<F, GpError, GpParams<F>, Self> for GaussianProcess<F> {
    fn training_data(&self) -> &(Array2<F>, Array1<F>) {
        &self.training_data
    }

    fn params(&self) -> GpParams<F> {
        GpParams::from(self.params.clone())
    }
}
