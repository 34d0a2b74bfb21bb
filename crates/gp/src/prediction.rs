use crate::basis::ResidualBasis;
use crate::metrics::{ErrorReport, ErrorSummary};
use linfa::Float;
use ndarray::Array1;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Options of [GaussianProcess::predict_with](crate::GaussianProcess::predict_with)
///
/// ```
/// use fitrank_gp::PredictOptions;
/// use ndarray::array;
///
/// let ytest = array![1., 2.];
/// let options = PredictOptions::default()
///     .test_targets(&ytest)
///     .validation_error(true)
///     .uncertainty(true);
/// assert!(options.validation_error);
/// ```
#[derive(Clone, Copy)]
pub struct PredictOptions<'a, F: Float> {
    /// Known targets of the test points, required by `validation_error`
    pub test_targets: Option<&'a Array1<F>>,
    /// Compute errors of the model on its own training points
    pub training_error: bool,
    /// Compute errors against `test_targets`
    pub validation_error: bool,
    /// Compute the posterior standard deviation at test points
    pub uncertainty: bool,
    /// Compute the posterior against training targets standardized by their mean
    /// and standard deviation, predictions being transformed back to the original scale.
    /// Uncertainty and variance are then given in target units: the standard deviation
    /// is multiplied by the standard deviation of the training targets (its square for
    /// the variance).
    /// No-op when the model was fitted with scaled data.
    pub standardize_target: bool,
    /// Basis of a linear model fitted on the GP residuals
    pub basis: Option<&'a dyn ResidualBasis<F>>,
}

impl<F: Float> Default for PredictOptions<'_, F> {
    fn default() -> Self {
        PredictOptions {
            test_targets: None,
            training_error: false,
            validation_error: false,
            uncertainty: false,
            standardize_target: false,
            basis: None,
        }
    }
}

impl<'a, F: Float> PredictOptions<'a, F> {
    /// Set test targets
    pub fn test_targets(mut self, targets: &'a Array1<F>) -> Self {
        self.test_targets = Some(targets);
        self
    }

    /// Enable or disable in-sample errors
    pub fn training_error(mut self, enabled: bool) -> Self {
        self.training_error = enabled;
        self
    }

    /// Enable or disable errors against test targets
    pub fn validation_error(mut self, enabled: bool) -> Self {
        self.validation_error = enabled;
        self
    }

    /// Enable or disable uncertainty
    pub fn uncertainty(mut self, enabled: bool) -> Self {
        self.uncertainty = enabled;
        self
    }

    /// Enable or disable target standardization
    pub fn standardize_target(mut self, enabled: bool) -> Self {
        self.standardize_target = enabled;
        self
    }

    /// Set the residual basis
    pub fn basis(mut self, basis: &'a dyn ResidualBasis<F>) -> Self {
        self.basis = Some(basis);
        self
    }
}

impl<F: Float> fmt::Debug for PredictOptions<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PredictOptions")
            .field("test_targets", &self.test_targets)
            .field("training_error", &self.training_error)
            .field("validation_error", &self.validation_error)
            .field("uncertainty", &self.uncertainty)
            .field("standardize_target", &self.standardize_target)
            .field("basis", &self.basis.is_some())
            .finish()
    }
}

/// Result of [GaussianProcess::predict_with](crate::GaussianProcess::predict_with),
/// optional fields are set when requested through [PredictOptions]
///
/// Root mean squared errors (`average` over points and absolute error at `all` points)
/// are reported under `validation_error.rmse` and `training_error.rmse`, also available
/// with [Prediction::validation_rmse] and [Prediction::training_rmse].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct Prediction<F: Float> {
    /// Posterior mean at test points
    pub prediction: Array1<F>,
    /// Posterior standard deviation at test points
    pub uncertainty: Option<Array1<F>>,
    /// Posterior variance at test points
    pub variance: Option<Array1<F>>,
    /// Errors against test targets
    pub validation_error: Option<ErrorReport<F>>,
    /// Errors on training points
    pub training_error: Option<ErrorReport<F>>,
    /// GP combined with a linear model of its residuals
    pub basis_analysis: Option<BasisAnalysis<F>>,
}

impl<F: Float> Prediction<F> {
    /// RMSE against test targets when validation errors were requested
    pub fn validation_rmse(&self) -> Option<&ErrorSummary<F>> {
        self.validation_error.as_ref().map(|e| &e.rmse)
    }

    /// RMSE on training points when training errors were requested
    pub fn training_rmse(&self) -> Option<&ErrorSummary<F>> {
        self.training_error.as_ref().map(|e| &e.rmse)
    }
}

/// GP prediction corrected by a linear model in the residual basis functions,
/// coefficients being estimated by generalized least squares
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct BasisAnalysis<F: Float> {
    /// Coefficients of the basis functions, on the scale of the targets used by the GP
    pub beta: Array1<F>,
    /// Corrected prediction at test points
    pub prediction: Array1<F>,
    /// Standard deviation including the coefficients estimation variance
    pub uncertainty: Option<Array1<F>>,
    /// Variance including the coefficients estimation variance
    pub variance: Option<Array1<F>>,
    /// Errors of the corrected prediction against test targets
    pub validation_error: Option<ErrorReport<F>>,
    /// Errors of the corrected prediction on training points
    pub training_error: Option<ErrorReport<F>>,
}

impl<F: Float> BasisAnalysis<F> {
    /// RMSE of the corrected prediction against test targets
    pub fn validation_rmse(&self) -> Option<&ErrorSummary<F>> {
        self.validation_error.as_ref().map(|e| &e.rmse)
    }

    /// RMSE of the corrected prediction on training points
    pub fn training_rmse(&self) -> Option<&ErrorSummary<F>> {
        self.training_error.as_ref().map(|e| &e.rmse)
    }
}
