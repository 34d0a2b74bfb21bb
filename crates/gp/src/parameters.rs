use crate::errors::{GpError, Result};
use crate::kernels::{to_f64, KernelSpec};
use crate::optimization::OptimizerConfig;
use linfa::{Float, ParamGuard};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Default regularization added to the covariance matrix diagonal
pub const GP_DEFAULT_REGULARIZATION: f64 = 1e-3;

/// A set of validated GP parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize",
        deserialize = "F: Deserialize<'de>"
    ))
)]
pub struct GpValidParams<F: Float> {
    /// Kernels summed up to build the covariance
    pub(crate) kernels: Vec<KernelSpec<F>>,
    /// Value added to the covariance matrix diagonal before factorization
    pub(crate) regularization: F,
    /// Whether kernels hyperparameters are optimized at fit time
    pub(crate) optimize_hyperparameters: bool,
    /// Whether features are z-scored and targets standardized at fit time
    pub(crate) scale_data: bool,
    /// Hyperparameters optimizer settings
    pub(crate) optimizer: OptimizerConfig,
}

impl<F: Float> Default for GpValidParams<F> {
    fn default() -> GpValidParams<F> {
        GpValidParams {
            kernels: vec![KernelSpec::default()],
            regularization: F::cast(GP_DEFAULT_REGULARIZATION),
            optimize_hyperparameters: false,
            scale_data: false,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl<F: Float> GpValidParams<F> {
    /// Get kernels
    pub fn kernels(&self) -> &[KernelSpec<F>] {
        &self.kernels
    }

    /// Get regularization
    pub fn regularization(&self) -> F {
        self.regularization
    }

    /// Whether hyperparameters are optimized
    pub fn optimize_hyperparameters(&self) -> bool {
        self.optimize_hyperparameters
    }

    /// Whether training data are scaled
    pub fn scale_data(&self) -> bool {
        self.scale_data
    }

    /// Get optimizer settings
    pub fn optimizer(&self) -> &OptimizerConfig {
        &self.optimizer
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [GP algorithm](struct.GaussianProcess.html).
pub struct GpParams<F: Float>(GpValidParams<F>);

impl<F: Float> GpParams<F> {
    /// A constructor for GP parameters given the kernels summed up in the covariance
    pub fn new(kernels: Vec<KernelSpec<F>>) -> GpParams<F> {
        Self(GpValidParams {
            kernels,
            ..Default::default()
        })
    }

    /// A constructor for GP parameters from validated parameters
    pub fn new_from_valid(params: &GpValidParams<F>) -> Self {
        Self(params.clone())
    }

    /// Set kernels.
    pub fn kernels(mut self, kernels: Vec<KernelSpec<F>>) -> Self {
        self.0.kernels = kernels;
        self
    }

    /// Set regularization.
    ///
    /// Regularization is added to the covariance matrix diagonal, it should be positive.
    pub fn regularization(mut self, regularization: F) -> Self {
        self.0.regularization = regularization;
        self
    }

    /// Enable or disable hyperparameters optimization at fit time.
    pub fn optimize_hyperparameters(mut self, optimize: bool) -> Self {
        self.0.optimize_hyperparameters = optimize;
        self
    }

    /// Enable or disable data scaling at fit time.
    ///
    /// Features are z-scored column by column, targets are standardized
    /// and predictions transformed back to the original scale.
    pub fn scale_data(mut self, scale_data: bool) -> Self {
        self.0.scale_data = scale_data;
        self
    }

    /// Set the hyperparameters optimizer settings
    pub fn optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.0.optimizer = optimizer;
        self
    }
}

impl<F: Float> From<GpValidParams<F>> for GpParams<F> {
    fn from(valid: GpValidParams<F>) -> Self {
        GpParams(valid)
    }
}

impl<F: Float> ParamGuard for GpParams<F> {
    type Checked = GpValidParams<F>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.kernels.is_empty() {
            return Err(GpError::InvalidKernelSpec(
                "at least one kernel is required".to_string(),
            ));
        }
        let reg = self.0.regularization;
        if !(reg > F::zero() && reg.is_finite()) {
            return Err(GpError::InvalidValueError(format!(
                "`regularization` should be positive, got {}",
                to_f64(reg)
            )));
        }
        if self.0.optimize_hyperparameters {
            self.0.optimizer.check()?;
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
