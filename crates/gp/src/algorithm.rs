use crate::basis::ResidualBasis;
use crate::covariance::{cross_covariance, self_covariance, train_covariance, CovarianceFactors};
use crate::errors::{GpError, Result};
use crate::kernels::{to_f64, KernelSpec};
use crate::metrics::ErrorReport;
use crate::optimization::{
    negative_log_marginal_likelihood, optimize_hyperparameters, OptimizerStatus,
};
use crate::parameters::{GpParams, GpValidParams};
use crate::prediction::{BasisAnalysis, PredictOptions, Prediction};
use crate::utils::{NormalizedData, Standardizer};

use linfa::prelude::{DatasetBase, Fit, Float, PredictInplace};
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2};

use log::{info, warn};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gaussian Process regression of a scalar target from fingerprint vectors.
///
/// The GP prior is centered with a covariance given by the sum of the kernels
/// of the model. With `K` the regularized covariance of the training points `X`,
/// `y` the training targets and `k*` the covariances between a test point `x*` and
/// the training points:
/// * the posterior mean is `k*t.K^-1.y`,
/// * the posterior variance is `k(x*, x*) - k*t.K^-1.k*`.
///
/// When fitted with scaled data, features are z-scored and targets standardized,
/// predictions and variances being transformed back to the original target scale.
///
/// # Example
///
/// ```no_run
/// use fitrank_gp::{kernels::KernelSpec, GaussianProcess};
/// use linfa::prelude::*;
/// use ndarray::{concatenate, Array, Array1, Axis};
///
/// // one-dimensional test function to approximate
/// fn xsinx(x: &Array1<f64>) -> Array1<f64> {
///     (x - 3.5) * ((x - 3.5) / std::f64::consts::PI).mapv(|v| v.sin())
/// }
///
/// // training data
/// let xt = Array::linspace(0., 25., 10);
/// let yt = xsinx(&xt);
///
/// // GP with a gaussian kernel whose hyperparameters are optimized
/// let gp = GaussianProcess::params(vec![KernelSpec::gaussian()])
///     .optimize_hyperparameters(true)
///     .scale_data(true)
///     .fit(&Dataset::new(xt.insert_axis(Axis(1)), yt))
///     .expect("GP fit error");
///
/// // predictions and standard deviations at test points
/// let xtest = Array::linspace(0., 25., 26).insert_axis(Axis(1));
/// let (ytest, var) = gp.predict_valvar(&xtest).expect("GP prediction");
/// println!("{}", concatenate![Axis(1), ytest.insert_axis(Axis(1)), var.mapv(f64::sqrt).insert_axis(Axis(1))]);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize",
        deserialize = "F: Deserialize<'de>"
    ))
)]
pub struct GaussianProcess<F: Float> {
    /// Kernels with the hyperparameters used (optimized or given)
    kernels: Vec<KernelSpec<F>>,
    /// Regularization used (optimized or given)
    regularization: F,
    /// Negative log marginal likelihood of the (scaled) training targets
    nlml: F,
    /// Status of hyperparameters optimization if any
    status: Option<OptimizerStatus>,
    /// Factorization of the regularized covariance matrix of training points
    factors: CovarianceFactors<F>,
    /// K^-1.y with y the scaled training targets
    weights: Array1<F>,
    /// Training inputs
    xt_norm: NormalizedData<F>,
    /// Training outputs transform
    yt_scaler: Standardizer<F>,
    /// Training dataset (input, output)
    pub(crate) training_data: (Array2<F>, Array1<F>),
    /// Parameters used to fit this model
    pub(crate) params: GpValidParams<F>,
}

impl<F: Float> fmt::Display for GaussianProcess<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kernels: Vec<String> = self.kernels.iter().map(|k| k.to_string()).collect();
        write!(
            f,
            "GP(kernels=[{}], regularization={}, log_likelihood={})",
            kernels.join(" + "),
            self.regularization,
            self.log_marginal_likelihood(),
        )
    }
}

/// Posterior of the GP at some points on the scale of the targets used for training
struct LatentPosterior<F: Float> {
    /// Covariances between points and training points (m, n)
    kx: Array2<F>,
    /// Posterior mean (m,)
    mean: Array1<F>,
}

impl<F: Float> GaussianProcess<F> {
    /// Gp parameters contructor
    pub fn params(kernels: Vec<KernelSpec<F>>) -> GpParams<F> {
        GpParams::new(kernels)
    }

    /// Fit a GP given `params` on training points `x` (n, nx) and targets `y` (n,)
    pub fn fit_arrays(
        params: GpParams<F>,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Self> {
        let params = linfa::ParamGuard::check(params)?;
        Self::train(&params, x.view(), y.view())
    }

    /// Refit the model on new training data keeping its current kernels hyperparameters
    /// and regularization. Hyperparameters are not optimized again.
    pub fn update_data(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Self> {
        let params = GpValidParams {
            kernels: self.kernels.clone(),
            regularization: self.regularization,
            optimize_hyperparameters: false,
            ..self.params.clone()
        };
        Self::train(&params, x.view(), y.view())
    }

    fn train(params: &GpValidParams<F>, x: ArrayView2<F>, y: ArrayView1<F>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(GpError::InvalidValueError(
                "at least one training point is required".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(GpError::DimensionMismatch(format!(
                "{} training points for {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(GpError::InvalidValueError(
                "training data contain non finite values".to_string(),
            ));
        }
        for kernel in params.kernels() {
            kernel.check(x.ncols())?;
        }
        if has_duplicate_rows(&x) {
            warn!("multiple training points share the same features (at least same row twice)");
        }

        let (xt_norm, yt_scaler) = if params.scale_data() {
            (NormalizedData::new(&x), Standardizer::fit(&y))
        } else {
            (NormalizedData::identity(&x), Standardizer::identity())
        };
        let ys = yt_scaler.transform(&y);

        let (kernels, regularization, factors, nlml, status) = if params.optimize_hyperparameters()
        {
            let opt = optimize_hyperparameters(
                &xt_norm.data,
                &ys,
                params.kernels(),
                params.regularization(),
                params.optimizer(),
            )?;
            (
                opt.kernels,
                opt.regularization,
                opt.factors,
                opt.nlml,
                Some(opt.status),
            )
        } else {
            let kernels = params.kernels().to_vec();
            let k = train_covariance(&kernels, &xt_norm.data, params.regularization())?;
            let factors = CovarianceFactors::new(k, params.regularization())?;
            let nlml = negative_log_marginal_likelihood(&factors, &ys)?;
            (kernels, params.regularization(), factors, nlml, None)
        };
        let weights = factors
            .solve(&ys.view().insert_axis(Axis(1)))?
            .remove_axis(Axis(1));

        info!(
            "GP fitted on {} points: regularization={}, nlml={}",
            x.nrows(),
            to_f64(regularization),
            to_f64(nlml)
        );
        Ok(GaussianProcess {
            kernels,
            regularization,
            nlml,
            status,
            factors,
            weights,
            xt_norm,
            yt_scaler,
            training_data: (x.to_owned(), y.to_owned()),
            params: params.clone(),
        })
    }

    fn check_inputs(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
        if x.ncols() != self.xt_norm.ncols() {
            return Err(GpError::DimensionMismatch(format!(
                "test points have {} components whereas training points have {}",
                x.ncols(),
                self.xt_norm.ncols()
            )));
        }
        Ok(())
    }

    /// Posterior mean given weights `K^-1.y`
    fn latent_posterior(
        &self,
        xnorm: &Array2<F>,
        weights: &Array1<F>,
    ) -> Result<LatentPosterior<F>> {
        let kx = cross_covariance(&self.kernels, xnorm, &self.xt_norm.data)?;
        let mean = kx.dot(weights);
        Ok(LatentPosterior { kx, mean })
    }

    /// Posterior variance `k(x, x) - kxt.K^-1.kx` clamped to zero
    fn latent_variance(&self, xnorm: &Array2<F>, kx: &Array2<F>) -> Result<Array1<F>> {
        let prior = self_covariance(&self.kernels, xnorm)?;
        // kxt.K^-1.kx = |L^-1.kx|^2
        let v = self.factors.solve_lower(&kx.t())?;
        let reduction = v.mapv(|v| v * v).sum_axis(Axis(0));
        // Variance might be slightly negative depending on
        // machine precision: set to zero in that case
        Ok((prior - reduction).mapv(|v| if v < F::zero() { F::zero() } else { v }))
    }

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n scalar output values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_inputs(x)?;
        let xnorm = self.xt_norm.transform(x);
        let post = self.latent_posterior(&xnorm, &self.weights)?;
        Ok(self.yt_scaler.inverse(&post.mean))
    }

    /// Predict variance values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n variance values as (n,) column vector.
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_inputs(x)?;
        let xnorm = self.xt_norm.transform(x);
        let kx = cross_covariance(&self.kernels, &xnorm, &self.xt_norm.data)?;
        let var = self.latent_variance(&xnorm, &kx)?;
        let std2 = self.yt_scaler.std * self.yt_scaler.std;
        Ok(var.mapv(|v| v * std2))
    }

    /// Predict both output values and variance at n given `x` points of nx components
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        self.check_inputs(x)?;
        let xnorm = self.xt_norm.transform(x);
        let post = self.latent_posterior(&xnorm, &self.weights)?;
        let var = self.latent_variance(&xnorm, &post.kx)?;
        let std2 = self.yt_scaler.std * self.yt_scaler.std;
        Ok((self.yt_scaler.inverse(&post.mean), var.mapv(|v| v * std2)))
    }

    /// Predict at `x` (n, nx) with optional uncertainty, errors and residual basis analysis
    /// as requested through `options`.
    ///
    /// Uncertainty is the posterior standard deviation on the target scale.
    /// Fails with [GpError::InvalidValueError] when validation errors are requested without test targets.
    pub fn predict_with(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        options: &PredictOptions<F>,
    ) -> Result<Prediction<F>> {
        self.check_inputs(x)?;
        let test_targets = if options.validation_error {
            let targets = options.test_targets.ok_or_else(|| {
                GpError::InvalidValueError(
                    "validation error requested without test targets".to_string(),
                )
            })?;
            if targets.len() != x.nrows() {
                return Err(GpError::DimensionMismatch(format!(
                    "{} test targets for {} test points",
                    targets.len(),
                    x.nrows()
                )));
            }
            Some(targets)
        } else {
            None
        };

        let (scaler, weights) = if options.standardize_target && !self.params.scale_data() {
            let scaler = Standardizer::fit(&self.training_data.1);
            let ys = scaler.transform(&self.training_data.1);
            let weights = self
                .factors
                .solve(&ys.insert_axis(Axis(1)))?
                .remove_axis(Axis(1));
            (scaler, weights)
        } else {
            (self.yt_scaler, self.weights.clone())
        };
        let std2 = scaler.std * scaler.std;

        let xnorm = self.xt_norm.transform(x);
        let post = self.latent_posterior(&xnorm, &weights)?;
        let prediction = scaler.inverse(&post.mean);

        let latent_var = if options.uncertainty {
            Some(self.latent_variance(&xnorm, &post.kx)?)
        } else {
            None
        };
        let variance = latent_var.as_ref().map(|v| v.mapv(|v| v * std2));
        let uncertainty = variance.as_ref().map(|v| v.mapv(|v| v.sqrt()));

        let validation_error = match test_targets {
            Some(targets) => Some(ErrorReport::new(&prediction, targets)?),
            None => None,
        };

        let train_post = if options.training_error {
            Some(self.latent_posterior(&self.xt_norm.data, &weights)?)
        } else {
            None
        };
        let training_error = match &train_post {
            Some(post) => Some(ErrorReport::new(
                &scaler.inverse(&post.mean),
                &self.training_data.1,
            )?),
            None => None,
        };

        let basis_analysis = match options.basis {
            Some(basis) => Some(self.basis_analysis(
                basis,
                x,
                &post,
                latent_var.as_ref(),
                train_post.as_ref(),
                &weights,
                &scaler,
                test_targets,
            )?),
            None => None,
        };

        Ok(Prediction {
            prediction,
            uncertainty,
            variance,
            validation_error,
            training_error,
            basis_analysis,
        })
    }

    /// Explicit basis GP: `beta = (Ht.K^-1.H)^-1.Ht.K^-1.y`, with `R = H* - kxt.K^-1.H`
    /// the prediction is corrected by `R.beta` and the variance by `diag(R.(Ht.K^-1.H)^-1.Rt)`
    #[allow(clippy::too_many_arguments)]
    fn basis_analysis(
        &self,
        basis: &dyn ResidualBasis<F>,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        post: &LatentPosterior<F>,
        latent_var: Option<&Array1<F>>,
        train_post: Option<&LatentPosterior<F>>,
        weights: &Array1<F>,
        scaler: &Standardizer<F>,
        test_targets: Option<&Array1<F>>,
    ) -> Result<BasisAnalysis<F>> {
        let xt = &self.training_data.0;
        let h = basis.design(xt);
        let h_test = basis.design(&x.to_owned());
        if h.nrows() != xt.nrows() || h_test.nrows() != x.nrows() || h.ncols() != h_test.ncols() {
            return Err(GpError::DimensionMismatch(format!(
                "basis design matrices ({}, {}) and ({}, {}) do not match ({}, p) and ({}, p)",
                h.nrows(),
                h.ncols(),
                h_test.nrows(),
                h_test.ncols(),
                xt.nrows(),
                x.nrows()
            )));
        }
        if h.ncols() == 0 {
            return Err(GpError::InvalidValueError(
                "residual basis has no function".to_string(),
            ));
        }
        let kinv_h = self.factors.solve(&h)?;
        let a = h.t().dot(&kinv_h);
        let a_factors = CovarianceFactors::new(a, F::zero()).map_err(|_| {
            GpError::InvalidValueError(
                "residual basis functions are linearly dependent on training points".to_string(),
            )
        })?;
        // Ht.K^-1.y = (K^-1.H)t.y = Ht.weights
        let hty = h.t().dot(weights).insert_axis(Axis(1));
        let beta = a_factors.solve(&hty)?.remove_axis(Axis(1));

        let r = &h_test - &post.kx.dot(&kinv_h);
        let prediction = scaler.inverse(&(&post.mean + &r.dot(&beta)));

        let std2 = scaler.std * scaler.std;
        let variance = match latent_var {
            Some(var) => {
                let u = a_factors.solve_lower(&r.t())?;
                let extra = u.mapv(|v| v * v).sum_axis(Axis(0));
                Some((var + &extra).mapv(|v| v * std2))
            }
            None => None,
        };
        let uncertainty = variance.as_ref().map(|v| v.mapv(|v| v.sqrt()));

        let validation_error = match test_targets {
            Some(targets) => Some(ErrorReport::new(&prediction, targets)?),
            None => None,
        };
        let training_error = match train_post {
            Some(tpost) => {
                let r_train = &h - &tpost.kx.dot(&kinv_h);
                let pred_train = scaler.inverse(&(&tpost.mean + &r_train.dot(&beta)));
                Some(ErrorReport::new(&pred_train, &self.training_data.1)?)
            }
            None => None,
        };

        Ok(BasisAnalysis {
            beta,
            prediction,
            uncertainty,
            variance,
            validation_error,
            training_error,
        })
    }

    /// Kernels with the hyperparameters used by the model
    pub fn kernels(&self) -> &[KernelSpec<F>] {
        &self.kernels
    }

    /// Regularization used by the model
    pub fn regularization(&self) -> F {
        self.regularization
    }

    /// Log marginal likelihood of the training targets (scaled if data scaling is enabled)
    pub fn log_marginal_likelihood(&self) -> F {
        -self.nlml
    }

    /// Hyperparameters optimization status, `None` when hyperparameters were not optimized
    pub fn optimizer_status(&self) -> Option<OptimizerStatus> {
        self.status
    }

    /// Retrieve number of training points and input dimension
    pub fn dims(&self) -> (usize, usize) {
        (self.training_data.0.nrows(), self.training_data.0.ncols())
    }

    /// Training dataset (input, output)
    pub fn training_data(&self) -> &(Array2<F>, Array1<F>) {
        &self.training_data
    }

    /// Parameters used to fit this model
    pub fn fit_params(&self) -> &GpValidParams<F> {
        &self.params
    }
}

fn has_duplicate_rows<F: Float>(x: &ArrayView2<F>) -> bool {
    let rows: Vec<_> = x.rows().into_iter().collect();
    rows.iter()
        .enumerate()
        .any(|(i, r)| rows[i + 1..].iter().any(|other| other == r))
}

impl<F, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for GaussianProcess<F>
where
    F: Float,
    D: Data<Elem = F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        match self.predict(x) {
            Ok(values) => *y = values,
            Err(err) => {
                warn!("GP prediction failed: {err}");
                y.fill(F::nan());
            }
        }
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

impl<F: Float, D: Data<Elem = F>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError>
    for GpValidParams<F>
{
    type Object = GaussianProcess<F>;

    /// Fit GP: hyperparameters are optimized if requested then the
    /// regularized covariance matrix of the training points is factorized
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        GaussianProcess::train(self, dataset.records().view(), dataset.targets().view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{ConstantBasis, FnBasis, LinearBasis};
    use crate::kernels::KernelKind;
    use crate::optimization::OptimizerConfig;
    use approx::assert_abs_diff_eq;
    use linfa::prelude::Dataset;
    use ndarray::{array, Array, Zip};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use paste::paste;
    use rand_xoshiro::Xoshiro256Plus;

    /// 10 points (i, i/2) with targets 1..10
    fn line_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array::from_shape_fn((10, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                0.5 * i as f64
            }
        });
        let y = Array::linspace(1., 10., 10);
        (x, y)
    }

    fn rosenb(x: &Array2<f64>) -> Array1<f64> {
        let mut y = Array1::zeros(x.nrows());
        Zip::from(&mut y).and(x.rows()).for_each(|yi, xi| {
            *yi = 100. * (xi[1] - xi[0] * xi[0]).powi(2) + (1. - xi[0]).powi(2);
        });
        y
    }

    fn random_data(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let x = Array::random_using((n, 2), Uniform::new(-1., 1.), &mut rng);
        let y = rosenb(&x);
        (x, y)
    }

    fn fit_line(reg: f64) -> GaussianProcess<f64> {
        let (x, y) = line_data();
        GaussianProcess::params(vec![KernelSpec::gaussian().with_width(1.).with_scaling(1.)])
            .regularization(reg)
            .fit(&Dataset::new(x, y))
            .expect("GP fit error")
    }

    #[test]
    fn test_interpolates_training_targets() {
        let (x, y) = line_data();
        let gp = fit_line(1e-3);
        let pred = gp
            .predict_with(&x, &PredictOptions::default().uncertainty(true))
            .expect("GP prediction");
        assert_abs_diff_eq!(pred.prediction, y, epsilon = 0.05);

        let loose = fit_line(1.)
            .predict_with(&x, &PredictOptions::default().uncertainty(true))
            .expect("GP prediction");
        let tight = pred.uncertainty.unwrap();
        let loose = loose.uncertainty.unwrap();
        Zip::from(&tight)
            .and(&loose)
            .for_each(|t, l| assert!(t < l, "{t} should be less than {l}"));
    }

    #[test]
    fn test_training_error_beats_mean_predictor() {
        let (x, y) = random_data(20, 42);
        let mean = y.mean().unwrap();
        let naive_rmse = (y.mapv(|v| (v - mean) * (v - mean)).sum() / y.len() as f64).sqrt();
        for kind in [KernelKind::Gaussian, KernelKind::Laplacian, KernelKind::Matern32] {
            let gp = GaussianProcess::params(vec![KernelSpec::new(kind).with_width(0.5)])
                .regularization(1e-2)
                .fit(&Dataset::new(x.clone(), y.clone()))
                .expect("GP fit error");
            let pred = gp
                .predict_with(&x, &PredictOptions::default().training_error(true))
                .expect("GP prediction");
            let training = pred.training_error.unwrap();
            assert!(training.rmse.average <= naive_rmse);
            assert_eq!(training.rmse.all.len(), 20);
        }
    }

    #[test]
    fn test_standardize_target_round_trip() {
        let (x, y) = line_data();
        let gp = fit_line(1e-3);
        let raw = gp.predict_with(&x, &PredictOptions::default()).unwrap();
        let standardized = gp
            .predict_with(&x, &PredictOptions::default().standardize_target(true))
            .unwrap();
        assert_abs_diff_eq!(raw.prediction, standardized.prediction, epsilon = 1e-2);
        assert_abs_diff_eq!(standardized.prediction, y, epsilon = 0.05);
    }

    #[test]
    fn test_standardize_target_scales_uncertainty() {
        let gp = fit_line(1e-3);
        let xtest = array![[2.5, 1.25], [12., 6.]];
        let raw = gp
            .predict_with(&xtest, &PredictOptions::default().uncertainty(true))
            .unwrap();
        let standardized = gp
            .predict_with(
                &xtest,
                &PredictOptions::default()
                    .uncertainty(true)
                    .standardize_target(true),
            )
            .unwrap();
        // sample standard deviation of targets 1..10
        let ystd = 3.0276503540974917;
        let raw_std = raw.uncertainty.unwrap();
        assert!(raw_std[1] > 0.5);
        assert_abs_diff_eq!(
            standardized.uncertainty.unwrap(),
            &raw_std * ystd,
            epsilon = 1e-8
        );
        assert_abs_diff_eq!(
            standardized.variance.unwrap(),
            raw.variance.unwrap() * ystd * ystd,
            epsilon = 1e-8
        );
    }

    #[test]
    fn test_validation_error() {
        let (x, y) = random_data(30, 0);
        let (xtest, ytest) = random_data(10, 1);
        let gp = GaussianProcess::params(vec![KernelSpec::gaussian().with_width(0.5)])
            .scale_data(true)
            .fit(&Dataset::new(x, y))
            .expect("GP fit error");
        let pred = gp
            .predict_with(
                &xtest,
                &PredictOptions::default()
                    .test_targets(&ytest)
                    .validation_error(true)
                    .uncertainty(true),
            )
            .expect("GP prediction");
        assert_eq!(pred.validation_rmse(), pred.validation_error.as_ref().map(|e| &e.rmse));
        assert!(pred.training_rmse().is_none());
        let report = pred.validation_error.unwrap();
        assert_eq!(report.rmse.all.len(), 10);
        assert!(report.rmse.average >= report.mae.average);
        assert_abs_diff_eq!(
            pred.uncertainty.unwrap().mapv(|v| v * v),
            pred.variance.unwrap(),
            epsilon = 1e-8
        );

        assert!(matches!(
            gp.predict_with(&xtest, &PredictOptions::default().validation_error(true)),
            Err(GpError::InvalidValueError(_))
        ));
        let short = array![1., 2.];
        assert!(matches!(
            gp.predict_with(
                &xtest,
                &PredictOptions::default()
                    .test_targets(&short)
                    .validation_error(true)
            ),
            Err(GpError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_valvar_consistency() {
        let (x, y) = random_data(15, 3);
        let (xtest, _) = random_data(5, 4);
        let gp = GaussianProcess::params(vec![KernelSpec::new(KernelKind::Matern52)])
            .scale_data(true)
            .fit(&Dataset::new(x, y))
            .expect("GP fit error");
        let (val, var) = gp.predict_valvar(&xtest).unwrap();
        assert_abs_diff_eq!(val, gp.predict(&xtest).unwrap(), epsilon = 1e-10);
        assert_abs_diff_eq!(var, gp.predict_var(&xtest).unwrap(), epsilon = 1e-10);
        let pred = gp
            .predict_with(&xtest, &PredictOptions::default().uncertainty(true))
            .unwrap();
        assert_abs_diff_eq!(pred.prediction, val, epsilon = 1e-10);
        assert_abs_diff_eq!(pred.variance.unwrap(), var, epsilon = 1e-10);
        let mut inplace = Array1::zeros(xtest.nrows());
        gp.predict_inplace(&xtest, &mut inplace);
        assert_abs_diff_eq!(inplace, val, epsilon = 1e-10);
    }

    #[test]
    fn test_basis_analysis() {
        // affine trend plus small oscillation
        let x = Array::linspace(0., 10., 20).insert_axis(Axis(1));
        let y = x.column(0).mapv(|v: f64| 3. * v + 2. + 0.1 * v.sin());
        let gp = GaussianProcess::params(vec![KernelSpec::gaussian().with_width(2.)])
            .regularization(1e-4)
            .fit(&Dataset::new(x.clone(), y.clone()))
            .expect("GP fit error");
        let xtest = array![[12.], [15.]];
        let ytest = xtest.column(0).mapv(|v: f64| 3. * v + 2. + 0.1 * v.sin());
        let basis = LinearBasis();
        let pred = gp
            .predict_with(
                &xtest,
                &PredictOptions::default()
                    .test_targets(&ytest)
                    .validation_error(true)
                    .training_error(true)
                    .uncertainty(true)
                    .basis(&basis),
            )
            .expect("GP prediction");
        let analysis = pred.basis_analysis.unwrap();
        // the linear model captures the trend the zero mean GP cannot extrapolate
        assert_abs_diff_eq!(analysis.beta[1], 3., epsilon = 0.1);
        let gp_error = pred.validation_error.unwrap().rmse.average;
        let basis_error = analysis.validation_error.unwrap().rmse.average;
        assert!(basis_error < gp_error);
        assert!(basis_error < 0.5);
        assert!(analysis.training_error.unwrap().rmse.average < 0.05);
        let gp_var = pred.variance.unwrap();
        let basis_var = analysis.variance.unwrap();
        Zip::from(&gp_var)
            .and(&basis_var)
            .for_each(|g, b| assert!(b >= g));
    }

    #[test]
    fn test_degenerate_basis() {
        let (x, y) = line_data();
        let gp = fit_line(1e-3);
        let basis = FnBasis(|x: &Array2<f64>| Array2::zeros((x.nrows(), 1)));
        assert!(matches!(
            gp.predict_with(&x, &PredictOptions::default().basis(&basis)),
            Err(GpError::InvalidValueError(_))
        ));
        let constant = ConstantBasis();
        let pred = gp
            .predict_with(&x, &PredictOptions::default().basis(&constant))
            .unwrap();
        assert_abs_diff_eq!(pred.basis_analysis.unwrap().prediction, y, epsilon = 0.05);
    }

    #[test]
    fn test_update_data() {
        let (x, y) = random_data(20, 5);
        let gp = GaussianProcess::params(vec![KernelSpec::gaussian()])
            .optimize_hyperparameters(true)
            .optimizer(OptimizerConfig::default().n_start(1))
            .fit(&Dataset::new(
                x.slice(ndarray::s![..15, ..]).to_owned(),
                y.slice(ndarray::s![..15]).to_owned(),
            ))
            .expect("GP fit error");
        assert!(gp.optimizer_status().is_some());
        let updated = gp.update_data(&x, &y).expect("GP update");
        assert_eq!(updated.kernels(), gp.kernels());
        assert_eq!(updated.regularization(), gp.regularization());
        assert!(updated.optimizer_status().is_none());
        assert_eq!(updated.dims(), (20, 2));
    }

    #[test]
    fn test_optimized_likelihood_not_worse() {
        let (x, y) = random_data(20, 7);
        let params = GaussianProcess::params(vec![KernelSpec::gaussian().with_width(0.05)])
            .regularization(1e-2)
            .scale_data(true);
        let fixed = params.clone().fit(&Dataset::new(x.clone(), y.clone())).unwrap();
        let optimized = params
            .optimize_hyperparameters(true)
            .fit(&Dataset::new(x, y))
            .unwrap();
        assert!(optimized.log_marginal_likelihood() >= fixed.log_marginal_likelihood());
        println!("{optimized}");
    }

    #[test]
    fn test_fit_errors() {
        let (x, _) = line_data();
        assert!(matches!(
            GaussianProcess::fit_arrays(
                GaussianProcess::params(vec![KernelSpec::gaussian()]),
                &x,
                &array![1., 2.]
            ),
            Err(GpError::DimensionMismatch(_))
        ));
        assert!(matches!(
            GaussianProcess::fit_arrays(
                GaussianProcess::params(vec![
                    KernelSpec::gaussian().with_widths(array![1., 2., 3.])
                ]),
                &x,
                &Array::linspace(1., 10., 10)
            ),
            Err(GpError::InvalidKernelSpec(_))
        ));
        let gp = fit_line(1e-3);
        assert!(matches!(
            gp.predict(&array![[1., 2., 3.]]),
            Err(GpError::DimensionMismatch(_))
        ));
    }

    macro_rules! test_gp_variance {
        ($kind:ident) => {
            paste! {
                #[test]
                fn [<test_gp_variance_non_negative_ $kind:snake>]() {
                    let (x, y) = random_data(25, 11);
                    let kernel = KernelSpec::new(KernelKind::$kind).with_width(0.3);
                    let gp = GaussianProcess::params(vec![kernel])
                        .regularization(1e-6)
                        .scale_data(true)
                        .fit(&Dataset::new(x.clone(), y))
                        .expect("GP fit error");
                    let var = gp.predict_var(&x).expect("GP variance");
                    assert!(var.iter().all(|v| *v >= 0.));
                    let (xtest, _) = random_data(10, 12);
                    let var = gp.predict_var(&xtest).expect("GP variance");
                    assert!(var.iter().all(|v| *v >= 0.));
                }
            }
        };
    }

    test_gp_variance!(Gaussian);
    test_gp_variance!(Laplacian);
    test_gp_variance!(Quadratic);
    test_gp_variance!(Matern32);
    test_gp_variance!(Matern52);
}
