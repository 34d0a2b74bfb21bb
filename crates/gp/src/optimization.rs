//! Kernel hyperparameters optimization.
//!
//! Kernel widths, kernel scalings and optionally the regularization are searched on a
//! log10 scale within bounds using the gradient-free COBYLA optimizer started from the
//! given hyperparameters and from `n_start` random points (multistart).
//! The minimized objective is either the negative log marginal likelihood
//! `0.5 * (yt.K^-1.y + log|K| + n.log(2pi))` or a k-fold cross-validation RMSE.

use crate::covariance::{cross_covariance, train_covariance, CovarianceFactors};
use crate::errors::{GpError, Result};
use crate::kernels::{to_f64, KernelSpec};

use linfa::dataset::{Dataset, DatasetBase};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

use log::{debug, warn};
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::time::Instant;

/// Default number of random starts in addition to the given hyperparameters
pub const OPTIM_N_START: usize = 4;
/// Minimum of function evaluations for COBYLA optimizer
pub const COBYLA_MIN_EVAL: usize = 25;
/// Default maximum of function evaluations for one COBYLA run
pub const COBYLA_MAX_EVAL: usize = 200;

/// Objective minimized by the hyperparameters optimization
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Objective {
    /// Negative log marginal likelihood of the training targets
    #[default]
    LogMarginalLikelihood,
    /// Root mean squared error of a k-fold cross-validation
    CrossValidation {
        /// Number of folds
        kfold: usize,
    },
}

/// Outcome of the optimizer budget
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum OptimizerStatus {
    /// The retained start met the convergence tolerance
    Converged,
    /// The retained start used all its evaluations without meeting the tolerance,
    /// its hyperparameters are the best found so far
    BudgetExhausted,
}

/// Configuration of the hyperparameters optimization
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct OptimizerConfig {
    /// Minimized objective
    pub objective: Objective,
    /// Number of random starts in addition to the given hyperparameters
    pub n_start: usize,
    /// Maximum number of objective evaluations per start
    pub max_eval: usize,
    /// Relative tolerance on the objective used as convergence criterion
    pub ftol_rel: f64,
    /// Initial step of COBYLA on log10 scale
    pub rhobeg: f64,
    /// Seed of the random starts generator
    pub seed: u64,
    /// Whether the regularization is optimized along with kernel hyperparameters
    pub optimize_regularization: bool,
    /// Search bounds of kernel widths
    pub width_bounds: (f64, f64),
    /// Search bounds of kernel scalings
    pub scaling_bounds: (f64, f64),
    /// Search bounds of the regularization
    pub regularization_bounds: (f64, f64),
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            objective: Objective::default(),
            n_start: OPTIM_N_START,
            max_eval: COBYLA_MAX_EVAL,
            ftol_rel: 1e-4,
            rhobeg: 0.5,
            seed: 42,
            optimize_regularization: true,
            width_bounds: (1e-2, 1e2),
            scaling_bounds: (1e-2, 1e2),
            regularization_bounds: (1e-8, 1.),
        }
    }
}

impl OptimizerConfig {
    /// Set the minimized objective
    pub fn objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Set the number of random starts
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.n_start = n_start;
        self
    }

    /// Set the max number of objective evaluations per start.
    /// Given max_eval is raised to [COBYLA_MIN_EVAL] if smaller.
    pub fn max_eval(mut self, max_eval: usize) -> Self {
        self.max_eval = COBYLA_MIN_EVAL.max(max_eval);
        self
    }

    /// Set the relative tolerance on the objective
    pub fn ftol_rel(mut self, ftol_rel: f64) -> Self {
        self.ftol_rel = ftol_rel;
        self
    }

    /// Set the seed of the random starts
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable the regularization search
    pub fn optimize_regularization(mut self, optimize: bool) -> Self {
        self.optimize_regularization = optimize;
        self
    }

    /// Set the widths search bounds
    pub fn width_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.width_bounds = (lower, upper);
        self
    }

    /// Set the scalings search bounds
    pub fn scaling_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.scaling_bounds = (lower, upper);
        self
    }

    /// Set the regularization search bounds
    pub fn regularization_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.regularization_bounds = (lower, upper);
        self
    }

    /// Check the configuration is usable
    pub fn check(&self) -> Result<()> {
        let bounds = [
            ("width", self.width_bounds),
            ("scaling", self.scaling_bounds),
            ("regularization", self.regularization_bounds),
        ];
        for (name, (lo, up)) in bounds {
            if !(lo > 0. && up.is_finite() && lo < up) {
                return Err(GpError::InvalidValueError(format!(
                    "{name} bounds should verify 0 < lower < upper, got ({lo}, {up})"
                )));
            }
        }
        if !(self.ftol_rel > 0. && self.rhobeg > 0.) {
            return Err(GpError::InvalidValueError(format!(
                "optimizer tolerance and initial step should be positive, got {} and {}",
                self.ftol_rel, self.rhobeg
            )));
        }
        if let Objective::CrossValidation { kfold } = self.objective {
            if kfold < 2 {
                return Err(GpError::InvalidValueError(format!(
                    "cross-validation requires at least 2 folds, got {kfold}"
                )));
            }
        }
        Ok(())
    }
}

/// Result of [optimize_hyperparameters]
#[derive(Clone, Debug)]
pub struct OptimizedHyperparameters<F: Float> {
    /// Kernels with optimized hyperparameters
    pub kernels: Vec<KernelSpec<F>>,
    /// Regularization, optimized or not depending on the configuration
    pub regularization: F,
    /// Best objective value
    pub objective_value: f64,
    /// Negative log marginal likelihood of the training targets for the optimized hyperparameters
    pub nlml: F,
    /// Factorization of the covariance matrix for the optimized hyperparameters
    pub factors: CovarianceFactors<F>,
    /// Total number of objective evaluations over all starts
    pub n_eval: usize,
    /// Convergence status of the retained start
    pub status: OptimizerStatus,
}

pub(crate) struct CobylaParams {
    pub rhobeg: f64,
    pub ftol_rel: f64,
    pub maxeval: usize,
}

/// Negative log marginal likelihood `0.5 * (yt.K^-1.y + log|K| + n.log(2pi))`
/// of targets `y` given the factorized covariance of the training points
pub fn negative_log_marginal_likelihood<F: Float>(
    factors: &CovarianceFactors<F>,
    y: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<F> {
    let n = y.len();
    let size = factors.size();
    if size != n {
        return Err(GpError::DimensionMismatch(format!(
            "{n} targets for a ({size}, {size}) covariance matrix"
        )));
    }
    // K^-1 = L^-t.L^-1 so yt.K^-1.y = |L^-1.y|^2
    let alpha = factors.solve_lower(&y.view().insert_axis(Axis(1)))?;
    let fit = alpha.mapv(|v| v * v).sum();
    let norm = F::cast(n as f64 * (2. * std::f64::consts::PI).ln());
    Ok(F::cast(0.5) * (fit + factors.log_det() + norm))
}

type Fold<F> = (
    DatasetBase<Array2<F>, Array1<F>>,
    DatasetBase<Array2<F>, Array1<F>>,
);

/// Hyperparameters of the kernels (and regularization) flattened on log10 scale
struct SearchSpace<'a, F: Float> {
    kernels: &'a [KernelSpec<F>],
    regularization: F,
    optimize_regularization: bool,
    bounds: Vec<(f64, f64)>,
}

impl<'a, F: Float> SearchSpace<'a, F> {
    fn new(kernels: &'a [KernelSpec<F>], regularization: F, config: &OptimizerConfig) -> Self {
        let log_bounds = |(lo, up): (f64, f64)| (lo.log10(), up.log10());
        let mut bounds = vec![];
        for kernel in kernels {
            let n_width = kernel.n_hyperparameters() - 1;
            bounds.extend(std::iter::repeat(log_bounds(config.width_bounds)).take(n_width));
            bounds.push(log_bounds(config.scaling_bounds));
        }
        if config.optimize_regularization {
            bounds.push(log_bounds(config.regularization_bounds));
        }
        SearchSpace {
            kernels,
            regularization,
            optimize_regularization: config.optimize_regularization,
            bounds,
        }
    }

    fn dim(&self) -> usize {
        self.bounds.len()
    }

    /// Current hyperparameters clipped to the bounds
    fn initial(&self) -> Vec<f64> {
        let mut params: Vec<f64> = self
            .kernels
            .iter()
            .flat_map(|k| k.log10_hyperparameters())
            .collect();
        if self.optimize_regularization {
            params.push(to_f64(self.regularization).log10());
        }
        params
            .iter()
            .zip(self.bounds.iter())
            .map(|(v, (lo, up))| v.clamp(*lo, *up))
            .collect()
    }

    fn decode(&self, params: &[f64]) -> (Vec<KernelSpec<F>>, F) {
        let mut offset = 0;
        let kernels = self
            .kernels
            .iter()
            .map(|k| {
                let n = k.n_hyperparameters();
                let spec = k.with_log10_hyperparameters(&params[offset..offset + n]);
                offset += n;
                spec
            })
            .collect();
        let regularization = if self.optimize_regularization {
            F::cast(10f64.powf(params[offset]))
        } else {
            self.regularization
        };
        (kernels, regularization)
    }
}

/// Build multistart points: current hyperparameters then `n_start` points drawn
/// uniformly within the log10 bounds
fn prepare_multistart(
    param0: Vec<f64>,
    bounds: &[(f64, f64)],
    n_start: usize,
    seed: u64,
) -> Array2<f64> {
    let dim = bounds.len();
    let mut starts = Array2::zeros((n_start + 1, dim));
    starts.row_mut(0).assign(&Array1::from_vec(param0));
    if n_start > 0 {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let unit = Array2::random_using((n_start, dim), Uniform::new(0., 1.), &mut rng);
        for (i, row) in unit.rows().into_iter().enumerate() {
            let mut start = starts.row_mut(i + 1);
            for (j, u) in row.iter().enumerate() {
                let (lo, up) = bounds[j];
                start[j] = lo + u * (up - lo);
            }
        }
    }
    starts
}

/// Negative log marginal likelihood for the given kernels and regularization
fn nlml_value<F: Float>(
    kernels: &[KernelSpec<F>],
    regularization: F,
    x: &ArrayView2<F>,
    y: &ArrayView1<F>,
) -> Result<F> {
    let k = train_covariance(kernels, x, regularization)?;
    let factors = CovarianceFactors::new(k, regularization)?;
    negative_log_marginal_likelihood(&factors, y)
}

/// Cross-validated RMSE for the given kernels and regularization
fn cv_rmse<F: Float>(kernels: &[KernelSpec<F>], regularization: F, folds: &[Fold<F>]) -> Result<F> {
    let mut sse = F::zero();
    let mut count = 0;
    for (train, valid) in folds {
        let k = train_covariance(kernels, train.records(), regularization)?;
        let factors = CovarianceFactors::new(k, regularization)?;
        let weights = factors.solve(&train.targets().view().insert_axis(Axis(1)))?;
        let kx = cross_covariance(kernels, valid.records(), train.records())?;
        let pred = kx.dot(&weights).remove_axis(Axis(1));
        sse += (valid.targets() - &pred).mapv(|v| v * v).sum();
        count += pred.len();
    }
    Ok((sse / F::cast(count.max(1))).sqrt())
}

/// Optimize gp hyper parameters given an initial guess and bounds with cobyla.
/// Returns the best objective value, the corresponding parameters and the number of evaluations.
pub(crate) fn optimize_params<ObjF>(
    objfn: ObjF,
    param0: &[f64],
    bounds: &[(f64, f64)],
    cobyla: CobylaParams,
) -> (f64, Vec<f64>, usize)
where
    ObjF: Fn(&[f64]) -> f64,
{
    use cobyla::{minimize, Func, StopTols};

    let cons: Vec<&dyn Func<()>> = vec![];
    let n_eval = Cell::new(0usize);

    let res = minimize(
        |x: &[f64], _u: &mut ()| {
            n_eval.set(n_eval.get() + 1);
            objfn(x)
        },
        param0,
        bounds,
        &cons,
        (),
        cobyla.maxeval,
        cobyla::RhoBeg::All(cobyla.rhobeg),
        Some(StopTols {
            ftol_rel: cobyla.ftol_rel,
            ..StopTols::default()
        }),
    );
    match res {
        Ok((_, x_opt, fval)) => {
            let fval = if f64::is_nan(fval) {
                f64::INFINITY
            } else {
                fval
            };
            (fval, x_opt, n_eval.get())
        }
        Err((status, x_opt, _)) => {
            warn!("Cobyla optimizer failed with status={status:?}");
            (f64::INFINITY, x_opt, n_eval.get())
        }
    }
}

/// Search kernels hyperparameters (and regularization if configured) of a GP
/// trained on `x` (n, nx) and `y` (n,) starting from `kernels` and `regularization`.
///
/// Hyperparameters making the covariance matrix not positive definite are rejected
/// through an infinite objective value. The retained start is the one with the lowest
/// objective value, ties being broken by start index, so that a given seed always
/// gives the same result.
///
/// Fails with [GpError::LikelihoodComputationError] when no start leads to a finite objective.
pub fn optimize_hyperparameters<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    kernels: &[KernelSpec<F>],
    regularization: F,
    config: &OptimizerConfig,
) -> Result<OptimizedHyperparameters<F>> {
    if x.nrows() != y.len() {
        return Err(GpError::DimensionMismatch(format!(
            "{} training points for {} targets",
            x.nrows(),
            y.len()
        )));
    }
    if kernels.is_empty() {
        return Err(GpError::InvalidKernelSpec(
            "at least one kernel is required".to_string(),
        ));
    }
    for kernel in kernels {
        kernel.check(x.ncols())?;
    }
    config.check()?;
    let (x, y) = (x.view(), y.view());

    let folds: Vec<Fold<F>> = match config.objective {
        Objective::LogMarginalLikelihood => vec![],
        Objective::CrossValidation { kfold } => {
            if kfold > x.nrows() {
                return Err(GpError::InvalidValueError(format!(
                    "{kfold} folds requested for {} training points",
                    x.nrows()
                )));
            }
            Dataset::new(x.to_owned(), y.to_owned()).fold(kfold)
        }
    };

    let space = SearchSpace::new(kernels, regularization, config);
    let objfn = |params: &[f64]| -> f64 {
        // check params as optimizer may return nan values
        if params.iter().any(|v| !v.is_finite()) {
            return f64::INFINITY;
        }
        let (kernels, reg) = space.decode(params);
        let value = match config.objective {
            Objective::LogMarginalLikelihood => nlml_value(&kernels, reg, &x, &y),
            Objective::CrossValidation { .. } => cv_rmse(&kernels, reg, &folds),
        };
        match value {
            Ok(v) if v.is_finite() => to_f64(v),
            _ => f64::INFINITY,
        }
    };

    let starts = prepare_multistart(space.initial(), &space.bounds, config.n_start, config.seed);
    debug!(
        "Optimize {} hyperparameters with {} starts and bounds = {:?}",
        space.dim(),
        starts.nrows(),
        space.bounds
    );
    let now = Instant::now();
    let results: Vec<(f64, Vec<f64>, usize)> = (0..starts.nrows())
        .into_par_iter()
        .map(|i| {
            let param0 = starts.row(i).to_vec();
            optimize_params(
                objfn,
                &param0,
                &space.bounds,
                CobylaParams {
                    rhobeg: config.rhobeg,
                    ftol_rel: config.ftol_rel,
                    maxeval: config.max_eval,
                },
            )
        })
        .collect();
    debug!("elapsed optim = {:?}", now.elapsed().as_millis());

    let n_eval = results.iter().map(|r| r.2).sum();
    let (best_index, best) = results
        .iter()
        .enumerate()
        .fold(None, |acc: Option<(usize, &(f64, Vec<f64>, usize))>, (i, r)| match acc {
            Some((_, b)) if b.0 <= r.0 => acc,
            _ if r.0.is_finite() => Some((i, r)),
            _ => acc,
        })
        .ok_or_else(|| {
            GpError::LikelihoodComputationError(
                "no admissible hyperparameters found: covariance matrix never positive definite"
                    .to_string(),
            )
        })?;
    let status = if best.2 >= config.max_eval {
        warn!(
            "Hyperparameters optimization start #{best_index} exhausted its budget of {} evaluations",
            config.max_eval
        );
        OptimizerStatus::BudgetExhausted
    } else {
        OptimizerStatus::Converged
    };

    let (kernels, regularization) = space.decode(&best.1);
    let k = train_covariance(&kernels, &x, regularization)?;
    let factors = CovarianceFactors::new(k, regularization)?;
    let nlml = negative_log_marginal_likelihood(&factors, &y)?;
    debug!(
        "Best hyperparameters from start #{best_index}: objective = {}, regularization = {}",
        best.0, regularization
    );

    Ok(OptimizedHyperparameters {
        kernels,
        regularization,
        objective_value: best.0,
        nlml,
        factors,
        n_eval,
        status,
    })
}
