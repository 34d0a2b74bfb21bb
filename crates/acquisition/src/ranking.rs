use crate::criteria::{AcquisitionFunction, Strategy};
use crate::errors::{AcqError, Result};

use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of the acquisition functions
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct AcquisitionConfig {
    /// Uncertainty weight of the `optimistic` strategy
    pub optimistic_weight: f64,
    /// Exploration parameter of the `UCB` strategy
    pub ucb_kappa: f64,
    /// Minimal improvement considered by `EI` and `PI` strategies
    pub jitter: f64,
}

impl AcquisitionConfig {
    /// Default uncertainty weight of the `optimistic` strategy
    pub const DEFAULT_OPTIMISTIC_WEIGHT: f64 = 2.0;
    /// Default exploration parameter of the `UCB` strategy
    pub const DEFAULT_UCB_KAPPA: f64 = 1.5;
    /// Default minimal improvement of `EI` and `PI` strategies
    pub const DEFAULT_JITTER: f64 = 0.01;

    /// Set the `optimistic` uncertainty weight
    pub fn optimistic_weight(mut self, weight: f64) -> Self {
        self.optimistic_weight = weight;
        self
    }

    /// Set the `UCB` exploration parameter
    pub fn ucb_kappa(mut self, kappa: f64) -> Self {
        self.ucb_kappa = kappa;
        self
    }

    /// Set the `EI` and `PI` minimal improvement
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        AcquisitionConfig {
            optimistic_weight: Self::DEFAULT_OPTIMISTIC_WEIGHT,
            ucb_kappa: Self::DEFAULT_UCB_KAPPA,
            jitter: Self::DEFAULT_JITTER,
        }
    }
}

/// Data required to rank candidates
#[derive(Clone, Copy, Debug)]
pub struct RankInput<'a> {
    /// Known targets of the evaluated (training) candidates
    pub targets: ArrayView1<'a, f64>,
    /// Predicted targets of the candidates to rank
    pub predictions: ArrayView1<'a, f64>,
    /// Uncertainty (standard deviation) of the predictions
    pub uncertainty: ArrayView1<'a, f64>,
    /// Features of the evaluated candidates
    pub train_features: ArrayView2<'a, f64>,
    /// Features of the candidates to rank
    pub test_features: ArrayView2<'a, f64>,
}

impl RankInput<'_> {
    fn check(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(AcqError::InvalidValue(
                "at least one known target is required".to_string(),
            ));
        }
        if self.targets.iter().any(|v| !v.is_finite()) {
            return Err(AcqError::InvalidValue(
                "known targets contain non finite values".to_string(),
            ));
        }
        if self.predictions.len() != self.uncertainty.len() {
            return Err(AcqError::DimensionMismatch(format!(
                "{} predictions for {} uncertainties",
                self.predictions.len(),
                self.uncertainty.len()
            )));
        }
        if self.train_features.nrows() != self.targets.len() {
            return Err(AcqError::DimensionMismatch(format!(
                "{} training features for {} targets",
                self.train_features.nrows(),
                self.targets.len()
            )));
        }
        if self.test_features.nrows() != self.predictions.len() {
            return Err(AcqError::DimensionMismatch(format!(
                "{} test features for {} predictions",
                self.test_features.nrows(),
                self.predictions.len()
            )));
        }
        if self.train_features.ncols() != self.test_features.ncols() {
            return Err(AcqError::DimensionMismatch(format!(
                "training features have {} components whereas test features have {}",
                self.train_features.ncols(),
                self.test_features.ncols()
            )));
        }
        Ok(())
    }

    fn best_target(&self) -> f64 {
        self.targets.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
    }
}

fn parse_metrics<S: AsRef<str>>(metrics: &[S]) -> Result<Vec<Strategy>> {
    metrics.iter().map(|m| m.as_ref().parse()).collect()
}

fn scores(
    criterion: &dyn AcquisitionFunction,
    input: &RankInput,
    best: &Array1<f64>,
) -> Array1<f64> {
    Zip::from(&input.predictions)
        .and(&input.uncertainty)
        .and(best)
        .map_collect(|&mu, &sigma, &best| criterion.value(mu, sigma, best))
}

/// Score candidates for each of the acquisition strategies named in `metrics`
/// (among `cdf`, `optimistic`, `gaussian`, `UCB`, `EI`, `PI`).
///
/// The best known target is the maximum of `input.targets`. Returns a map from the
/// canonical strategy name to the scores of the candidates in the order of `input.predictions`.
///
/// ```
/// use fitrank_acq::{rank, AcquisitionConfig, RankInput};
/// use ndarray::array;
///
/// let targets = array![1., 3., 2.];
/// let train_features = array![[0.], [1.], [2.]];
/// let predictions = array![2.5, 3.5];
/// let uncertainty = array![0.1, 0.5];
/// let test_features = array![[0.5], [1.5]];
/// let input = RankInput {
///     targets: targets.view(),
///     predictions: predictions.view(),
///     uncertainty: uncertainty.view(),
///     train_features: train_features.view(),
///     test_features: test_features.view(),
/// };
/// let scores = rank(&input, &["gaussian", "UCB"], &AcquisitionConfig::default()).unwrap();
/// assert_eq!(scores["gaussian"], predictions);
/// assert_eq!(scores["UCB"].len(), 2);
/// ```
pub fn rank<S: AsRef<str>>(
    input: &RankInput,
    metrics: &[S],
    config: &AcquisitionConfig,
) -> Result<BTreeMap<String, Array1<f64>>> {
    let strategies = parse_metrics(metrics)?;
    input.check()?;
    let best = input.best_target();
    debug!("Rank {} candidates, best known target {}", input.predictions.len(), best);
    let best = Array1::from_elem(input.predictions.len(), best);
    Ok(strategies
        .iter()
        .map(|strategy| {
            let criterion = strategy.criterion(config);
            (strategy.to_string(), scores(criterion.as_ref(), input, &best))
        })
        .collect())
}

/// Score candidates like [rank] but against the best known target of their class
/// (e.g. composition of the candidate).
///
/// `train_classes` gives the class of each known target, `test_classes` the class of
/// each candidate. Candidates of a class without known target are scored against
/// the best known target over all classes.
pub fn rank_by_class<S: AsRef<str>, C: Ord>(
    input: &RankInput,
    train_classes: &[C],
    test_classes: &[C],
    metrics: &[S],
    config: &AcquisitionConfig,
) -> Result<BTreeMap<String, Array1<f64>>> {
    let strategies = parse_metrics(metrics)?;
    input.check()?;
    if train_classes.len() != input.targets.len() {
        return Err(AcqError::DimensionMismatch(format!(
            "{} training classes for {} targets",
            train_classes.len(),
            input.targets.len()
        )));
    }
    if test_classes.len() != input.predictions.len() {
        return Err(AcqError::DimensionMismatch(format!(
            "{} test classes for {} predictions",
            test_classes.len(),
            input.predictions.len()
        )));
    }

    let mut class_best: BTreeMap<&C, f64> = BTreeMap::new();
    for (class, &target) in train_classes.iter().zip(input.targets.iter()) {
        let best = class_best.entry(class).or_insert(f64::NEG_INFINITY);
        *best = best.max(target);
    }
    let global_best = input.best_target();
    debug!(
        "Rank {} candidates against the best targets of {} classes",
        input.predictions.len(),
        class_best.len()
    );
    let best: Array1<f64> = test_classes
        .iter()
        .map(|class| class_best.get(class).copied().unwrap_or(global_best))
        .collect();

    Ok(strategies
        .iter()
        .map(|strategy| {
            let criterion = strategy.criterion(config);
            (strategy.to_string(), scores(criterion.as_ref(), input, &best))
        })
        .collect())
}
