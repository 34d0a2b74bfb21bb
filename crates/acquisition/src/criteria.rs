//! Available acquisition functions scoring a candidate from its predicted fitness `mu`,
//! the prediction uncertainty `sigma` (standard deviation) and the best known fitness `best`.
//!
//! Fitness is maximized: the higher the score, the more promising the candidate.
use crate::errors::{AcqError, Result};
use crate::utils::{norm_cdf, norm_pdf};
use crate::AcquisitionConfig;

use std::fmt;
use std::str::FromStr;

/// A trait for acquisition functions which maximum designates the
/// candidate the most worth evaluating next
pub trait AcquisitionFunction: Send + Sync {
    /// Name of the acquisition function
    fn name(&self) -> &'static str;

    /// Score of a candidate with predicted value `mu` and uncertainty `sigma`
    /// given the `best` known target. When `sigma <= 0` the prediction is
    /// considered deterministic.
    fn value(&self, mu: f64, sigma: f64, best: f64) -> f64;
}

impl fmt::Debug for dyn AcquisitionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Probability for the candidate to be better than the best known target
#[derive(Clone, Copy, Debug, Default)]
pub struct Cdf;

impl AcquisitionFunction for Cdf {
    fn name(&self) -> &'static str {
        "cdf"
    }

    /// `Phi((mu - best) / sigma)`
    fn value(&self, mu: f64, sigma: f64, best: f64) -> f64 {
        improvement_probability(mu - best, sigma)
    }
}

/// Prediction shifted by a multiple of its uncertainty
#[derive(Clone, Copy, Debug)]
pub struct Optimistic {
    /// Uncertainty weight
    pub weight: f64,
}

impl AcquisitionFunction for Optimistic {
    fn name(&self) -> &'static str {
        "optimistic"
    }

    /// `mu + weight * sigma`
    fn value(&self, mu: f64, sigma: f64, _best: f64) -> f64 {
        mu + self.weight * sigma.max(0.)
    }
}

/// Prediction only
#[derive(Clone, Copy, Debug, Default)]
pub struct Gaussian;

impl AcquisitionFunction for Gaussian {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn value(&self, mu: f64, _sigma: f64, _best: f64) -> f64 {
        mu
    }
}

/// Upper confidence bound
#[derive(Clone, Copy, Debug)]
pub struct UpperConfidenceBound {
    /// Exploration parameter
    pub kappa: f64,
}

impl AcquisitionFunction for UpperConfidenceBound {
    fn name(&self) -> &'static str {
        "UCB"
    }

    /// `mu + kappa * sigma`
    fn value(&self, mu: f64, sigma: f64, _best: f64) -> f64 {
        mu + self.kappa * sigma.max(0.)
    }
}

/// Expected improvement over the best known target
#[derive(Clone, Copy, Debug)]
pub struct ExpectedImprovement {
    /// Minimal improvement to be considered
    pub jitter: f64,
}

impl AcquisitionFunction for ExpectedImprovement {
    fn name(&self) -> &'static str {
        "EI"
    }

    /// `(mu - best - jitter) * Phi(z) + sigma * phi(z)` with `z = (mu - best - jitter) / sigma`
    fn value(&self, mu: f64, sigma: f64, best: f64) -> f64 {
        let improvement = mu - best - self.jitter;
        if sigma <= 0. {
            improvement.max(0.)
        } else {
            let z = improvement / sigma;
            improvement * norm_cdf(z) + sigma * norm_pdf(z)
        }
    }
}

/// Probability of improvement over the best known target
#[derive(Clone, Copy, Debug)]
pub struct ProbabilityOfImprovement {
    /// Minimal improvement to be considered
    pub jitter: f64,
}

impl AcquisitionFunction for ProbabilityOfImprovement {
    fn name(&self) -> &'static str {
        "PI"
    }

    /// `Phi((mu - best - jitter) / sigma)`
    fn value(&self, mu: f64, sigma: f64, best: f64) -> f64 {
        improvement_probability(mu - best - self.jitter, sigma)
    }
}

/// `Phi(improvement / sigma)`, step function when `sigma <= 0`
fn improvement_probability(improvement: f64, sigma: f64) -> f64 {
    if sigma <= 0. {
        if improvement > 0. {
            1.
        } else {
            0.
        }
    } else {
        norm_cdf(improvement / sigma)
    }
}

/// Supported acquisition strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
    /// See [Cdf]
    Cdf,
    /// See [Optimistic]
    Optimistic,
    /// See [Gaussian]
    Gaussian,
    /// See [UpperConfidenceBound]
    Ucb,
    /// See [ExpectedImprovement]
    Ei,
    /// See [ProbabilityOfImprovement]
    Pi,
}

impl Strategy {
    /// Names of the supported strategies
    pub const NAMES: [&'static str; 6] = ["cdf", "optimistic", "gaussian", "UCB", "EI", "PI"];

    /// All supported strategies
    pub const ALL: [Strategy; 6] = [
        Strategy::Cdf,
        Strategy::Optimistic,
        Strategy::Gaussian,
        Strategy::Ucb,
        Strategy::Ei,
        Strategy::Pi,
    ];

    /// Canonical name of the strategy
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Cdf => "cdf",
            Strategy::Optimistic => "optimistic",
            Strategy::Gaussian => "gaussian",
            Strategy::Ucb => "UCB",
            Strategy::Ei => "EI",
            Strategy::Pi => "PI",
        }
    }

    /// Acquisition function of the strategy parameterized by `config`
    pub fn criterion(&self, config: &AcquisitionConfig) -> Box<dyn AcquisitionFunction> {
        match self {
            Strategy::Cdf => Box::new(Cdf),
            Strategy::Optimistic => Box::new(Optimistic {
                weight: config.optimistic_weight,
            }),
            Strategy::Gaussian => Box::new(Gaussian),
            Strategy::Ucb => Box::new(UpperConfidenceBound {
                kappa: config.ucb_kappa,
            }),
            Strategy::Ei => Box::new(ExpectedImprovement {
                jitter: config.jitter,
            }),
            Strategy::Pi => Box::new(ProbabilityOfImprovement {
                jitter: config.jitter,
            }),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Strategy {
    type Err = AcqError;

    /// Parse a strategy name, case insensitive
    fn from_str(s: &str) -> Result<Self> {
        Strategy::ALL
            .iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| AcqError::UnknownAcquisitionStrategy {
                name: s.to_string(),
                valid: Strategy::NAMES.iter().map(|n| n.to_string()).collect(),
            })
    }
}
