//! This library implements [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! of a scalar fitness from fingerprint vectors describing candidates.
//!
//! The GP covariance is the sum of the kernels of a [KernelSpec] list (gaussian, laplacian,
//! linear, polynomial, Matérn or constant) regularized by a value added to its diagonal.
//! Kernels hyperparameters and regularization can be optimized by maximizing the log
//! marginal likelihood or by minimizing a k-fold cross validation error (see [optimization]).
//!
//! GP methods are implemented by [GaussianProcess] parameterized by [GpParams].
//!
//! Besides posterior mean and variance, [GaussianProcess::predict_with] reports on request
//! training and validation errors (see [metrics]) as well as a linear model of the GP residuals
//! fitted on basis functions of the fingerprints (see [basis]).
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod basis;
pub mod covariance;
mod errors;
pub mod kernels;
pub mod metrics;
pub mod optimization;

mod parameters;
mod prediction;
mod utils;

pub use algorithm::*;
pub use errors::*;
pub use kernels::{KernelKind, KernelSpec};
pub use optimization::{Objective, OptimizerConfig, OptimizerStatus};
pub use parameters::*;
pub use prediction::*;
pub use utils::Standardizer;
