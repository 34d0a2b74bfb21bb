//! This library ranks candidates by acquisition functions combining their predicted
//! fitness and the uncertainty of the prediction, typically given by a Gaussian process
//! regression model (see `fitrank-gp`).
//!
//! Fitness is maximized: the best known target is the maximum of the evaluated
//! candidates targets and the most promising candidates get the highest scores.
//!
//! Available strategies (see [criteria]):
//! * `cdf`: probability to beat the best known target,
//! * `optimistic`: prediction plus a weighted uncertainty,
//! * `gaussian`: prediction only,
//! * `UCB`: upper confidence bound,
//! * `EI`: expected improvement,
//! * `PI`: probability of improvement.
//!
//! Candidates are scored by [rank], or by [rank_by_class] to compare each candidate
//! with the best known target of its own class.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
pub mod criteria;
mod errors;
mod ranking;
pub mod utils;

pub use criteria::{AcquisitionFunction, Strategy};
pub use errors::*;
pub use ranking::*;
