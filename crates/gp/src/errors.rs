use thiserror::Error;

/// A result type for GP regression algorithm
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when using [`GaussianProcess`](crate::GaussianProcess) or one of its building blocks
#[derive(Error, Debug)]
pub enum GpError {
    /// When a kernel specification is not usable (unknown type, bad hyperparameter, bad mask)
    #[error("Invalid kernel specification: {0}")]
    InvalidKernelSpec(String),
    /// When the covariance matrix cannot be factorized even after regularization
    #[error("Covariance matrix is not invertible with regularization {regularization}")]
    SingularCovariance {
        /// Regularization value added to the diagonal before the failed factorization
        regularization: f64,
    },
    /// When features, targets or train/test matrices are not aligned
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// When LikelihoodComputation computation fails
    #[error("LikelihoodComputation computation error: {0}")]
    LikelihoodComputationError(String),
    #[error(transparent)]
    /// When linear algebra computation fails
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
    /// When error dur to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
}
