use thiserror::Error;

/// A result type for acquisition errors
pub type Result<T> = std::result::Result<T, AcqError>;

/// An error when ranking candidates
#[derive(Error, Debug)]
pub enum AcqError {
    /// When an acquisition strategy name is not supported
    #[error("Unknown acquisition strategy '{name}', expected one of {valid:?}")]
    UnknownAcquisitionStrategy {
        /// Requested strategy name
        name: String,
        /// Supported strategy names
        valid: Vec<String>,
    },
    /// When predictions, uncertainties, targets or features are not aligned
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValue(String),
}
