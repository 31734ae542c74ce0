use thiserror::Error;

/// Errors raised by the numerical core.
///
/// Sampling functions do not use this type for missing input: they
/// return `None` instead, so "not available yet" is never confused with
/// a failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpError {
    #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("matrix is not positive definite (non-positive pivot at index {pivot})")]
    NotPositiveDefinite { pivot: usize },
    #[error("eigendecomposition did not converge")]
    EigenDecomposition,
    #[error("degenerate input: {0}")]
    DegenerateInput(&'static str),
    #[error("invalid value {value} for hyperparameter `{name}`")]
    InvalidHyperparameter { name: &'static str, value: f64 },
}

pub type Result<T> = std::result::Result<T, GpError>;

pub(crate) fn check_dim(context: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(GpError::DimensionMismatch {
            context,
            expected,
            found,
        })
    }
}
