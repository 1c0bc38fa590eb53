//! Error type shared by the fallible (`try_*`) entry points.
//!
//! The panicking entry points treat the same conditions as contract
//! violations and abort with the corresponding error message.

use thiserror::Error;

/// Precondition failures detected by the estimation toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StatsError {
    /// No observations were supplied.
    #[error("sample is empty")]
    EmptySample,

    /// Fewer observations than the statistic needs.
    #[error("need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// All observations carry zero weight (every variance is infinite).
    #[error("sum of weights is zero")]
    ZeroWeightSum,

    /// A variance or standard deviation was negative.
    #[error("variance must be non-negative")]
    NegativeVariance,

    /// The covariance sequence does not match the number of arguments.
    #[error("covariance sequence has {actual} entries, expected {expected}")]
    CovarianceLength { expected: usize, actual: usize },
}

/// Result type for the fallible statistics API.
pub type Result<T> = std::result::Result<T, StatsError>;
