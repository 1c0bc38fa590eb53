//! # u-estimate
//!
//! Measured quantities with uncertainty, and the statistics built on them.
//!
//! An [`Estimate`] is a `(value, variance)` pair. Arithmetic on estimates
//! propagates the variance under the independence assumption; arbitrary
//! differentiable functions go through the first-order [`propagate`]
//! engine, optionally with a covariance matrix between the arguments.
//! Samples of plain numbers or estimates are summarized in one pass by
//! [`analyze_sample`], and [`regression()`] fits a straight line to paired
//! data with standard errors on both coefficients.
//!
//! ## Modules
//!
//! - [`estimate`]: The `Estimate` type and its arithmetic
//! - [`propagation`]: First-order uncertainty propagation through a gradient
//! - [`sample`]: Online mean, variance and covariance, weighted or not
//! - [`regression`](mod@regression): Weighted least-squares line fit
//! - [`summation`]: Compensated summation
//! - [`error`]: Error type shared by the fallible API
//!
//! ## Design Philosophy
//!
//! - **Numerical stability first**: Welford/West updates for moments,
//!   Neumaier summation for propagated variances
//! - **Generic precision**: everything works for `f32` and `f64` through
//!   `num_traits::Float`
//! - **Property-based testing**: Mathematical invariants verified via proptest
//!
//! ## Example
//!
//! ```
//! use u_estimate::{analyze_sample, regression, Estimate};
//!
//! let length = Estimate::from_stddev(1.20_f64, 0.01);
//! let time = Estimate::from_stddev(0.55, 0.02);
//! let speed = length / time;
//! assert!((speed.value() - 1.20 / 0.55).abs() < 1e-12);
//!
//! let stats = analyze_sample([9.78_f64, 9.83, 9.81, 9.80]);
//! assert!((stats.mean().value() - 9.805).abs() < 1e-12);
//!
//! let fit = regression([(1.0_f64, 2.1_f64), (2.0, 3.9), (3.0, 6.0), (4.0, 8.1)]);
//! assert!(fit.slope().value() > 1.9 && fit.slope().value() < 2.1);
//! ```

pub mod error;
pub mod estimate;
pub mod propagation;
pub mod regression;
pub mod sample;
pub mod summation;

pub use error::{Result, StatsError};
pub use estimate::{Estimate, Measured};
pub use propagation::{
    propagate, propagate_with, try_propagate_with, Covariance, Differentiable, DifferentiableFn,
    Quotient,
};
pub use regression::{regression, try_regression, RegressionResult};
pub use sample::{analyze_sample, AnalysisResult, PairAnalysisResult, Weighting};
