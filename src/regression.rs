//! Weighted least-squares fit of a straight line `y = slope · x + intercept`.
//!
//! The fit is closed-form: one pass over the data through
//! [`analyze_sample`] and O(1) arithmetic afterwards.
//!
//! # Formulas
//!
//! With weight sum `W`, squared-weight sum `W₂`, and the weighted moments
//! of the sample:
//!
//! ```text
//! slope          = Cov(x, y) / Var(x)
//! intercept      = ȳ − slope · x̄
//! Var(slope)     = s² / ((W − W₂/W) · Var(x))
//! Var(intercept) = s² / W + Var(slope) · x̄²
//! ```
//!
//! For measured `y` (inverse-variance weights) the scale `s²` is 1: the
//! weights already carry the absolute uncertainty. For plain pairs every
//! weight is 1 and the common y-variance is unknown, so it is estimated
//! from the residuals, `s² = (n − 1)(Var(y) − Cov²/Var(x)) / (n − 2)`.
//! Exactly linear data then gets zero standard errors. Two plain points
//! leave no residual degree of freedom: the line is returned with infinite
//! standard errors.
//!
//! Reference: Bevington & Robinson (2003), *Data Reduction and Error
//! Analysis for the Physical Sciences*, 3rd ed., ch. 6.

use num_traits::Float;

use crate::error::{Result, StatsError};
use crate::estimate::Estimate;
use crate::propagation::{evaluate, Covariance, Differentiable};
use crate::sample::{analyze_sample, Accumulator, PairAnalysisResult, Sampled, Weighting};

/// A fitted line with the standard errors of its coefficients.
///
/// Keeps the [`PairAnalysisResult`] it was fitted from, so derived
/// quantities such as the correlation coefficient are computed on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegressionResult<T = f64> {
    slope: Estimate<T>,
    intercept: Estimate<T>,
    sample: PairAnalysisResult<T>,
}

impl<T: Float> RegressionResult<T> {
    /// Fits a line to an analyzed sample.
    ///
    /// # Panics
    /// See [`RegressionResult::try_from_sample`] for the failure conditions.
    pub fn from_sample(sample: PairAnalysisResult<T>) -> Self {
        match Self::try_from_sample(sample) {
            Ok(result) => result,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible form of [`RegressionResult::from_sample`].
    ///
    /// # Errors
    /// - [`StatsError::InsufficientData`] with fewer than 2 pairs.
    /// - [`StatsError::ZeroWeightSum`] if every pair has zero weight.
    pub fn try_from_sample(sample: PairAnalysisResult<T>) -> Result<Self> {
        if sample.size() < 2 {
            return Err(StatsError::InsufficientData {
                required: 2,
                actual: sample.size(),
            });
        }

        let w_sum = sample.weight_sum();
        let w2_sum = sample.weight2_sum();
        let x_mean = sample.try_x_mean()?;
        let y_mean = sample.try_y_mean()?;
        let x_variance = sample.try_x_variance()?;
        let covariance = sample.try_covariance()?;

        if x_variance == T::zero() {
            tracing::debug!("regression on constant x: slope is undefined");
        }

        let slope = covariance / x_variance;
        let intercept = y_mean - slope * x_mean;

        let scale = match sample.weighting() {
            Weighting::InverseVariance => T::one(),
            Weighting::Unit => residual_variance(&sample, slope)?,
        };
        let slope_variance = scale / ((w_sum - w2_sum / w_sum) * x_variance);
        let intercept_variance = scale / w_sum + slope_variance * x_mean * x_mean;

        tracing::trace!(
            size = sample.size(),
            slope = slope.to_f64(),
            intercept = intercept.to_f64(),
            "fitted line"
        );

        Ok(Self {
            slope: Estimate::raw(slope, slope_variance),
            intercept: Estimate::raw(intercept, intercept_variance),
            sample,
        })
    }

    pub fn slope(&self) -> Estimate<T> {
        self.slope
    }

    pub fn slope_stderr(&self) -> T {
        self.slope.stddev()
    }

    pub fn intercept(&self) -> Estimate<T> {
        self.intercept
    }

    pub fn intercept_stderr(&self) -> T {
        self.intercept.stddev()
    }

    /// Pearson correlation coefficient of the fitted sample.
    pub fn correlation_coefficient(&self) -> T {
        self.sample.correlation()
    }

    /// `Cov(slope, intercept) = −x̄ · Var(slope)`.
    pub fn slope_intercept_covariance(&self) -> T {
        -self.sample.x_mean() * self.slope.variance()
    }

    /// The sample the line was fitted to.
    pub fn sample(&self) -> &PairAnalysisResult<T> {
        &self.sample
    }

    /// Value of the fitted line at `x`, with the uncertainty of the fit.
    ///
    /// The slope and intercept are correlated, so their covariance enters
    /// the propagated variance.
    ///
    /// # Examples
    /// ```
    /// use u_estimate::{regression, Estimate};
    /// let fit = regression([
    ///     (0.0_f64, Estimate::new(1.0, 0.01)),
    ///     (1.0, Estimate::new(3.0, 0.01)),
    ///     (2.0, Estimate::new(5.0, 0.01)),
    /// ]);
    /// let y = fit.predict(1.5);
    /// assert!((y.value() - 4.0).abs() < 1e-12);
    /// // Uncertainty is smallest at the centroid of x
    /// assert!(fit.predict(1.0).variance() < y.variance());
    /// ```
    pub fn predict(&self, x: T) -> Estimate<T> {
        let line = Line { x };
        let cov = [
            self.slope.variance(),
            self.slope_intercept_covariance(),
            self.intercept.variance(),
        ];
        let (value, variance) = evaluate(&line, &[self.slope, self.intercept], Covariance::Full(&cov));
        // Rounding can push an exact fit slightly below zero; NaN passes through.
        let variance = if variance < T::zero() { T::zero() } else { variance };
        Estimate::raw(value, variance)
    }
}

/// `f(slope, intercept) = slope · x + intercept` at a fixed `x`.
struct Line<T> {
    x: T,
}

impl<T: Float> Differentiable<T, 2> for Line<T> {
    fn value_at(&self, point: &[T; 2]) -> T {
        point[0] * self.x + point[1]
    }

    fn gradient_at(&self, _point: &[T; 2]) -> [T; 2] {
        [self.x, T::one()]
    }
}

/// Residual variance `s²` of an unweighted fit, clamped at zero.
///
/// Infinite for two points, where the residuals carry no information.
fn residual_variance<T: Float>(sample: &PairAnalysisResult<T>, slope: T) -> Result<T> {
    if sample.size() == 2 {
        return Ok(T::infinity());
    }
    let one = T::one();
    let n = sample.weight_sum();
    let unexplained = sample.try_y_variance()? - slope * sample.try_covariance()?;
    let s2 = (n - one) * unexplained / (n - one - one);
    Ok(s2.max(T::zero()))
}

/// Fits a straight line to `(x, y)` pairs.
///
/// Accepts plain pairs `(f64, f64)`, measured pairs
/// `(Estimate, Estimate)` and mixed pairs `(f64, Estimate)`, or references
/// to any of them. For measured pairs only the y-variance is used (as an
/// inverse-variance weight); x is treated as exact.
///
/// Plain pairs carry no variance of their own, so the coefficient errors
/// are scaled by the residual variance `s²` instead of using unit weights
/// directly. With exactly two plain pairs `s²` is undefined and both
/// standard errors are infinite.
///
/// # Panics
/// With fewer than 2 pairs, or a zero weight sum.
///
/// # Examples
/// ```
/// use u_estimate::regression;
/// let fit = regression([(1.0_f64, 2.0_f64), (2.0, 4.0), (3.0, 6.0), (4.0, 8.0)]);
/// assert!((fit.slope().value() - 2.0).abs() < 1e-12);
/// assert!(fit.intercept().value().abs() < 1e-12);
/// assert!((fit.correlation_coefficient() - 1.0).abs() < 1e-12);
/// assert!(fit.slope_stderr() < 1e-6);
/// ```
pub fn regression<I, T>(sample: I) -> RegressionResult<T>
where
    T: Float,
    I: IntoIterator,
    I::Item: Sampled,
    <I::Item as Sampled>::Accumulator: Accumulator<Output = PairAnalysisResult<T>>,
{
    RegressionResult::from_sample(analyze_sample(sample))
}

/// Fallible form of [`regression`].
///
/// # Errors
/// See [`RegressionResult::try_from_sample`].
pub fn try_regression<I, T>(sample: I) -> Result<RegressionResult<T>>
where
    T: Float,
    I: IntoIterator,
    I::Item: Sampled,
    <I::Item as Sampled>::Accumulator: Accumulator<Output = PairAnalysisResult<T>>,
{
    RegressionResult::try_from_sample(analyze_sample(sample))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_exact_line_unweighted() {
        let fit = regression([(1.0_f64, 2.0_f64), (2.0, 4.0), (3.0, 6.0), (4.0, 8.0)]);
        assert_relative_eq!(fit.slope().value(), 2.0, max_relative = 1e-12);
        assert!(fit.intercept().value().abs() < 1e-12);
        assert_relative_eq!(fit.correlation_coefficient(), 1.0, max_relative = 1e-12);
        assert!(fit.slope_stderr() < 1e-6, "slope stderr {}", fit.slope_stderr());
        assert!(fit.intercept_stderr() < 1e-6, "intercept stderr {}", fit.intercept_stderr());
    }

    #[test]
    fn test_exact_line_weighted() {
        let data: Vec<_> = (1..=4)
            .map(|i| {
                let x = i as f64;
                (Estimate::exact(x), Estimate::new(2.0 * x, 1e-12))
            })
            .collect();
        let fit = regression(&data);
        assert_relative_eq!(fit.slope().value(), 2.0, max_relative = 1e-12);
        assert!(fit.intercept().value().abs() < 1e-10);
        assert_relative_eq!(fit.correlation_coefficient(), 1.0, max_relative = 1e-12);
        assert!(fit.slope_stderr() < 1e-5);
        assert!(fit.intercept_stderr() < 1e-5);
    }

    #[test]
    fn test_unweighted_textbook_errors() {
        // x = 0..4, y = 1, 3, 2, 5, 4: slope 0.8, intercept 1.4
        let fit = regression([(0.0_f64, 1.0_f64), (1.0, 3.0), (2.0, 2.0), (3.0, 5.0), (4.0, 4.0)]);
        assert_relative_eq!(fit.slope().value(), 0.8, max_relative = 1e-12);
        assert_relative_eq!(fit.intercept().value(), 1.4, max_relative = 1e-12);
        // SSR = 3.6, s² = 1.2, Sxx = 10
        assert_relative_eq!(fit.slope().variance(), 0.12, max_relative = 1e-12);
        assert_relative_eq!(fit.intercept().variance(), 1.2 / 5.0 + 0.12 * 4.0, max_relative = 1e-12);
        assert_relative_eq!(fit.slope_intercept_covariance(), -0.24, max_relative = 1e-12);
    }

    #[test]
    fn test_weighted_closed_form() {
        // Unit y-variances: Var(slope) = 1/Sxx, Var(intercept) = 1/n + x̄²/Sxx
        let data = [
            (0.0_f64, Estimate::new(1.0, 1.0)),
            (1.0, Estimate::new(3.0, 1.0)),
            (2.0, Estimate::new(2.0, 1.0)),
            (3.0, Estimate::new(5.0, 1.0)),
            (4.0, Estimate::new(4.0, 1.0)),
        ];
        let fit = regression(data);
        assert_relative_eq!(fit.slope().value(), 0.8, max_relative = 1e-13);
        assert_relative_eq!(fit.slope().variance(), 0.1, max_relative = 1e-12);
        assert_relative_eq!(fit.intercept().variance(), 0.2 + 0.4, max_relative = 1e-12);
    }

    #[test]
    fn test_weighted_unequal_variances_closed_form() {
        // w = 1, 2, 4 at x = 0, 1, 2: W = 7, x̄ = 10/7, Σw(x − x̄)² = 26/7,
        // ȳ = 3, Σw(x − x̄)(y − ȳ) = 6
        let fit = regression([
            (0.0_f64, Estimate::new(1.0, 1.0)),
            (1.0, Estimate::new(2.0, 0.5)),
            (2.0, Estimate::new(4.0, 0.25)),
        ]);
        assert_relative_eq!(fit.slope().value(), 21.0 / 13.0, max_relative = 1e-12);
        assert_relative_eq!(fit.intercept().value(), 9.0 / 13.0, max_relative = 1e-12);
        // Var(slope) = 1/Σw(x − x̄)², Var(intercept) = Σwx² / (W Σw(x − x̄)²)
        assert_relative_eq!(fit.slope().variance(), 7.0 / 26.0, max_relative = 1e-12);
        assert_relative_eq!(fit.intercept().variance(), 9.0 / 13.0, max_relative = 1e-12);
        assert_relative_eq!(fit.slope_intercept_covariance(), -5.0 / 13.0, max_relative = 1e-12);
    }

    #[test]
    fn test_weights_follow_y_precision() {
        // The precise middle point pulls the line through it
        let fit = regression([
            (0.0_f64, Estimate::new(0.0, 1.0)),
            (1.0, Estimate::new(5.0, 1e-6)),
            (2.0, Estimate::new(2.0, 1.0)),
        ]);
        assert_relative_eq!(fit.predict(1.0).value(), 5.0, max_relative = 1e-4);
    }

    #[test]
    fn test_weighted_two_points() {
        let fit = regression([(0.0_f64, Estimate::new(1.0, 0.01)), (2.0, Estimate::new(5.0, 0.01))]);
        assert_relative_eq!(fit.slope().value(), 2.0, max_relative = 1e-12);
        assert_relative_eq!(fit.intercept().value(), 1.0, max_relative = 1e-12);
        // Var(slope) = (σ² + σ²) / Δx²
        assert_relative_eq!(fit.slope().variance(), 0.02 / 4.0, max_relative = 1e-12);
    }

    #[test]
    fn test_noisy_data_recovers_line() {
        let mut rng = SmallRng::seed_from_u64(42);
        let sigma = 0.05;
        let data: Vec<(f64, Estimate)> = (0..200)
            .map(|i| {
                let x = i as f64 / 10.0;
                let noise = sigma * (rng.random::<f64>() - 0.5) * 12.0_f64.sqrt();
                (x, Estimate::from_stddev(-0.7 * x + 3.0 + noise, sigma))
            })
            .collect();
        let fit = regression(&data);
        let slope = fit.slope();
        let intercept = fit.intercept();
        assert!((slope.value() + 0.7).abs() < 5.0 * slope.stddev(), "slope {slope}");
        assert!((intercept.value() - 3.0).abs() < 5.0 * intercept.stddev(), "intercept {intercept}");
        assert!(fit.correlation_coefficient() < -0.99);
    }

    #[test]
    fn test_noisy_unweighted_stderr_matches_noise() {
        let mut rng = SmallRng::seed_from_u64(7);
        let data: Vec<(f64, f64)> = (0..500)
            .map(|i| {
                let x = i as f64 / 50.0;
                (x, 1.5 * x - 2.0 + rng.random_range(-0.5..0.5))
            })
            .collect();
        let weighted: Vec<(f64, Estimate)> =
            data.iter().map(|&(x, y)| (x, Estimate::new(y, 1.0 / 12.0))).collect();

        let plain = regression(&data);
        let known = regression(&weighted);
        // Uniform(−½, ½) noise has variance 1/12, so both fits agree
        assert_relative_eq!(plain.slope().value(), known.slope().value(), max_relative = 1e-10);
        assert_relative_eq!(plain.slope_stderr(), known.slope_stderr(), max_relative = 0.15);
    }

    #[test]
    fn test_predict_matches_manual_propagation() {
        let fit = regression([(0.0_f64, 1.0_f64), (1.0, 3.0), (2.0, 2.0), (3.0, 5.0), (4.0, 4.0)]);
        let x = 6.0;
        let y = fit.predict(x);
        assert_relative_eq!(y.value(), 0.8 * 6.0 + 1.4, max_relative = 1e-13);
        let expected = x * x * fit.slope().variance()
            + 2.0 * x * fit.slope_intercept_covariance()
            + fit.intercept().variance();
        assert_relative_eq!(y.variance(), expected, max_relative = 1e-12);
        // At x̄ only the intercept-at-centroid term remains: s²/n
        assert_relative_eq!(fit.predict(2.0).variance(), 1.2 / 5.0, max_relative = 1e-12);
    }

    #[test]
    fn test_sample_is_retained() {
        let data = [(1.0_f64, 1.0_f64), (2.0, 3.0), (3.0, 2.0)];
        let fit = regression(data);
        assert_eq!(fit.sample(), &analyze_sample(data));
        assert_eq!(fit.sample().size(), 3);
    }

    #[test]
    fn test_constant_x_is_degenerate_not_fatal() {
        let fit = regression([(1.0_f64, 1.0_f64), (1.0, 2.0), (1.0, 3.0)]);
        assert!(!fit.slope().value().is_finite());
    }

    #[test]
    fn test_insufficient_data() {
        assert_eq!(
            try_regression([(1.0_f64, 1.0_f64)]),
            Err(StatsError::InsufficientData { required: 2, actual: 1 })
        );
        assert_eq!(
            try_regression([(1.0_f64, Estimate::new(1.0, 1.0))]),
            Err(StatsError::InsufficientData { required: 2, actual: 1 })
        );
        assert_eq!(
            try_regression(Vec::<(f64, Estimate)>::new()),
            Err(StatsError::InsufficientData { required: 2, actual: 0 })
        );
    }

    #[test]
    fn test_zero_weight_sum() {
        let r = try_regression([
            (1.0, Estimate::new(1.0, f64::INFINITY)),
            (2.0, Estimate::new(2.0, f64::INFINITY)),
        ]);
        assert_eq!(r, Err(StatsError::ZeroWeightSum));
    }

    #[test]
    #[should_panic(expected = "need at least 2 observations, got 1")]
    fn test_regression_panics_on_single_point() {
        regression([(1.0_f64, 1.0_f64)]);
    }

    #[test]
    fn test_two_plain_points_have_infinite_errors() {
        let fit = regression([(1.0_f64, 3.0_f64), (3.0, 7.0)]);
        assert_relative_eq!(fit.slope().value(), 2.0, max_relative = 1e-14);
        assert_relative_eq!(fit.intercept().value(), 1.0, max_relative = 1e-14);
        assert_eq!(fit.slope_stderr(), f64::INFINITY);
        assert_eq!(fit.intercept_stderr(), f64::INFINITY);
        assert_eq!(fit.predict(2.0).value(), 5.0);
        assert!(!fit.predict(2.0).variance().is_finite());
    }

    #[test]
    fn test_leading_zero_weight_pair_is_ignored() {
        let fit = regression([
            (0.0_f64, Estimate::new(9.0, f64::INFINITY)),
            (1.0, Estimate::new(1.0, 1.0)),
            (2.0, Estimate::new(3.0, 1.0)),
            (3.0, Estimate::new(5.0, 1.0)),
        ]);
        assert_relative_eq!(fit.slope().value(), 2.0, max_relative = 1e-14);
        assert_relative_eq!(fit.intercept().value(), -1.0, max_relative = 1e-12);
        // Unit weights on x = 1, 2, 3: Var(slope) = 1/Sxx = 1/2
        assert_relative_eq!(fit.slope().variance(), 0.5, max_relative = 1e-12);
    }

    #[test]
    fn test_idempotent() {
        let data = vec![(1.0_f64, Estimate::new(2.1, 0.01)), (2.0, Estimate::new(3.9, 0.04)), (3.0, Estimate::new(6.2, 0.02))];
        assert_eq!(regression(&data), regression(&data));
    }

    #[test]
    fn test_f32() {
        let fit = regression([(1.0_f32, 3.0_f32), (2.0, 5.0), (3.0, 7.0), (4.0, 9.0)]);
        assert!((fit.slope().value() - 2.0).abs() < 1e-5);
        assert!((fit.intercept().value() - 1.0).abs() < 1e-5);
    }
}
