//! Measured quantities: a value paired with its variance.
//!
//! An [`Estimate`] summarizes an independent random scalar by its first two
//! moments. Arithmetic between estimates assumes statistical independence;
//! correlated inputs go through [`crate::propagation`] with an explicit
//! covariance instead.
//!
//! # Arithmetic rules
//!
//! | Operation        | Value        | Variance                                   |
//! |------------------|--------------|--------------------------------------------|
//! | `a + b`, `a - b` | `a ± b`      | `Var(a) + Var(b)`                          |
//! | `a * b`          | `a · b`      | `Var(a)Var(b) + Var(a)b² + a²Var(b)`       |
//! | `a / b`          | `a / b`      | first-order propagation of `f(a, b) = a/b` |
//! | `a + c`, `a - c` | `a ± c`      | `Var(a)`                                   |
//! | `a * c`, `a / c` | `a · c`, `a / c` | `Var(a) · c²`, `Var(a) / c²`          |
//!
//! The product rule is exact for independent variables (Goodman, 1960,
//! "On the Exact Variance of Products", *JASA* 55(292)).

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::Float;

use crate::error::{Result, StatsError};
use crate::propagation::{propagate, Quotient};

/// A value with its variance.
///
/// Invariant: `variance >= 0` (or NaN for a degenerate result). The
/// default value holds NaN in both fields and marks an estimate that was
/// never computed.
///
/// # Examples
/// ```
/// use u_estimate::Estimate;
/// let length = Estimate::from_stddev(2.0_f64, 0.1);
/// let width = Estimate::new(3.0, 0.04);
/// let area = length * width;
/// assert_eq!(area.value(), 6.0);
/// assert!((area.variance() - (0.01 * 0.04 + 0.01 * 9.0 + 4.0 * 0.04)).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Estimate<T = f64> {
    value: T,
    variance: T,
}

impl<T: Float> Estimate<T> {
    /// Creates an estimate from a value and its variance.
    ///
    /// # Panics
    /// If `variance` is negative. A NaN variance is accepted.
    pub fn new(value: T, variance: T) -> Self {
        match Self::try_new(value, variance) {
            Ok(estimate) => estimate,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible form of [`Estimate::new`].
    ///
    /// # Errors
    /// [`StatsError::NegativeVariance`] if `variance < 0`.
    pub fn try_new(value: T, variance: T) -> Result<Self> {
        if variance < T::zero() {
            return Err(StatsError::NegativeVariance);
        }
        Ok(Self::raw(value, variance))
    }

    /// Creates an estimate from a value and its standard deviation.
    ///
    /// # Panics
    /// If `stddev` is negative.
    ///
    /// # Examples
    /// ```
    /// use u_estimate::Estimate;
    /// let e = Estimate::from_stddev(10.0, 0.5);
    /// assert_eq!(e.variance(), 0.25);
    /// assert_eq!(e.stddev(), 0.5);
    /// ```
    pub fn from_stddev(value: T, stddev: T) -> Self {
        match Self::try_from_stddev(value, stddev) {
            Ok(estimate) => estimate,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible form of [`Estimate::from_stddev`].
    ///
    /// # Errors
    /// [`StatsError::NegativeVariance`] if `stddev < 0`.
    pub fn try_from_stddev(value: T, stddev: T) -> Result<Self> {
        if stddev < T::zero() {
            return Err(StatsError::NegativeVariance);
        }
        Ok(Self::raw(value, stddev * stddev))
    }

    /// An estimate with no uncertainty.
    pub fn exact(value: T) -> Self {
        Self::raw(value, T::zero())
    }

    /// Skips the invariant check. Callers guarantee a non-negative
    /// (or NaN) variance.
    pub(crate) fn raw(value: T, variance: T) -> Self {
        Self { value, variance }
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn variance(&self) -> T {
        self.variance
    }

    /// Standard deviation, `sqrt(variance)`.
    pub fn stddev(&self) -> T {
        self.variance.sqrt()
    }

    /// Returns `true` if either field is NaN.
    pub fn is_nan(&self) -> bool {
        self.value.is_nan() || self.variance.is_nan()
    }
}

impl<T: Float> Default for Estimate<T> {
    fn default() -> Self {
        Self::raw(T::nan(), T::nan())
    }
}

impl<T: Float> From<T> for Estimate<T> {
    fn from(value: T) -> Self {
        Self::exact(value)
    }
}

/// Renders `value +- stddev`, applying any requested precision to both.
///
/// ```
/// use u_estimate::Estimate;
/// let e = Estimate::from_stddev(1.23456, 0.01);
/// assert_eq!(format!("{e:.3}"), "1.235 +- 0.010");
/// ```
impl<T: Float + fmt::Display> fmt::Display for Estimate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*} +- {:.*}", p, self.value, p, self.stddev()),
            None => write!(f, "{} +- {}", self.value, self.stddev()),
        }
    }
}

// ---------------------------------------------------------------------------
// Argument capability
// ---------------------------------------------------------------------------

/// Anything with a central value and a variance.
///
/// Plain floats have zero variance. This is the element capability the
/// propagation engine accepts as an argument.
pub trait Measured<T> {
    fn value(&self) -> T;
    fn variance(&self) -> T;
}

impl<T: Float> Measured<T> for Estimate<T> {
    fn value(&self) -> T {
        self.value
    }

    fn variance(&self) -> T {
        self.variance
    }
}

macro_rules! impl_measured_for_float {
    ($($t:ty),*) => {$(
        impl Measured<$t> for $t {
            fn value(&self) -> $t {
                *self
            }

            fn variance(&self) -> $t {
                0.0
            }
        }
    )*};
}

impl_measured_for_float!(f32, f64);

// ---------------------------------------------------------------------------
// Estimate ∘ Estimate (independent operands)
// ---------------------------------------------------------------------------

impl<T: Float> Add for Estimate<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::raw(self.value + rhs.value, self.variance + rhs.variance)
    }
}

impl<T: Float> Sub for Estimate<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::raw(self.value - rhs.value, self.variance + rhs.variance)
    }
}

impl<T: Float> Mul for Estimate<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let lhs_mean2 = self.value * self.value;
        let rhs_mean2 = rhs.value * rhs.value;
        Self::raw(
            self.value * rhs.value,
            self.variance * rhs.variance + self.variance * rhs_mean2 + lhs_mean2 * rhs.variance,
        )
    }
}

impl<T: Float> Div for Estimate<T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        propagate(&Quotient, &[self, rhs])
    }
}

impl<T: Float> Neg for Estimate<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::raw(-self.value, self.variance)
    }
}

// ---------------------------------------------------------------------------
// Estimate ∘ scalar
// ---------------------------------------------------------------------------

impl<T: Float> Add<T> for Estimate<T> {
    type Output = Self;

    fn add(self, rhs: T) -> Self {
        Self::raw(self.value + rhs, self.variance)
    }
}

impl<T: Float> Sub<T> for Estimate<T> {
    type Output = Self;

    fn sub(self, rhs: T) -> Self {
        Self::raw(self.value - rhs, self.variance)
    }
}

impl<T: Float> Mul<T> for Estimate<T> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self {
        Self::raw(self.value * rhs, self.variance * rhs * rhs)
    }
}

impl<T: Float> Div<T> for Estimate<T> {
    type Output = Self;

    fn div(self, rhs: T) -> Self {
        self * rhs.recip()
    }
}

macro_rules! impl_scalar_lhs_ops {
    ($($t:ty),*) => {$(
        impl Add<Estimate<$t>> for $t {
            type Output = Estimate<$t>;

            fn add(self, rhs: Estimate<$t>) -> Estimate<$t> {
                rhs + self
            }
        }

        impl Sub<Estimate<$t>> for $t {
            type Output = Estimate<$t>;

            fn sub(self, rhs: Estimate<$t>) -> Estimate<$t> {
                Estimate::raw(self - rhs.value, rhs.variance)
            }
        }

        impl Mul<Estimate<$t>> for $t {
            type Output = Estimate<$t>;

            fn mul(self, rhs: Estimate<$t>) -> Estimate<$t> {
                rhs * self
            }
        }

        impl Div<Estimate<$t>> for $t {
            type Output = Estimate<$t>;

            fn div(self, rhs: Estimate<$t>) -> Estimate<$t> {
                Estimate::exact(self) / rhs
            }
        }
    )*};
}

impl_scalar_lhs_ops!(f32, f64);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // --- construction ---

    #[test]
    fn test_new() {
        let e = Estimate::new(1.5, 0.25);
        assert_eq!(e.value(), 1.5);
        assert_eq!(e.variance(), 0.25);
        assert_eq!(e.stddev(), 0.5);
    }

    #[test]
    fn test_from_stddev_squares() {
        let e = Estimate::from_stddev(3.0, 0.2);
        assert_relative_eq!(e.variance(), 0.04, max_relative = 1e-15);
    }

    #[test]
    #[should_panic(expected = "variance must be non-negative")]
    fn test_new_negative_variance_panics() {
        Estimate::new(1.0, -1e-12);
    }

    #[test]
    #[should_panic(expected = "variance must be non-negative")]
    fn test_from_stddev_negative_panics() {
        Estimate::from_stddev(1.0, -0.1);
    }

    #[test]
    fn test_try_new() {
        assert_eq!(Estimate::try_new(1.0, -1.0), Err(StatsError::NegativeVariance));
        assert_eq!(Estimate::try_from_stddev(1.0, -1.0), Err(StatsError::NegativeVariance));
        assert!(Estimate::try_new(1.0, 0.0).is_ok());
    }

    #[test]
    fn test_nan_variance_accepted() {
        assert!(Estimate::new(1.0, f64::NAN).is_nan());
    }

    #[test]
    fn test_default_is_nan() {
        let e = Estimate::<f64>::default();
        assert!(e.value().is_nan());
        assert!(e.variance().is_nan());
        assert!(e.is_nan());
    }

    #[test]
    fn test_exact_and_from() {
        let e: Estimate<f32> = 4.0_f32.into();
        assert_eq!(e, Estimate::exact(4.0));
        assert_eq!(e.variance(), 0.0);
    }

    // --- arithmetic ---

    #[test]
    fn test_add_sub_variances_add() {
        let a = Estimate::new(5.0, 0.5);
        let b = Estimate::new(2.0, 0.25);
        assert_eq!(a + b, Estimate::new(7.0, 0.75));
        assert_eq!(a - b, Estimate::new(3.0, 0.75));
    }

    #[test]
    fn test_mul_exact_variance() {
        let a = Estimate::new(2.0, 0.1);
        let b = Estimate::new(3.0, 0.2);
        let p = a * b;
        assert_eq!(p.value(), 6.0);
        assert_relative_eq!(p.variance(), 0.1 * 0.2 + 0.1 * 9.0 + 4.0 * 0.2, max_relative = 1e-14);
    }

    #[test]
    fn test_div_matches_ratio_formula() {
        let (v1, s1) = (4.0, 0.09);
        let (v2, s2) = (2.0, 0.01);
        let q = Estimate::new(v1, s1) / Estimate::new(v2, s2);
        assert_eq!(q.value(), 2.0);
        let expected = (s1 + (v1 / v2) * (v1 / v2) * s2) / (v2 * v2);
        assert_relative_eq!(q.variance(), expected, max_relative = 1e-14);
    }

    #[test]
    fn test_neg() {
        let e = -Estimate::new(2.0, 0.3);
        assert_eq!(e, Estimate::new(-2.0, 0.3));
    }

    #[test]
    fn test_scalar_ops() {
        let e = Estimate::new(2.0_f64, 0.5);
        assert_eq!(e + 1.0, Estimate::new(3.0, 0.5));
        assert_eq!(1.0 + e, Estimate::new(3.0, 0.5));
        assert_eq!(e - 1.0, Estimate::new(1.0, 0.5));
        assert_eq!(1.0 - e, Estimate::new(-1.0, 0.5));
        assert_eq!(e * 3.0, Estimate::new(6.0, 4.5));
        assert_eq!(3.0 * e, Estimate::new(6.0, 4.5));
        assert_eq!(e / 2.0, Estimate::new(1.0, 0.125));
    }

    #[test]
    fn test_scalar_over_estimate() {
        let e = Estimate::new(4.0_f64, 0.16);
        let r = 2.0 / e;
        assert_eq!(r.value(), 0.5);
        // d(2/x)/dx = -2/x² = -0.125
        assert_relative_eq!(r.variance(), 0.125 * 0.125 * 0.16, max_relative = 1e-14);
    }

    #[test]
    fn test_exact_operand_is_scaling() {
        let a = Estimate::new(1.5, 0.2);
        let scaled = a * Estimate::exact(4.0);
        assert_relative_eq!(scaled.variance(), (a * 4.0).variance(), max_relative = 1e-15);
    }

    #[test]
    fn test_nan_propagates_without_panic() {
        let e = Estimate::default() + Estimate::new(1.0, 1.0);
        assert!(e.is_nan());
        let q = Estimate::new(1.0, 1.0) / Estimate::<f64>::default();
        assert!(q.is_nan());
    }

    #[test]
    fn test_division_by_exact_zero_is_not_finite() {
        let q = Estimate::new(1.0_f64, 0.1) / Estimate::new(0.0, 0.1);
        assert!(!q.value().is_finite());
        assert!(!q.variance().is_finite());
    }

    // --- formatting ---

    #[test]
    fn test_display() {
        let e = Estimate::new(1.5, 0.25);
        assert_eq!(e.to_string(), "1.5 +- 0.5");
        assert_eq!(format!("{e:.2}"), "1.50 +- 0.50");
    }

    // --- Measured ---

    #[test]
    fn test_measured_for_plain_floats() {
        assert_eq!(Measured::value(&2.5_f64), 2.5);
        assert_eq!(Measured::variance(&2.5_f64), 0.0);
        assert_eq!(Measured::<f32>::variance(&1.0_f32), 0.0);
    }
}
