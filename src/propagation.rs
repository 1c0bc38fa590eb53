//! First-order propagation of uncertainty through differentiable functions.
//!
//! For `y = f(x₀, …, x_{N−1})` the delta method approximates
//!
//! ```text
//! Var(y) ≈ Σᵢ (∂f/∂xᵢ)² Var(xᵢ) + Σ_{i<j} 2 (∂f/∂xᵢ)(∂f/∂xⱼ) Cov(xᵢ, xⱼ)
//! ```
//!
//! with all partial derivatives evaluated at the arguments' central values.
//!
//! # Numerical notes
//!
//! The terms mix large diagonal contributions with small cross-covariance
//! corrections of either sign, so they are accumulated with
//! [`NeumaierSum`] rather than a plain running sum.
//!
//! Reference: JCGM 100:2008, *Guide to the Expression of Uncertainty in
//! Measurement*, §5.1–5.2.

use num_traits::Float;

use crate::error::{Result, StatsError};
use crate::estimate::{Estimate, Measured};
use crate::summation::NeumaierSum;

/// A real function of `N` arguments that reports its value and gradient.
pub trait Differentiable<T, const N: usize> {
    /// `f(point)`.
    fn value_at(&self, point: &[T; N]) -> T;

    /// `(∂f/∂x₀, …, ∂f/∂x_{N−1})` at `point`.
    fn gradient_at(&self, point: &[T; N]) -> [T; N];
}

/// Adapts a pair of closures into a [`Differentiable`] function.
///
/// # Examples
/// ```
/// use u_estimate::propagation::{propagate, DifferentiableFn};
/// use u_estimate::Estimate;
///
/// // Area of a rectangle
/// let area = DifferentiableFn::new(|p: &[f64; 2]| p[0] * p[1], |p: &[f64; 2]| [p[1], p[0]]);
/// let a = propagate(&area, &[Estimate::new(2.0, 0.01), Estimate::new(3.0, 0.04)]);
/// assert_eq!(a.value(), 6.0);
/// assert!((a.variance() - (9.0 * 0.01 + 4.0 * 0.04)).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DifferentiableFn<V, G> {
    value: V,
    gradient: G,
}

impl<V, G> DifferentiableFn<V, G> {
    pub fn new(value: V, gradient: G) -> Self {
        Self { value, gradient }
    }
}

impl<T, V, G, const N: usize> Differentiable<T, N> for DifferentiableFn<V, G>
where
    V: Fn(&[T; N]) -> T,
    G: Fn(&[T; N]) -> [T; N],
{
    fn value_at(&self, point: &[T; N]) -> T {
        (self.value)(point)
    }

    fn gradient_at(&self, point: &[T; N]) -> [T; N] {
        (self.gradient)(point)
    }
}

/// `f(a, b) = a / b`, with gradient `(1/b, −a/b²)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quotient;

impl<T: Float> Differentiable<T, 2> for Quotient {
    fn value_at(&self, point: &[T; 2]) -> T {
        point[0] / point[1]
    }

    fn gradient_at(&self, point: &[T; 2]) -> [T; 2] {
        let [a, b] = *point;
        [b.recip(), -a / (b * b)]
    }
}

/// Covariance structure of the arguments.
///
/// Slices are read in row-major order over the upper triangle of the
/// covariance matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Covariance<'a, T> {
    /// Arguments are mutually independent. Each argument's own variance
    /// sits on the diagonal.
    Independent,
    /// Strictly upper triangle `Cov(x₀,x₁), …, Cov(x₀,x_{N−1}), Cov(x₁,x₂), …`
    /// with `N(N−1)/2` entries. The diagonal comes from the arguments.
    Correlated(&'a [T]),
    /// Full upper triangle `Var(x₀), Cov(x₀,x₁), …, Var(x₁), Cov(x₁,x₂), …`
    /// with `N(N+1)/2` entries. The arguments' own variances are ignored.
    Full(&'a [T]),
}

impl<T> Covariance<'_, T> {
    /// Checks the slice length against the argument count `n`.
    fn check(&self, n: usize) -> Result<()> {
        let (expected, actual) = match self {
            Covariance::Independent => return Ok(()),
            Covariance::Correlated(entries) => (n * n.saturating_sub(1) / 2, entries.len()),
            Covariance::Full(entries) => (n * (n + 1) / 2, entries.len()),
        };
        if expected != actual {
            return Err(StatsError::CovarianceLength { expected, actual });
        }
        Ok(())
    }
}

/// Propagates independent arguments through `function`.
///
/// Arguments may be plain floats (zero variance) or [`Estimate`]s; to mix
/// both in one call, lift the plain values with [`Estimate::exact`].
///
/// # Examples
/// ```
/// use u_estimate::propagation::{propagate, DifferentiableFn};
/// use u_estimate::Estimate;
///
/// let identity = DifferentiableFn::new(|p: &[f64; 1]| p[0], |_: &[f64; 1]| [1.0]);
/// let x = Estimate::new(4.2, 0.3);
/// assert_eq!(propagate(&identity, &[x]), x);
/// ```
pub fn propagate<T, F, A, const N: usize>(function: &F, arguments: &[A; N]) -> Estimate<T>
where
    T: Float,
    F: Differentiable<T, N> + ?Sized,
    A: Measured<T>,
{
    let (value, variance) = evaluate(function, arguments, Covariance::Independent);
    Estimate::raw(value, variance)
}

/// Propagates arguments with an explicit covariance structure.
///
/// # Panics
/// If the covariance slice has the wrong length for `N`, or if the
/// resulting variance is negative (the covariance matrix was not positive
/// semi-definite).
///
/// # Examples
/// ```
/// use u_estimate::propagation::{propagate_with, Covariance, DifferentiableFn};
///
/// // Var(x − y) with Var(x) = Var(y) = 1 and Cov(x, y) = 0.5
/// let diff = DifferentiableFn::new(|p: &[f64; 2]| p[0] - p[1], |_: &[f64; 2]| [1.0, -1.0]);
/// let d = propagate_with(&diff, &[3.0, 1.0], Covariance::Full(&[1.0, 0.5, 1.0]));
/// assert_eq!(d.value(), 2.0);
/// assert!((d.variance() - 1.0).abs() < 1e-15);
/// ```
pub fn propagate_with<T, F, A, const N: usize>(
    function: &F,
    arguments: &[A; N],
    covariance: Covariance<'_, T>,
) -> Estimate<T>
where
    T: Float,
    F: Differentiable<T, N> + ?Sized,
    A: Measured<T>,
{
    match try_propagate_with(function, arguments, covariance) {
        Ok(estimate) => estimate,
        Err(e) => panic!("{e}"),
    }
}

/// Fallible form of [`propagate_with`].
///
/// # Errors
/// - [`StatsError::CovarianceLength`] if the slice length does not match `N`.
/// - [`StatsError::NegativeVariance`] if the propagated variance is negative.
pub fn try_propagate_with<T, F, A, const N: usize>(
    function: &F,
    arguments: &[A; N],
    covariance: Covariance<'_, T>,
) -> Result<Estimate<T>>
where
    T: Float,
    F: Differentiable<T, N> + ?Sized,
    A: Measured<T>,
{
    covariance.check(N)?;
    let (value, variance) = evaluate(function, arguments, covariance);
    if variance < T::zero() {
        tracing::warn!("propagated variance is negative; covariance is not positive semi-definite");
        return Err(StatsError::NegativeVariance);
    }
    Ok(Estimate::raw(value, variance))
}

/// Returns `(f(x), Var(f(x)))`. The covariance length is already checked.
pub(crate) fn evaluate<T, F, A, const N: usize>(
    function: &F,
    arguments: &[A; N],
    covariance: Covariance<'_, T>,
) -> (T, T)
where
    T: Float,
    F: Differentiable<T, N> + ?Sized,
    A: Measured<T>,
{
    let point: [T; N] = std::array::from_fn(|i| arguments[i].value());
    let value = function.value_at(&point);
    let gradient = function.gradient_at(&point);

    let two = T::one() + T::one();
    let entries: &[T] = match covariance {
        Covariance::Independent => &[],
        Covariance::Correlated(entries) | Covariance::Full(entries) => entries,
    };
    let mut entries = entries.iter();
    let mut next_entry = || entries.next().copied().unwrap_or_else(T::zero);

    let mut variance = NeumaierSum::new();
    for i in 0..N {
        let var_i = match covariance {
            Covariance::Full(_) => next_entry(),
            _ => arguments[i].variance(),
        };
        variance.add(gradient[i] * gradient[i] * var_i);

        if matches!(covariance, Covariance::Independent) {
            continue;
        }
        for j in (i + 1)..N {
            variance.add(two * gradient[i] * gradient[j] * next_entry());
        }
    }
    (value, variance.total())
}
