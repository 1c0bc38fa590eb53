//! One-pass summary statistics for samples of plain values, estimates,
//! and pairs of either.
//!
//! The element type selects the algorithm:
//!
//! | Element                     | Accumulator                  | Weighting              |
//! |-----------------------------|------------------------------|------------------------|
//! | `f32`, `f64`                | [`WelfordAccumulator`]       | unit                   |
//! | [`Estimate<T>`]             | [`WeightedAccumulator`]      | `1 / Var(x)`           |
//! | `(f64, f64)`, `(f32, f32)`  | [`PairAccumulator`]          | unit                   |
//! | `(Estimate<T>, Estimate<T>)`, `(T, Estimate<T>)` | [`WeightedPairAccumulator`] | `1 / Var(y)` |
//!
//! References to any of these work too, so slices can be analyzed without
//! copying.
//!
//! # Algorithms
//!
//! - **Unweighted**: Welford's online update. For the n-th value,
//!   `δ = x − mean`, `mean += δ/n`, `M₂ += δ · (δ/n) · (n − 1)`, and the
//!   sample variance is `M₂ / (n − 1)`.
//!   Reference: Welford (1962), *Technometrics* 4(3), pp. 419–420.
//! - **Weighted**: West's incremental update with inverse-variance weights.
//!   `W += w`, `mean += (w/W) δ`, `M₂ += w δ (x − mean)`; the variance
//!   divides by the effective degrees of freedom `W − W₂/W`.
//!   Reference: West (1979), "Updating Mean and Variance Estimates: An
//!   Improved Method", *Communications of the ACM* 22(9).
//! - **Pairs**: the same updates run on both coordinates, plus a
//!   co-moment `C += w δx (y − mean_y)` so the covariance needs no
//!   second pass.

use num_traits::Float;

use crate::error::{Result, StatsError};
use crate::estimate::Estimate;

/// How the observations of a sample were weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Weighting {
    /// Every observation has weight 1.
    Unit,
    /// Each observation is weighted by the reciprocal of its variance.
    InverseVariance,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Summary of a univariate sample.
///
/// The mean is an [`Estimate`] whose variance is the squared standard
/// error of the mean: `Var(x)/n` for unit weights, `1/W` for
/// inverse-variance weights.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisResult<T = f64> {
    size: usize,
    mean: Estimate<T>,
    variance: T,
    weight_sum: T,
    weight2_sum: T,
    weighting: Weighting,
}

impl<T: Float> AnalysisResult<T> {
    /// Number of observations.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Mean with its standard error.
    ///
    /// # Panics
    /// If the sample is empty or its weight sum is zero.
    pub fn mean(&self) -> Estimate<T> {
        match self.try_mean() {
            Ok(mean) => mean,
            Err(e) => panic!("{e}"),
        }
    }

    /// # Errors
    /// [`StatsError::EmptySample`] or [`StatsError::ZeroWeightSum`].
    pub fn try_mean(&self) -> Result<Estimate<T>> {
        check_mean(self.size, self.weight_sum)?;
        Ok(self.mean)
    }

    /// Sample variance of the raw values.
    ///
    /// # Panics
    /// If fewer than two observations were seen.
    pub fn variance(&self) -> T {
        match self.try_variance() {
            Ok(variance) => variance,
            Err(e) => panic!("{e}"),
        }
    }

    /// # Errors
    /// [`StatsError::InsufficientData`] if `size < 2`.
    pub fn try_variance(&self) -> Result<T> {
        check_variance(self.size)?;
        Ok(self.variance)
    }

    /// Sample standard deviation. Panics like [`AnalysisResult::variance`].
    pub fn stddev(&self) -> T {
        self.variance().sqrt()
    }

    /// `W = Σ wᵢ`.
    pub fn weight_sum(&self) -> T {
        self.weight_sum
    }

    /// `W₂ = Σ wᵢ²`.
    pub fn weight2_sum(&self) -> T {
        self.weight2_sum
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }
}

/// Summary of a bivariate sample: both marginals plus their covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairAnalysisResult<T = f64> {
    size: usize,
    x_mean: T,
    x_variance: T,
    y_mean: T,
    y_variance: T,
    covariance: T,
    weight_sum: T,
    weight2_sum: T,
    weighting: Weighting,
}

impl<T: Float> PairAnalysisResult<T> {
    pub fn size(&self) -> usize {
        self.size
    }

    /// # Panics
    /// If the sample is empty or its weight sum is zero.
    pub fn x_mean(&self) -> T {
        match self.try_x_mean() {
            Ok(mean) => mean,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_x_mean(&self) -> Result<T> {
        check_mean(self.size, self.weight_sum)?;
        Ok(self.x_mean)
    }

    /// # Panics
    /// If the sample is empty or its weight sum is zero.
    pub fn y_mean(&self) -> T {
        match self.try_y_mean() {
            Ok(mean) => mean,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_y_mean(&self) -> Result<T> {
        check_mean(self.size, self.weight_sum)?;
        Ok(self.y_mean)
    }

    /// # Panics
    /// If fewer than two pairs were seen.
    pub fn x_variance(&self) -> T {
        match self.try_x_variance() {
            Ok(variance) => variance,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_x_variance(&self) -> Result<T> {
        check_variance(self.size)?;
        Ok(self.x_variance)
    }

    /// # Panics
    /// If fewer than two pairs were seen.
    pub fn y_variance(&self) -> T {
        match self.try_y_variance() {
            Ok(variance) => variance,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_y_variance(&self) -> Result<T> {
        check_variance(self.size)?;
        Ok(self.y_variance)
    }

    pub fn x_stddev(&self) -> T {
        self.x_variance().sqrt()
    }

    pub fn y_stddev(&self) -> T {
        self.y_variance().sqrt()
    }

    /// Sample covariance of x and y.
    ///
    /// # Panics
    /// If fewer than two pairs were seen.
    pub fn covariance(&self) -> T {
        match self.try_covariance() {
            Ok(covariance) => covariance,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_covariance(&self) -> Result<T> {
        check_variance(self.size)?;
        Ok(self.covariance)
    }

    /// Pearson correlation coefficient `Cov(x, y) / (σx σy)`.
    ///
    /// NaN if either coordinate is constant.
    ///
    /// # Panics
    /// If fewer than two pairs were seen.
    pub fn correlation(&self) -> T {
        self.covariance() / (self.x_stddev() * self.y_stddev())
    }

    pub fn weight_sum(&self) -> T {
        self.weight_sum
    }

    pub fn weight2_sum(&self) -> T {
        self.weight2_sum
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }
}

fn check_mean<T: Float>(size: usize, weight_sum: T) -> Result<()> {
    if size == 0 {
        return Err(StatsError::EmptySample);
    }
    if weight_sum == T::zero() {
        return Err(StatsError::ZeroWeightSum);
    }
    Ok(())
}

fn check_variance(size: usize) -> Result<()> {
    if size < 2 {
        return Err(StatsError::InsufficientData {
            required: 2,
            actual: size,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Accumulators
// ---------------------------------------------------------------------------

/// Streaming state of a one-pass analysis.
///
/// `finish` may be called at any point; it does not consume the state.
pub trait Accumulator: Default {
    type Item;
    type Output;

    fn update(&mut self, item: Self::Item);

    /// Number of items seen so far.
    fn count(&self) -> usize;

    fn finish(&self) -> Self::Output;
}

/// Unweighted running mean and variance.
///
/// # Examples
/// ```
/// use u_estimate::sample::{Accumulator, WelfordAccumulator};
/// let mut acc = WelfordAccumulator::new();
/// for x in [2.0_f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
///     acc.update(x);
/// }
/// let result = acc.finish();
/// assert_eq!(result.mean().value(), 5.0);
/// assert!((result.variance() - 4.571428571428571).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct WelfordAccumulator<T = f64> {
    count: usize,
    n: T,
    mean: T,
    m2: T,
}

impl<T: Float> WelfordAccumulator<T> {
    pub fn new() -> Self {
        Self {
            count: 0,
            n: T::zero(),
            mean: T::zero(),
            m2: T::zero(),
        }
    }
}

impl<T: Float> Default for WelfordAccumulator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Accumulator for WelfordAccumulator<T> {
    type Item = T;
    type Output = AnalysisResult<T>;

    fn update(&mut self, x: T) {
        let n1 = self.n;
        self.count += 1;
        self.n = self.n + T::one();

        if self.count == 1 {
            // δ² of a huge first value would overflow; nothing to accumulate yet.
            self.mean = x;
            return;
        }

        let delta = x - self.mean;
        let r_delta = delta / self.n;
        self.mean = self.mean + r_delta;
        self.m2 = self.m2 + delta * r_delta * n1;
    }

    fn count(&self) -> usize {
        self.count
    }

    fn finish(&self) -> AnalysisResult<T> {
        let variance = if self.count > 1 {
            self.m2 / (self.n - T::one())
        } else {
            T::nan()
        };
        AnalysisResult {
            size: self.count,
            mean: Estimate::raw(self.mean, variance / self.n),
            variance,
            weight_sum: self.n,
            weight2_sum: self.n,
            weighting: Weighting::Unit,
        }
    }
}

/// Inverse-variance weighted running mean and variance.
///
/// An observation with zero variance has infinite weight and turns the
/// weighted statistics into NaN. One with infinite variance has zero weight:
/// it is counted in `size` but leaves the moments untouched.
///
/// # Examples
/// ```
/// use u_estimate::sample::{Accumulator, WeightedAccumulator};
/// use u_estimate::Estimate;
/// let mut acc = WeightedAccumulator::new();
/// acc.update(Estimate::new(1.0_f64, 0.5)); // weight 2
/// acc.update(Estimate::new(3.0, 0.125)); // weight 8
/// let mean = acc.finish().mean();
/// assert!((mean.value() - 2.6).abs() < 1e-12);
/// assert!((mean.variance() - 0.1).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct WeightedAccumulator<T = f64> {
    count: usize,
    w_sum: T,
    w2_sum: T,
    mean: T,
    m2: T,
}

impl<T: Float> WeightedAccumulator<T> {
    pub fn new() -> Self {
        Self {
            count: 0,
            w_sum: T::zero(),
            w2_sum: T::zero(),
            mean: T::zero(),
            m2: T::zero(),
        }
    }
}

impl<T: Float> Default for WeightedAccumulator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Accumulator for WeightedAccumulator<T> {
    type Item = Estimate<T>;
    type Output = AnalysisResult<T>;

    fn update(&mut self, estimate: Estimate<T>) {
        self.count += 1;
        let x = estimate.value();
        let w = inverse_variance_weight(estimate);
        if w == T::zero() {
            // Infinite variance: counted, but carries no information.
            return;
        }
        let delta = x - self.mean;

        self.w_sum = self.w_sum + w;
        self.w2_sum = self.w2_sum + w * w;
        self.mean = self.mean + (w / self.w_sum) * delta;
        self.m2 = self.m2 + w * delta * (x - self.mean);
    }

    fn count(&self) -> usize {
        self.count
    }

    fn finish(&self) -> AnalysisResult<T> {
        let variance = if self.count > 1 {
            self.m2 / effective_dof(self.w_sum, self.w2_sum)
        } else {
            T::nan()
        };
        AnalysisResult {
            size: self.count,
            mean: Estimate::raw(self.mean, self.w_sum.recip()),
            variance,
            weight_sum: self.w_sum,
            weight2_sum: self.w2_sum,
            weighting: Weighting::InverseVariance,
        }
    }
}

/// Unweighted running means, variances and covariance of `(x, y)` pairs.
///
/// # Examples
/// ```
/// use u_estimate::sample::{Accumulator, PairAccumulator};
/// let mut acc = PairAccumulator::new();
/// for i in 1..=5 {
///     let x = i as f64;
///     acc.update((x, 2.0 * x));
/// }
/// let result = acc.finish();
/// assert!((result.covariance() - 5.0).abs() < 1e-12);
/// assert!((result.correlation() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct PairAccumulator<T = f64> {
    count: usize,
    n: T,
    x_mean: T,
    x_m2: T,
    y_mean: T,
    y_m2: T,
    c: T,
}

impl<T: Float> PairAccumulator<T> {
    pub fn new() -> Self {
        Self {
            count: 0,
            n: T::zero(),
            x_mean: T::zero(),
            x_m2: T::zero(),
            y_mean: T::zero(),
            y_m2: T::zero(),
            c: T::zero(),
        }
    }
}

impl<T: Float> Default for PairAccumulator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Accumulator for PairAccumulator<T> {
    type Item = (T, T);
    type Output = PairAnalysisResult<T>;

    fn update(&mut self, (x, y): (T, T)) {
        let n1 = self.n;
        self.count += 1;
        self.n = self.n + T::one();

        if self.count == 1 {
            self.x_mean = x;
            self.y_mean = y;
            return;
        }

        let delta_x = x - self.x_mean;
        let r_delta_x = delta_x / self.n;
        let delta_y = y - self.y_mean;
        let r_delta_y = delta_y / self.n;

        self.x_mean = self.x_mean + r_delta_x;
        self.x_m2 = self.x_m2 + delta_x * r_delta_x * n1;

        self.y_mean = self.y_mean + r_delta_y;
        self.y_m2 = self.y_m2 + delta_y * r_delta_y * n1;

        // Uses the updated y mean: δx (y − ȳₙ) = δx δy (n−1)/n
        self.c = self.c + delta_x * (y - self.y_mean);
    }

    fn count(&self) -> usize {
        self.count
    }

    fn finish(&self) -> PairAnalysisResult<T> {
        let factor = if self.count > 1 {
            (self.n - T::one()).recip()
        } else {
            T::nan()
        };
        PairAnalysisResult {
            size: self.count,
            x_mean: self.x_mean,
            x_variance: self.x_m2 * factor,
            y_mean: self.y_mean,
            y_variance: self.y_m2 * factor,
            covariance: self.c * factor,
            weight_sum: self.n,
            weight2_sum: self.n,
            weighting: Weighting::Unit,
        }
    }
}

/// Weighted running statistics of `(x, y)` pairs, where only `y` carries
/// an uncertainty. Each pair is weighted by `1 / Var(y)`; `x` is exact.
#[derive(Debug, Clone)]
pub struct WeightedPairAccumulator<T = f64> {
    count: usize,
    w_sum: T,
    w2_sum: T,
    x_mean: T,
    x_m2: T,
    y_mean: T,
    y_m2: T,
    c: T,
}

impl<T: Float> WeightedPairAccumulator<T> {
    pub fn new() -> Self {
        Self {
            count: 0,
            w_sum: T::zero(),
            w2_sum: T::zero(),
            x_mean: T::zero(),
            x_m2: T::zero(),
            y_mean: T::zero(),
            y_m2: T::zero(),
            c: T::zero(),
        }
    }
}

impl<T: Float> Default for WeightedPairAccumulator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Accumulator for WeightedPairAccumulator<T> {
    type Item = (T, Estimate<T>);
    type Output = PairAnalysisResult<T>;

    fn update(&mut self, (x, y_estimate): (T, Estimate<T>)) {
        self.count += 1;
        let y = y_estimate.value();
        let w = inverse_variance_weight(y_estimate);
        if w == T::zero() {
            return;
        }
        let delta_x = x - self.x_mean;
        let delta_y = y - self.y_mean;

        self.w_sum = self.w_sum + w;
        self.w2_sum = self.w2_sum + w * w;
        let r = w / self.w_sum;

        self.x_mean = self.x_mean + r * delta_x;
        self.x_m2 = self.x_m2 + w * delta_x * (x - self.x_mean);

        self.y_mean = self.y_mean + r * delta_y;
        self.y_m2 = self.y_m2 + w * delta_y * (y - self.y_mean);

        self.c = self.c + w * delta_x * (y - self.y_mean);
    }

    fn count(&self) -> usize {
        self.count
    }

    fn finish(&self) -> PairAnalysisResult<T> {
        let factor = if self.count > 1 {
            effective_dof(self.w_sum, self.w2_sum).recip()
        } else {
            T::nan()
        };
        PairAnalysisResult {
            size: self.count,
            x_mean: self.x_mean,
            x_variance: self.x_m2 * factor,
            y_mean: self.y_mean,
            y_variance: self.y_m2 * factor,
            covariance: self.c * factor,
            weight_sum: self.w_sum,
            weight2_sum: self.w2_sum,
            weighting: Weighting::InverseVariance,
        }
    }
}

fn inverse_variance_weight<T: Float>(estimate: Estimate<T>) -> T {
    let w = estimate.variance().recip();
    if w.is_infinite() {
        tracing::warn!("observation with zero variance has infinite weight; weighted statistics are undefined");
    }
    w
}

/// `W − W₂/W`, the weighted analogue of `n − 1`.
fn effective_dof<T: Float>(w_sum: T, w2_sum: T) -> T {
    w_sum - w2_sum / w_sum
}

// ---------------------------------------------------------------------------
// Element dispatch
// ---------------------------------------------------------------------------

/// An element type that can be analyzed; picks its [`Accumulator`].
pub trait Sampled {
    type Accumulator: Accumulator;

    fn feed(self, acc: &mut Self::Accumulator);
}

/// Output of [`analyze_sample`] for elements of type `S`.
pub type Analysis<S> = <<S as Sampled>::Accumulator as Accumulator>::Output;

macro_rules! impl_sampled_for_float {
    ($($t:ty),*) => {$(
        impl Sampled for $t {
            type Accumulator = WelfordAccumulator<$t>;

            fn feed(self, acc: &mut Self::Accumulator) {
                acc.update(self);
            }
        }

        impl Sampled for ($t, $t) {
            type Accumulator = PairAccumulator<$t>;

            fn feed(self, acc: &mut Self::Accumulator) {
                acc.update(self);
            }
        }
    )*};
}

impl_sampled_for_float!(f32, f64);

impl<T: Float> Sampled for Estimate<T> {
    type Accumulator = WeightedAccumulator<T>;

    fn feed(self, acc: &mut Self::Accumulator) {
        acc.update(self);
    }
}

impl<T: Float> Sampled for (Estimate<T>, Estimate<T>) {
    type Accumulator = WeightedPairAccumulator<T>;

    fn feed(self, acc: &mut Self::Accumulator) {
        acc.update((self.0.value(), self.1));
    }
}

impl<T: Float> Sampled for (T, Estimate<T>) {
    type Accumulator = WeightedPairAccumulator<T>;

    fn feed(self, acc: &mut Self::Accumulator) {
        acc.update(self);
    }
}

impl<S: Sampled + Copy> Sampled for &S {
    type Accumulator = S::Accumulator;

    fn feed(self, acc: &mut Self::Accumulator) {
        (*self).feed(acc);
    }
}

/// Analyzes `sample` in a single forward pass.
///
/// The sample is consumed lazily, so iterators of any length work without
/// being collected first.
///
/// # Complexity
/// Time: O(n), Space: O(1)
///
/// # Examples
/// ```
/// use u_estimate::{analyze_sample, Estimate};
///
/// let plain = analyze_sample([1.0_f64, 2.0, 3.0, 4.0, 5.0]);
/// assert_eq!(plain.mean().value(), 3.0);
/// assert_eq!(plain.variance(), 2.5);
///
/// // Inverse-variance weighted mean of two measurements
/// let k = analyze_sample([Estimate::new(10.0, 1.0), Estimate::new(12.0, 1.0)]);
/// assert_eq!(k.mean(), Estimate::new(11.0, 0.5));
/// ```
pub fn analyze_sample<I>(sample: I) -> Analysis<I::Item>
where
    I: IntoIterator,
    I::Item: Sampled,
{
    let mut acc = <I::Item as Sampled>::Accumulator::default();
    for item in sample {
        item.feed(&mut acc);
    }
    acc.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
