//! Compensated floating-point summation.
//!
//! Sums that mix terms of very different magnitude (a large variance next
//! to a small covariance correction, say) lose low-order bits when added
//! naively. The accumulator here recovers those bits.
//!
//! # Algorithm
//!
//! Neumaier's improvement of Kahan summation: the running compensation
//! always captures the rounding error of the *smaller* operand, so the
//! result stays accurate even when an addend exceeds the running sum.
//!
//! Reference: Neumaier (1974), "Rundungsfehleranalyse einiger Verfahren
//! zur Summation endlicher Summen", *Zeitschrift für Angewandte
//! Mathematik und Mechanik* 54(1), pp. 39–51.

use num_traits::Float;

/// Running compensated sum.
///
/// # Examples
/// ```
/// use u_estimate::summation::NeumaierSum;
/// let mut acc = NeumaierSum::new();
/// for x in [1e16, 1.0, -1e16] {
///     acc.add(x);
/// }
/// assert_eq!(acc.total(), 1.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct NeumaierSum<T> {
    sum: T,
    compensation: T,
}

impl<T: Float> NeumaierSum<T> {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self {
            sum: T::zero(),
            compensation: T::zero(),
        }
    }

    /// Adds `term`, folding its rounding error into the compensation.
    pub fn add(&mut self, term: T) {
        let t = self.sum + term;
        if self.sum.abs() >= term.abs() {
            self.compensation = self.compensation + ((self.sum - t) + term);
        } else {
            self.compensation = self.compensation + ((term - t) + self.sum);
        }
        self.sum = t;
    }

    /// Returns the compensated total.
    pub fn total(&self) -> T {
        self.sum + self.compensation
    }
}

impl<T: Float> Default for NeumaierSum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Extend<T> for NeumaierSum<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for term in iter {
            self.add(term);
        }
    }
}

/// Sums `terms` with Neumaier compensation.
///
/// # Complexity
/// Time: O(n), Space: O(1)
///
/// # Examples
/// ```
/// use u_estimate::summation::compensated_sum;
/// let naive: f64 = [1e16, 1.0, -1e16].iter().sum();
/// assert_eq!(naive, 0.0);
/// assert_eq!(compensated_sum([1e16, 1.0, -1e16]), 1.0);
/// ```
pub fn compensated_sum<T, I>(terms: I) -> T
where
    T: Float,
    I: IntoIterator<Item = T>,
{
    let mut acc = NeumaierSum::new();
    acc.extend(terms);
    acc.total()
}
