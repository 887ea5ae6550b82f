//! Descriptive statistics over sample columns.
//!
//! Every function returns `None` rather than a NaN-polluted result when
//! the input is empty or not finite; callers decide how to surface that.
//!
//! # Algorithms
//!
//! - **Mean**: Neumaier compensated summation, O(ε) error independent of n.
//! - **Variance/StdDev**: Welford's online update.
//!   Reference: Welford (1962), *Technometrics* 4(3).
//! - **Quantile**: R-7 linear interpolation, the NumPy/pandas default.
//!   Reference: Hyndman & Fan (1996), *The American Statistician* 50(4).

/// Arithmetic mean via compensated summation.
///
/// # Returns
/// - `None` if `data` is empty or contains NaN/Inf.
///
/// # Examples
/// ```
/// use u_costsim::stats::mean;
/// assert_eq!(mean(&[2.0, 4.0, 9.0]), Some(5.0));
/// ```
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() || !all_finite(data) {
        return None;
    }
    let sum = kahan_sum(data);
    if sum.is_finite() {
        Some(sum / data.len() as f64)
    } else {
        // the running mean stays in range when the total overflows
        accumulate(data).mean()
    }
}

/// Sample variance (Bessel-corrected, denominator `n − 1`).
///
/// # Returns
/// - `None` if `data.len() < 2` or contains NaN/Inf.
pub fn variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 || !all_finite(data) {
        return None;
    }
    accumulate(data).sample_variance()
}

/// Population variance (denominator `n`), the maximum likelihood
/// estimator under a normal model.
///
/// # Returns
/// - `None` if `data` is empty or contains NaN/Inf.
pub fn population_variance(data: &[f64]) -> Option<f64> {
    if data.is_empty() || !all_finite(data) {
        return None;
    }
    accumulate(data).population_variance()
}

/// Sample standard deviation, `sqrt(variance(data))`.
///
/// # Examples
/// ```
/// use u_costsim::stats::std_dev;
/// let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
/// assert!((sd - 2.138089935299395).abs() < 1e-10);
/// ```
pub fn std_dev(data: &[f64]) -> Option<f64> {
    variance(data).map(f64::sqrt)
}

/// Population standard deviation, `sqrt(population_variance(data))`.
pub fn population_std_dev(data: &[f64]) -> Option<f64> {
    population_variance(data).map(f64::sqrt)
}

/// Smallest value, or `None` if empty or any value is NaN.
pub fn min(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    data.iter()
        .copied()
        .try_fold(f64::INFINITY, |acc, x| (!x.is_nan()).then(|| acc.min(x)))
}

/// Largest value, or `None` if empty or any value is NaN.
pub fn max(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    data.iter()
        .copied()
        .try_fold(f64::NEG_INFINITY, |acc, x| (!x.is_nan()).then(|| acc.max(x)))
}

/// Returns a sorted copy of `data`, or `None` if it is empty or holds NaN.
///
/// Sort once and feed the result to [`quantile_sorted`] when several
/// quantiles of the same column are needed.
pub fn sorted(data: &[f64]) -> Option<Vec<f64>> {
    if data.is_empty() || data.iter().any(|x| x.is_nan()) {
        return None;
    }
    let mut out = data.to_vec();
    out.sort_unstable_by(f64::total_cmp);
    Some(out)
}

/// The `p`-th quantile of **pre-sorted** data, R-7 method.
///
/// With `h = (n − 1)·p`, `j = ⌊h⌋` and `g = h − j`, returns
/// `x[j] + g·(x[j+1] − x[j])`. The caller guarantees ascending order.
///
/// # Returns
/// - `None` if `sorted_data` is empty or `p ∉ [0, 1]`.
///
/// # Examples
/// ```
/// use u_costsim::stats::quantile_sorted;
/// assert_eq!(quantile_sorted(&[1.0, 2.0, 3.0], 0.5), Some(2.0));
/// assert_eq!(quantile_sorted(&[1.0, 2.0, 3.0, 4.0], 0.5), Some(2.5));
/// ```
pub fn quantile_sorted(sorted_data: &[f64], p: f64) -> Option<f64> {
    let n = sorted_data.len();
    if n == 0 || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let h = (n - 1) as f64 * p;
    let j = h.floor() as usize;
    if j + 1 >= n {
        return Some(sorted_data[n - 1]);
    }
    let g = h - j as f64;
    let (lo, hi) = (sorted_data[j], sorted_data[j + 1]);
    Some(lo + g * (hi - lo))
}

/// Sample covariance with Bessel's correction.
///
/// # Returns
/// - `None` if lengths differ, `n < 2`, or any value is NaN/Inf.
pub fn covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 || !all_finite(x) || !all_finite(y) {
        return None;
    }
    let nf = n as f64;
    let mean_x = kahan_sum(x) / nf;
    let mean_y = kahan_sum(y) / nf;
    let products: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(&a, &b)| (a - mean_x) * (b - mean_y))
        .collect();
    Some(kahan_sum(&products) / (nf - 1.0))
}

/// Pearson correlation coefficient, clamped to `[-1, 1]`.
///
/// # Returns
/// - `None` under the same conditions as [`covariance`], or when either
///   series has zero variance.
///
/// # Examples
/// ```
/// use u_costsim::stats::correlation;
/// let r = correlation(&[1.0, 2.0, 3.0], &[30.0, 20.0, 10.0]).unwrap();
/// assert!((r + 1.0).abs() < 1e-12);
/// ```
pub fn correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    let cov = covariance(x, y)?;
    let sx = std_dev(x)?;
    let sy = std_dev(y)?;
    if sx == 0.0 || sy == 0.0 {
        return None;
    }
    Some((cov / (sx * sy)).clamp(-1.0, 1.0))
}

/// Neumaier compensated summation.
///
/// Improves on plain Kahan by also capturing low-order bits when the
/// addend outweighs the running sum.
///
/// Reference: Neumaier (1974), *ZAMM* 54(1), pp. 39–51.
pub fn kahan_sum(data: &[f64]) -> f64 {
    let (sum, compensation) = data.iter().fold((0.0_f64, 0.0_f64), |(sum, c), &x| {
        let t = sum + x;
        let c = if sum.abs() >= x.abs() {
            c + ((sum - t) + x)
        } else {
            c + ((x - t) + sum)
        };
        (t, c)
    });
    sum + compensation
}

fn all_finite(data: &[f64]) -> bool {
    data.iter().all(|x| x.is_finite())
}

fn accumulate(data: &[f64]) -> WelfordAccumulator {
    let mut acc = WelfordAccumulator::new();
    for &x in data {
        acc.update(x);
    }
    acc
}

/// Streaming mean/variance accumulator (Welford).
///
/// # Examples
/// ```
/// use u_costsim::stats::WelfordAccumulator;
/// let mut acc = WelfordAccumulator::new();
/// for &x in &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
///     acc.update(x);
/// }
/// assert!((acc.mean().unwrap() - 5.0).abs() < 1e-15);
/// assert!((acc.population_variance().unwrap() - 4.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WelfordAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
}

impl WelfordAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one observation.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Variance with denominator `n − 1`; `None` below two observations.
    pub fn sample_variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    /// Variance with denominator `n`; `None` when empty.
    pub fn population_variance(&self) -> Option<f64> {
        (self.count > 0).then(|| self.m2 / self.count as f64)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn finite_vec(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
        proptest::collection::vec(-1e9_f64..1e9, min_len..=max_len)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn variance_non_negative(data in finite_vec(2, 100)) {
            prop_assert!(variance(&data).unwrap() >= 0.0);
        }

        #[test]
        fn quantile_extremes_are_min_max(data in finite_vec(1, 100)) {
            let sorted_data = sorted(&data).unwrap();
            prop_assert_eq!(quantile_sorted(&sorted_data, 0.0), min(&data));
            prop_assert_eq!(quantile_sorted(&sorted_data, 1.0), max(&data));
        }

        #[test]
        fn quantiles_monotonic(data in finite_vec(2, 100), p1 in 0.0_f64..=1.0, p2 in 0.0_f64..=1.0) {
            let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
            let sorted_data = sorted(&data).unwrap();
            let q_lo = quantile_sorted(&sorted_data, lo).unwrap();
            let q_hi = quantile_sorted(&sorted_data, hi).unwrap();
            prop_assert!(q_lo <= q_hi + 1e-9 * q_hi.abs().max(1.0));
        }

        #[test]
        fn correlation_bounded(data in proptest::collection::vec((-1e6_f64..1e6, -1e6_f64..1e6), 3..60)) {
            let (x, y): (Vec<f64>, Vec<f64>) = data.into_iter().unzip();
            if let Some(r) = correlation(&x, &y) {
                prop_assert!((-1.0..=1.0).contains(&r));
            }
        }
    }
}
