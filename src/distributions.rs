//! Probability distributions and their estimators.
//!
//! Parameter-validated continuous distributions with CDF evaluation and
//! a constructor that estimates parameters from observed data.
//!
//! | Distribution | Parameters | Estimator |
//! |---|---|---|
//! | [`Normal`] | μ, σ | MLE: mean, population std |
//! | [`LogNormal`] | μ, σ of ln X | MLE on ln x (location 0) |
//! | [`Gamma`] | shape k, scale θ | MLE, Newton on ψ (location 0) |
//! | [`Beta`] | α, β on `[0, 1]` | method of moments |
//! | [`Uniform`] | min, max | observed extremes |
//!
//! Parameters are plain `f64` values; nothing here knows about costs or
//! scenarios.

use serde::Serialize;

use crate::special;
use crate::stats;

/// Error type for invalid parameters or unusable estimation input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistributionError {
    /// Parameters violate distribution constraints.
    #[error("invalid distribution parameters: {0}")]
    InvalidParameters(String),

    /// The estimator needs more observations than were supplied.
    #[error("need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Observations fall outside the distribution's support.
    #[error("observation outside support: {0}")]
    OutsideSupport(String),

    /// An iterative estimator failed to converge.
    #[error("estimator did not converge: {0}")]
    NoConvergence(String),
}

fn require(data: &[f64], needed: usize) -> Result<(), DistributionError> {
    if data.len() < needed {
        return Err(DistributionError::InsufficientData {
            needed,
            got: data.len(),
        });
    }
    if let Some(bad) = data.iter().find(|x| !x.is_finite()) {
        return Err(DistributionError::OutsideSupport(format!(
            "non-finite observation {bad}"
        )));
    }
    Ok(())
}

// ============================================================================
// Normal
// ============================================================================

/// Normal distribution N(μ, σ²).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normal {
    mu: f64,
    sigma: f64,
}

impl Normal {
    /// # Errors
    /// Returns `Err` if `sigma ≤ 0` or either parameter is not finite.
    pub fn new(mu: f64, sigma: f64) -> Result<Self, DistributionError> {
        if !mu.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "Normal requires finite μ and σ > 0, got μ={mu}, σ={sigma}"
            )));
        }
        Ok(Self { mu, sigma })
    }

    /// Maximum likelihood fit: sample mean and population std.
    pub fn fit(data: &[f64]) -> Result<Self, DistributionError> {
        require(data, 2)?;
        let mu = stats::mean(data).unwrap_or(f64::NAN);
        let sigma = stats::population_std_dev(data).unwrap_or(f64::NAN);
        Self::new(mu, sigma)
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Φ((x−μ)/σ).
    pub fn cdf(&self, x: f64) -> f64 {
        special::standard_normal_cdf((x - self.mu) / self.sigma)
    }
}

// ============================================================================
// LogNormal
// ============================================================================

/// Log-normal distribution: ln X ~ N(μ, σ²), location fixed at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogNormal {
    mu: f64,
    sigma: f64,
}

impl LogNormal {
    /// # Errors
    /// Returns `Err` if `sigma ≤ 0` or either parameter is not finite.
    pub fn new(mu: f64, sigma: f64) -> Result<Self, DistributionError> {
        if !mu.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "LogNormal requires finite μ and σ > 0, got μ={mu}, σ={sigma}"
            )));
        }
        Ok(Self { mu, sigma })
    }

    /// Maximum likelihood fit on the logarithms of strictly positive data.
    pub fn fit(data: &[f64]) -> Result<Self, DistributionError> {
        require(data, 2)?;
        if let Some(bad) = data.iter().find(|&&x| x <= 0.0) {
            return Err(DistributionError::OutsideSupport(format!(
                "LogNormal needs x > 0, got {bad}"
            )));
        }
        let logs: Vec<f64> = data.iter().map(|x| x.ln()).collect();
        let mu = stats::mean(&logs).unwrap_or(f64::NAN);
        let sigma = stats::population_std_dev(&logs).unwrap_or(f64::NAN);
        Self::new(mu, sigma)
    }

    /// Mean and std dev of ln X.
    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Φ((ln x − μ)/σ) for x > 0, zero otherwise.
    pub fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        special::standard_normal_cdf((x.ln() - self.mu) / self.sigma)
    }
}

// ============================================================================
// Gamma
// ============================================================================

/// Gamma distribution with shape `k` and scale `θ`, location fixed at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gamma {
    shape: f64,
    scale: f64,
}

impl Gamma {
    /// # Errors
    /// Returns `Err` unless both parameters are finite and positive.
    pub fn new(shape: f64, scale: f64) -> Result<Self, DistributionError> {
        if !shape.is_finite() || !scale.is_finite() || shape <= 0.0 || scale <= 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "Gamma requires shape > 0 and scale > 0, got k={shape}, θ={scale}"
            )));
        }
        Ok(Self { shape, scale })
    }

    /// Maximum likelihood fit on strictly positive data.
    ///
    /// # Algorithm
    /// With `s = ln(x̄) − mean(ln x)`, starts from Minka's closed-form
    /// approximation `k₀ = (3 − s + √((s−3)² + 24s)) / (12s)` and refines
    /// with the generalized Newton step
    /// `1/k ← 1/k + (mean(ln x) − ln x̄ + ln k − ψ(k)) / (k²(1/k − ψ′(k)))`.
    /// The scale follows as `θ = x̄ / k`.
    ///
    /// Reference: Minka (2002), "Estimating a Gamma distribution",
    /// Microsoft Research technical note.
    pub fn fit(data: &[f64]) -> Result<Self, DistributionError> {
        require(data, 2)?;
        if let Some(bad) = data.iter().find(|&&x| x <= 0.0) {
            return Err(DistributionError::OutsideSupport(format!(
                "Gamma needs x > 0, got {bad}"
            )));
        }
        let mean = stats::mean(data).unwrap_or(f64::NAN);
        let logs: Vec<f64> = data.iter().map(|x| x.ln()).collect();
        let mean_log = stats::mean(&logs).unwrap_or(f64::NAN);
        let s = mean.ln() - mean_log;
        if !(s > 0.0) || !s.is_finite() {
            return Err(DistributionError::InvalidParameters(format!(
                "Gamma MLE needs spread in the data, got ln(mean) − mean(ln) = {s}"
            )));
        }

        const MAX_ITER: usize = 100;
        const TOL: f64 = 1e-12;

        let mut k = (3.0 - s + ((s - 3.0) * (s - 3.0) + 24.0 * s).sqrt()) / (12.0 * s);
        for _ in 0..MAX_ITER {
            let numerator = mean_log - mean.ln() + k.ln() - special::digamma(k);
            let denominator = k * k * (1.0 / k - special::trigamma(k));
            let next = 1.0 / (1.0 / k + numerator / denominator);
            if !next.is_finite() || next <= 0.0 {
                return Err(DistributionError::NoConvergence(format!(
                    "Gamma shape iteration diverged from k={k}"
                )));
            }
            let converged = (next - k).abs() <= TOL * k;
            k = next;
            if converged {
                return Self::new(k, mean / k);
            }
        }
        Err(DistributionError::NoConvergence(format!(
            "Gamma shape still moving after {MAX_ITER} iterations (k={k})"
        )))
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// P(k, x/θ) via the regularized lower incomplete gamma function.
    pub fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        special::regularized_lower_gamma(self.shape, x / self.scale)
    }
}

// ============================================================================
// Beta
// ============================================================================

/// Beta distribution Beta(α, β) on `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Beta {
    alpha: f64,
    beta: f64,
}

impl Beta {
    /// # Errors
    /// Returns `Err` unless both shape parameters are finite and positive.
    pub fn new(alpha: f64, beta: f64) -> Result<Self, DistributionError> {
        if !alpha.is_finite() || !beta.is_finite() || alpha <= 0.0 || beta <= 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "Beta requires α > 0 and β > 0, got α={alpha}, β={beta}"
            )));
        }
        Ok(Self { alpha, beta })
    }

    /// Method-of-moments fit on data already scaled into `[0, 1]`.
    ///
    /// With sample mean `m` and variance `v`, `c = m(1−m)/v − 1`,
    /// `α = m·c`, `β = (1−m)·c`. Min-max scaled data always contains both
    /// endpoints, where the beta log-likelihood is unbounded, so moments
    /// are used instead of likelihood maximization.
    pub fn fit_unit(data: &[f64]) -> Result<Self, DistributionError> {
        require(data, 2)?;
        if let Some(bad) = data.iter().find(|x| !(0.0..=1.0).contains(*x)) {
            return Err(DistributionError::OutsideSupport(format!(
                "Beta needs values in [0, 1], got {bad}"
            )));
        }
        let m = stats::mean(data).unwrap_or(f64::NAN);
        let v = stats::variance(data).unwrap_or(f64::NAN);
        if !(v > 0.0) {
            return Err(DistributionError::InvalidParameters(
                "Beta moments need non-zero variance".into(),
            ));
        }
        let common = m * (1.0 - m) / v - 1.0;
        Self::new(m * common, (1.0 - m) * common)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// I_x(α, β), clamped outside `[0, 1]`.
    pub fn cdf(&self, x: f64) -> f64 {
        special::regularized_incomplete_beta(x, self.alpha, self.beta)
    }
}

// ============================================================================
// Uniform
// ============================================================================

/// Continuous uniform distribution on `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Uniform {
    min: f64,
    max: f64,
}

impl Uniform {
    /// # Errors
    /// Returns `Err` if `min >= max` or either bound is not finite.
    pub fn new(min: f64, max: f64) -> Result<Self, DistributionError> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(DistributionError::InvalidParameters(format!(
                "Uniform requires min < max, got min={min}, max={max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// The observed range; no optimization involved.
    pub fn fit(data: &[f64]) -> Result<Self, DistributionError> {
        require(data, 2)?;
        let lo = stats::min(data).unwrap_or(f64::NAN);
        let hi = stats::max(data).unwrap_or(f64::NAN);
        Self::new(lo, hi)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// (x − min)/(max − min), clamped to `[0, 1]`.
    pub fn cdf(&self, x: f64) -> f64 {
        ((x - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}
