//! Descriptive statistics and tail-risk metrics for sample columns.
//!
//! All quantiles use linear interpolation between order statistics.
//! `var_95`/`var_99` read the *lower* 5%/1% tail: for a cost total the
//! "loss" being measured is landing below the reference estimate.

use serde::Serialize;

use crate::error::{Result, SimulationError};
use crate::stats;

/// Quantile-based risk of one column relative to a reference mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskMetrics {
    /// 5th percentile.
    pub var_95: f64,
    /// 1st percentile.
    pub var_99: f64,
    /// Mean of all values at or below `var_95`.
    pub cvar_95: f64,
    /// Same value as `cvar_95`.
    pub expected_shortfall: f64,
    /// Fraction of values strictly below the reference mean.
    pub prob_loss: f64,
}

/// Location, spread and quantiles of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStatistics {
    pub mean: f64,
    pub median: f64,
    /// Sample (n − 1) standard deviation; zero for a single value.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
    pub q95: f64,
    pub q99: f64,
}

fn sorted_column(column: &[f64]) -> Result<Vec<f64>> {
    if column.is_empty() {
        return Err(SimulationError::EmptyInput);
    }
    if column.iter().any(|x| !x.is_finite()) {
        return Err(SimulationError::NonFiniteInput);
    }
    stats::sorted(column).ok_or(SimulationError::NonFiniteInput)
}

fn q(sorted: &[f64], p: f64) -> Result<f64> {
    stats::quantile_sorted(sorted, p).ok_or(SimulationError::EmptyInput)
}

/// Tail-risk metrics of `column` against `reference_mean`.
///
/// # Errors
/// [`SimulationError::EmptyInput`] for an empty column,
/// [`SimulationError::NonFiniteInput`] if it holds NaN or infinities.
///
/// # Examples
/// ```
/// use u_costsim::risk::assess;
/// let column: Vec<f64> = (1..=100).map(f64::from).collect();
/// let risk = assess(&column, 50.5).unwrap();
/// assert!((risk.var_95 - 5.95).abs() < 1e-12);
/// assert_eq!(risk.prob_loss, 0.5);
/// ```
pub fn assess(column: &[f64], reference_mean: f64) -> Result<RiskMetrics> {
    let sorted = sorted_column(column)?;
    let var_95 = q(&sorted, 0.05)?;
    let var_99 = q(&sorted, 0.01)?;

    let tail_len = sorted.partition_point(|&x| x <= var_95);
    // The minimum always satisfies x ≤ var_95, so the tail is never empty.
    let cvar_95 = stats::mean(&sorted[..tail_len.max(1)]).ok_or(SimulationError::EmptyInput)?;

    let below = sorted.partition_point(|&x| x < reference_mean);
    let prob_loss = below as f64 / sorted.len() as f64;

    Ok(RiskMetrics {
        var_95,
        var_99,
        cvar_95,
        expected_shortfall: cvar_95,
        prob_loss,
    })
}

/// Descriptive statistics of `column`.
///
/// # Errors
/// Same conditions as [`assess`].
pub fn describe(column: &[f64]) -> Result<ColumnStatistics> {
    let sorted = sorted_column(column)?;
    Ok(ColumnStatistics {
        mean: stats::mean(&sorted).ok_or(SimulationError::EmptyInput)?,
        median: q(&sorted, 0.5)?,
        std: stats::std_dev(&sorted).unwrap_or(0.0),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        q25: q(&sorted, 0.25)?,
        q75: q(&sorted, 0.75)?,
        q95: q(&sorted, 0.95)?,
        q99: q(&sorted, 0.99)?,
    })
}
