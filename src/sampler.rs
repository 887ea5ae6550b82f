//! Scenario-conditioned sampling from fitted distributions.
//!
//! How a scenario multiplier enters a draw depends on the family:
//!
//! | Family | Draw |
//! |---|---|
//! | normal | N(μ·m, σ), spread unchanged |
//! | log-normal, gamma | raw draws, whole vector × m |
//! | beta | `[0, 1]` draws mapped to `[low, high]`, × m |
//! | uniform | U(low·m, high·m) |
//! | empirical fallback | N(mean·m, std) |
//!
//! Symmetric families take a shock as a shift of the center while the
//! multiplicative families stretch their spread with it.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dataset::{COST_COMPONENTS, TOTAL_ESTIMATE_CALCULATED};
use crate::error::{Result, SimulationError};
use crate::fit::{Family, FittedDistribution, FittedDistributions, FittedFamily};
use crate::random::{draw, draw_normal};

/// Per-variable multipliers for one scenario. Unlisted variables use 1.0.
///
/// Every stored multiplier is finite and strictly positive; deserialization
/// enforces the same rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ScenarioSpec {
    multipliers: BTreeMap<String, f64>,
}

impl ScenarioSpec {
    /// The empty spec: no variable changes.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// # Errors
    /// [`SimulationError::InvalidMultiplier`] unless `multiplier` is finite
    /// and positive.
    pub fn with_multiplier(mut self, variable: impl Into<String>, multiplier: f64) -> Result<Self> {
        let variable = variable.into();
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(SimulationError::InvalidMultiplier {
                variable,
                multiplier,
            });
        }
        self.multipliers.insert(variable, multiplier);
        Ok(self)
    }

    /// Built-in scenarios; every multiplier is a positive literal.
    pub(crate) fn preset(multipliers: &[(&str, f64)]) -> Self {
        Self {
            multipliers: multipliers
                .iter()
                .map(|&(variable, m)| (variable.to_string(), m))
                .collect(),
        }
    }

    pub fn multiplier(&self, variable: &str) -> f64 {
        self.multipliers.get(variable).copied().unwrap_or(1.0)
    }

    pub fn is_baseline(&self) -> bool {
        self.multipliers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.multipliers.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl TryFrom<BTreeMap<String, f64>> for ScenarioSpec {
    type Error = SimulationError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self> {
        map.into_iter()
            .try_fold(Self::baseline(), |spec, (variable, m)| spec.with_multiplier(variable, m))
    }
}

impl From<ScenarioSpec> for BTreeMap<String, f64> {
    fn from(spec: ScenarioSpec) -> Self {
        spec.multipliers
    }
}

/// Why drawing from a fitted family failed for one variable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("{family} sampler rejected its parameters: {reason}")]
    InvalidParameters { family: Family, reason: String },

    #[error("{family} sampler produced a non-finite value")]
    NonFinite { family: Family },
}

/// One generated column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleColumn {
    name: String,
    values: Vec<f64>,
    fallback: bool,
}

impl SampleColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// True when the values came from the empirical-normal fallback.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

/// `n` generated rows for one scenario, one column per fitted variable
/// plus the derived total when all components were sampled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleTable {
    rows: usize,
    columns: Vec<SampleColumn>,
}

impl SampleTable {
    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(SampleColumn::values)
    }

    pub fn columns(&self) -> impl Iterator<Item = &SampleColumn> {
        self.columns.iter()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(SampleColumn::name)
    }

    pub fn has_derived_total(&self) -> bool {
        self.column(TOTAL_ESTIMATE_CALCULATED).is_some()
    }
}

fn rejected<E: fmt::Display>(family: Family) -> impl FnOnce(E) -> SampleError {
    move |e| SampleError::InvalidParameters {
        family,
        reason: e.to_string(),
    }
}

/// Draws `n` values for one fitted variable under `multiplier`.
///
/// # Errors
/// [`SampleError`] if the family's sampler refuses the parameters or any
/// draw is not finite. The caller decides on the fallback.
pub fn draw_family<R>(
    fitted: &FittedDistribution,
    n: usize,
    multiplier: f64,
    rng: &mut R,
) -> std::result::Result<Vec<f64>, SampleError>
where
    R: Rng + ?Sized,
{
    let values = match &fitted.family {
        FittedFamily::Normal(d) => {
            let dist = rand_distr::Normal::new(d.mu() * multiplier, d.sigma())
                .map_err(rejected(Family::Normal))?;
            draw(&dist, n, rng)
        }
        FittedFamily::LogNormal(d) => {
            let dist = rand_distr::LogNormal::new(d.mu(), d.sigma())
                .map_err(rejected(Family::LogNormal))?;
            scaled(draw(&dist, n, rng), multiplier)
        }
        FittedFamily::Gamma(d) => {
            let dist = rand_distr::Gamma::new(d.shape(), d.scale())
                .map_err(rejected(Family::Gamma))?;
            scaled(draw(&dist, n, rng), multiplier)
        }
        FittedFamily::Beta { dist, low, high } => {
            let unit = rand_distr::Beta::new(dist.alpha(), dist.beta())
                .map_err(rejected(Family::Beta))?;
            let range = high - low;
            draw(&unit, n, rng)
                .into_iter()
                .map(|u| (low + u * range) * multiplier)
                .collect()
        }
        FittedFamily::Uniform(d) => {
            let dist = rand_distr::Uniform::new(d.min() * multiplier, d.max() * multiplier)
                .map_err(rejected(Family::Uniform))?;
            draw(&dist, n, rng)
        }
        FittedFamily::EmpiricalFallback => empirical_normal(fitted, n, multiplier, rng),
    };

    if let Some(family) = fitted.family.family() {
        if values.iter().any(|x| !x.is_finite()) {
            return Err(SampleError::NonFinite { family });
        }
    }
    Ok(values)
}

fn scaled(mut values: Vec<f64>, multiplier: f64) -> Vec<f64> {
    for v in &mut values {
        *v *= multiplier;
    }
    values
}

/// Overflow clamps to the largest finite magnitude of the same sign.
fn saturate(x: f64) -> f64 {
    x.clamp(f64::MIN, f64::MAX)
}

/// N(mean·multiplier, std) with every draw kept finite.
fn empirical_normal<R>(fitted: &FittedDistribution, n: usize, multiplier: f64, rng: &mut R) -> Vec<f64>
where
    R: Rng + ?Sized,
{
    let center = if fitted.mean.is_nan() {
        fitted.data_min / 2.0 + fitted.data_max / 2.0
    } else {
        fitted.mean
    };
    draw_normal(saturate(center * multiplier), fitted.std, n, rng)
        .into_iter()
        .map(saturate)
        .collect()
}

/// Bottom-up total: `(material + labor)·(1 + profit_rate/100) + discount_or_markup`.
///
/// Each step saturates at `±f64::MAX`, so finite inputs always give a
/// finite total.
///
/// # Examples
/// ```
/// use u_costsim::sampler::derived_total;
/// assert_eq!(derived_total(600.0, 400.0, 10.0, -50.0), 1_050.0);
/// assert_eq!(derived_total(f64::MAX, f64::MAX, 20.0, 0.0), f64::MAX);
/// ```
pub fn derived_total(material: f64, labor: f64, profit_rate: f64, discount_or_markup: f64) -> f64 {
    let base = saturate(material + labor);
    let marked_up = saturate(base * (1.0 + profit_rate / 100.0));
    saturate(marked_up + discount_or_markup)
}

/// Generates one scenario's sample table.
///
/// Variables are drawn in fitting order from the single generator `rng`,
/// so a fixed seed reproduces the table exactly. A variable whose draw
/// fails is filled from its empirical normal instead; the scenario always
/// completes with every fitted variable present. Every value in the table
/// is finite: fallback draws and the derived total saturate at `±f64::MAX`.
///
/// # Errors
/// - [`SimulationError::MissingDistributions`] if `fitted` is empty
/// - [`SimulationError::InvalidSampleCount`] if `n == 0`
pub fn sample<R>(
    fitted: &FittedDistributions,
    n: usize,
    spec: &ScenarioSpec,
    rng: &mut R,
) -> Result<SampleTable>
where
    R: Rng + ?Sized,
{
    if fitted.is_empty() {
        return Err(SimulationError::MissingDistributions);
    }
    if n == 0 {
        return Err(SimulationError::InvalidSampleCount);
    }
    for (variable, _) in spec.iter().filter(|(v, _)| !fitted.contains(v)) {
        debug!(variable, "multiplier targets a variable that was not fitted");
    }

    let mut columns = Vec::with_capacity(fitted.len() + 1);
    for dist in fitted.iter() {
        let multiplier = spec.multiplier(&dist.variable);
        let (values, fallback) = match draw_family(dist, n, multiplier, rng) {
            Ok(values) => (values, dist.family.is_fallback()),
            Err(err) => {
                warn!(
                    variable = %dist.variable,
                    error = %err,
                    "sampling failed, using empirical normal"
                );
                (empirical_normal(dist, n, multiplier, rng), true)
            }
        };
        columns.push(SampleColumn {
            name: dist.variable.clone(),
            values,
            fallback,
        });
    }

    let mut table = SampleTable { rows: n, columns };
    if let Some(total) = derive_total_column(&table) {
        table.columns.push(total);
    }
    Ok(table)
}

fn derive_total_column(table: &SampleTable) -> Option<SampleColumn> {
    let [material, labor, profit, discount] = COST_COMPONENTS.map(|c| table.column(c));
    let (material, labor, profit, discount) = (material?, labor?, profit?, discount?);
    let values = (0..table.rows)
        .map(|i| derived_total(material[i], labor[i], profit[i], discount[i]))
        .collect();
    Some(SampleColumn {
        name: TOTAL_ESTIMATE_CALCULATED.to_string(),
        values,
        fallback: false,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dataset::{DISCOUNT_OR_MARKUP, LABOR_COST, MATERIAL_COST, PROFIT_RATE, TOTAL_ESTIMATE};
    use crate::distributions::{Beta, Gamma, LogNormal, Normal, Uniform};
    use crate::random::create_rng;
    use crate::stats;

    pub(crate) fn record(variable: &str, family: FittedFamily, mean: f64, std: f64) -> FittedDistribution {
        FittedDistribution {
            variable: variable.to_string(),
            family,
            ks_statistic: 0.01,
            ks_pvalue: Some(0.5),
            observations: 100,
            data_min: mean - 3.0 * std,
            data_max: mean + 3.0 * std,
            mean,
            std,
        }
    }

    pub(crate) fn normal(variable: &str, mu: f64, sigma: f64) -> FittedDistribution {
        record(variable, FittedFamily::Normal(Normal::new(mu, sigma).unwrap()), mu, sigma)
    }

    pub(crate) fn components() -> FittedDistributions {
        [
            normal(MATERIAL_COST, 500_000.0, 50_000.0),
            normal(LABOR_COST, 300_000.0, 30_000.0),
            normal(PROFIT_RATE, 12.0, 2.0),
            normal(DISCOUNT_OR_MARKUP, 5_000.0, 2_000.0),
            normal(TOTAL_ESTIMATE, 900_000.0, 90_000.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_spec_rejects_bad_multipliers() {
        for bad in [0.0, -1.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ScenarioSpec::baseline().with_multiplier(MATERIAL_COST, bad),
                Err(SimulationError::InvalidMultiplier { .. })
            ));
        }
        let spec = ScenarioSpec::baseline().with_multiplier(LABOR_COST, 1.15).unwrap();
        assert_eq!(spec.multiplier(LABOR_COST), 1.15);
        assert_eq!(spec.multiplier(MATERIAL_COST), 1.0);
        assert!(!spec.is_baseline());
        assert!(ScenarioSpec::baseline().is_baseline());
    }

    #[test]
    fn test_spec_deserialization_validates() {
        let spec: ScenarioSpec = serde_json::from_str(r#"{"Material_Cost": 1.1}"#).unwrap();
        assert_eq!(spec.multiplier(MATERIAL_COST), 1.1);
        assert!(serde_json::from_str::<ScenarioSpec>(r#"{"Material_Cost": -2.0}"#).is_err());
    }

    #[test]
    fn test_sample_requires_fit_and_rows() {
        let mut rng = create_rng(0);
        let spec = ScenarioSpec::baseline();
        assert_eq!(
            sample(&FittedDistributions::new(), 10, &spec, &mut rng),
            Err(SimulationError::MissingDistributions)
        );
        assert_eq!(
            sample(&components(), 0, &spec, &mut rng),
            Err(SimulationError::InvalidSampleCount)
        );
    }

    #[test]
    fn test_same_seed_same_table() {
        let fitted = components();
        let spec = ScenarioSpec::baseline().with_multiplier(MATERIAL_COST, 1.2).unwrap();
        let a = sample(&fitted, 500, &spec, &mut create_rng(42)).unwrap();
        let b = sample(&fitted, 500, &spec, &mut create_rng(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_explicit_unit_multipliers_match_baseline() {
        let fitted = components();
        let explicit = fitted
            .variables()
            .try_fold(ScenarioSpec::baseline(), |s, v| s.with_multiplier(v, 1.0))
            .unwrap();
        let a = sample(&fitted, 300, &ScenarioSpec::baseline(), &mut create_rng(7)).unwrap();
        let b = sample(&fitted, 300, &explicit, &mut create_rng(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derived_total_presence() {
        let fitted = components();
        let table = sample(&fitted, 50, &ScenarioSpec::baseline(), &mut create_rng(1)).unwrap();
        assert!(table.has_derived_total());
        assert_eq!(table.column_names().count(), 6);

        let m = table.column(MATERIAL_COST).unwrap();
        let l = table.column(LABOR_COST).unwrap();
        let p = table.column(PROFIT_RATE).unwrap();
        let d = table.column(DISCOUNT_OR_MARKUP).unwrap();
        let t = table.column(TOTAL_ESTIMATE_CALCULATED).unwrap();
        for i in 0..50 {
            assert_eq!(t[i], (m[i] + l[i]) * (1.0 + p[i] / 100.0) + d[i]);
        }

        let without_labor: FittedDistributions =
            fitted.iter().filter(|f| f.variable != LABOR_COST).cloned().collect();
        let table = sample(&without_labor, 50, &ScenarioSpec::baseline(), &mut create_rng(1)).unwrap();
        assert!(!table.has_derived_total());
        assert_eq!(table.column_names().count(), 4);
    }

    #[test]
    fn test_derived_total_formula() {
        assert_eq!(derived_total(100.0, 50.0, 10.0, -5.0), 160.0);
    }

    #[test]
    fn test_material_shock_shifts_normal_mean_only() {
        let fitted: FittedDistributions = [normal(MATERIAL_COST, 500_000.0, 50_000.0)].into_iter().collect();
        let spec = ScenarioSpec::baseline().with_multiplier(MATERIAL_COST, 1.1).unwrap();
        let table = sample(&fitted, 10_000, &spec, &mut create_rng(2024)).unwrap();
        let v = table.column(MATERIAL_COST).unwrap();
        let mean = stats::mean(v).unwrap();
        let sd = stats::std_dev(v).unwrap();
        assert!((mean / 550_000.0 - 1.0).abs() < 0.02, "mean = {mean}");
        assert!((sd / 50_000.0 - 1.0).abs() < 0.02, "sd = {sd}");
    }

    #[test]
    fn test_multiplicative_families_scale_spread() {
        // Documented asymmetry: unlike normal, log-normal draws are scaled
        // as a whole, so the spread grows with the multiplier.
        let ln = LogNormal::new(10.0, 0.3).unwrap();
        let fitted = record(MATERIAL_COST, FittedFamily::LogNormal(ln), 23_000.0, 7_000.0);
        let base = draw_family(&fitted, 20_000, 1.0, &mut create_rng(5)).unwrap();
        let shocked = draw_family(&fitted, 20_000, 1.5, &mut create_rng(5)).unwrap();
        for (b, s) in base.iter().zip(&shocked) {
            assert!((s - 1.5 * b).abs() <= 1e-9 * s.abs());
        }
        let ratio = stats::std_dev(&shocked).unwrap() / stats::std_dev(&base).unwrap();
        assert!((ratio - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_beta_draws_denormalized_then_scaled() {
        let family = FittedFamily::Beta {
            dist: Beta::new(2.0, 5.0).unwrap(),
            low: 100.0,
            high: 200.0,
        };
        let fitted = record(LABOR_COST, family, 128.0, 16.0);
        let v = draw_family(&fitted, 2_000, 2.0, &mut create_rng(9)).unwrap();
        assert!(v.iter().all(|x| (200.0..=400.0).contains(x)));
        // mean of Beta(2, 5) is 2/7 of the range
        let expected = (100.0 + 100.0 * 2.0 / 7.0) * 2.0;
        assert!((stats::mean(&v).unwrap() / expected - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_uniform_bounds_scale() {
        let fitted = record(
            PROFIT_RATE,
            FittedFamily::Uniform(Uniform::new(10.0, 20.0).unwrap()),
            15.0,
            2.9,
        );
        let v = draw_family(&fitted, 1_000, 1.1, &mut create_rng(4)).unwrap();
        assert!(v.iter().all(|&x| x >= 10.0 * 1.1 && x < 20.0 * 1.1));
    }

    #[test]
    fn test_fallback_record_draws_empirical_normal() {
        let fitted: FittedDistributions =
            [record(LABOR_COST, FittedFamily::EmpiricalFallback, 1_000.0, 100.0)].into_iter().collect();
        let spec = ScenarioSpec::baseline().with_multiplier(LABOR_COST, 2.0).unwrap();
        let table = sample(&fitted, 20_000, &spec, &mut create_rng(6)).unwrap();
        let column = table.columns().next().unwrap();
        assert!(column.is_fallback());
        let mean = stats::mean(column.values()).unwrap();
        assert!((mean - 2_000.0).abs() < 5.0, "mean = {mean}");
    }

    #[test]
    fn test_overflowing_draws_fall_back() {
        // Exponential draws beyond ~1.8 overflow at this scale.
        let gamma = Gamma::new(1.0, 1e308).unwrap();
        let fitted: FittedDistributions =
            [record(MATERIAL_COST, FittedFamily::Gamma(gamma), 5.0, 1.0)].into_iter().collect();
        let table = sample(&fitted, 200, &ScenarioSpec::baseline(), &mut create_rng(3)).unwrap();
        let column = table.columns().next().unwrap();
        assert!(column.is_fallback());
        assert_eq!(column.values().len(), 200);
        assert!(column.values().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_fallback_draws_saturate_instead_of_overflowing() {
        let huge = record(MATERIAL_COST, FittedFamily::EmpiricalFallback, f64::MAX, f64::MAX / 4.0);
        let v = draw_family(&huge, 500, 2.0, &mut create_rng(12)).unwrap();
        assert!(v.iter().all(|x| x.is_finite()));
        assert!(v.contains(&f64::MAX));

        // an overflowed empirical mean is replaced by the midpoint of the range
        let mut lost_mean = record(LABOR_COST, FittedFamily::EmpiricalFallback, 100.0, 0.0);
        lost_mean.mean = f64::NAN;
        let v = draw_family(&lost_mean, 10, 1.0, &mut create_rng(12)).unwrap();
        assert!(v.iter().all(|&x| x == 100.0));
    }

    #[test]
    fn test_derived_total_saturates_on_overflow() {
        let fitted: FittedDistributions = [
            normal(MATERIAL_COST, 0.75 * f64::MAX, 1.0),
            normal(LABOR_COST, 0.75 * f64::MAX, 1.0),
            normal(PROFIT_RATE, 12.0, 2.0),
            normal(DISCOUNT_OR_MARKUP, 0.0, 1_000.0),
        ]
        .into_iter()
        .collect();
        let table = sample(&fitted, 100, &ScenarioSpec::baseline(), &mut create_rng(13)).unwrap();
        let total = table.column(TOTAL_ESTIMATE_CALCULATED).unwrap();
        assert!(total.iter().all(|&x| x == f64::MAX));
    }
}
