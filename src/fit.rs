//! Distribution fitting for historical cost variables.
//!
//! For every requested variable the fitter tries each candidate family,
//! scores the successful fits by Kolmogorov–Smirnov distance against the
//! observed data and keeps the closest one. A variable no family can
//! describe is recorded with [`FittedFamily::EmpiricalFallback`], which the
//! sampler answers with a normal draw from the empirical moments.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::HistoricalDataset;
use crate::distributions::{Beta, DistributionError, Gamma, LogNormal, Normal, Uniform};
use crate::special;
use crate::stats;

/// Candidate distribution families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Family {
    Normal,
    LogNormal,
    Gamma,
    Beta,
    Uniform,
}

impl Family {
    /// Every family, in the default candidate order.
    pub const ALL: [Family; 5] = [
        Family::Normal,
        Family::LogNormal,
        Family::Gamma,
        Family::Beta,
        Family::Uniform,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Family::Normal => "normal",
            Family::LogNormal => "log-normal",
            Family::Gamma => "gamma",
            Family::Beta => "beta",
            Family::Uniform => "uniform",
        }
    }

    /// Families whose support is the positive half-line.
    pub fn requires_positive(self) -> bool {
        matches!(self, Family::LogNormal | Family::Gamma)
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a single candidate family was skipped for a variable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("{family} needs strictly positive data, found {value}")]
    NonPositiveSupport { family: Family, value: f64 },

    #[error("{family} cannot describe data without spread")]
    Degenerate { family: Family },

    #[error("need at least 2 observations, got {got}")]
    NotEnoughData { got: usize },

    #[error("estimator did not converge: {0}")]
    NonConvergence(String),

    #[error("goodness-of-fit statistic for {family} is not finite")]
    NonFiniteStatistic { family: Family },

    #[error(transparent)]
    InvalidParameters(DistributionError),
}

impl From<DistributionError> for FitError {
    fn from(err: DistributionError) -> Self {
        match err {
            DistributionError::NoConvergence(msg) => FitError::NonConvergence(msg),
            DistributionError::InsufficientData { got, .. } => FitError::NotEnoughData { got },
            other => FitError::InvalidParameters(other),
        }
    }
}

/// The selected family together with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "kebab-case")]
pub enum FittedFamily {
    Normal(Normal),
    LogNormal(LogNormal),
    Gamma(Gamma),
    /// Fitted on min-max scaled data; `low`/`high` map draws back.
    Beta { dist: Beta, low: f64, high: f64 },
    Uniform(Uniform),
    /// No candidate fitted. Sampled as N(empirical mean, empirical std).
    EmpiricalFallback,
}

impl FittedFamily {
    pub fn family(&self) -> Option<Family> {
        match self {
            FittedFamily::Normal(_) => Some(Family::Normal),
            FittedFamily::LogNormal(_) => Some(Family::LogNormal),
            FittedFamily::Gamma(_) => Some(Family::Gamma),
            FittedFamily::Beta { .. } => Some(Family::Beta),
            FittedFamily::Uniform(_) => Some(Family::Uniform),
            FittedFamily::EmpiricalFallback => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.family().map_or("empirical-fallback", Family::name)
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FittedFamily::EmpiricalFallback)
    }

    /// CDF on the variable's original scale; `None` for the fallback.
    pub fn cdf(&self, x: f64) -> Option<f64> {
        let p = match self {
            FittedFamily::Normal(d) => d.cdf(x),
            FittedFamily::LogNormal(d) => d.cdf(x),
            FittedFamily::Gamma(d) => d.cdf(x),
            FittedFamily::Beta { dist, low, high } => dist.cdf((x - low) / (high - low)),
            FittedFamily::Uniform(d) => d.cdf(x),
            FittedFamily::EmpiricalFallback => return None,
        };
        Some(p)
    }
}

/// Fit result for one variable. Never mutated after fitting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedDistribution {
    pub variable: String,
    pub family: FittedFamily,
    /// KS distance of the selected family; infinite for the fallback.
    pub ks_statistic: f64,
    /// Asymptotic KS p-value, absent for the fallback.
    pub ks_pvalue: Option<f64>,
    pub observations: usize,
    pub data_min: f64,
    pub data_max: f64,
    pub mean: f64,
    /// Sample (n − 1) standard deviation; zero for a single observation.
    pub std: f64,
}

impl FittedDistribution {
    /// Records `family` for `variable`, scoring it against `data`.
    ///
    /// Returns `None` if `data` is empty.
    pub fn new(variable: impl Into<String>, family: FittedFamily, data: &[f64]) -> Option<Self> {
        let d = if family.is_fallback() {
            f64::INFINITY
        } else {
            ks_statistic(data, |x| family.cdf(x).unwrap_or(f64::NAN)).unwrap_or(f64::INFINITY)
        };
        Self::scored(variable.into(), family, d, data)
    }

    fn scored(variable: String, family: FittedFamily, d: f64, data: &[f64]) -> Option<Self> {
        Some(Self {
            variable,
            family,
            ks_statistic: d,
            ks_pvalue: d.is_finite().then(|| ks_pvalue(d, data.len())),
            observations: data.len(),
            data_min: stats::min(data)?,
            data_max: stats::max(data)?,
            mean: stats::mean(data)?,
            std: stats::std_dev(data).unwrap_or(0.0),
        })
    }
}

/// Fit results keyed by variable, in fitting order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FittedDistributions {
    entries: Vec<FittedDistribution>,
}

impl FittedDistributions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fit, replacing any earlier fit of the same variable in place.
    pub fn insert(&mut self, fitted: FittedDistribution) {
        match self.entries.iter_mut().find(|e| e.variable == fitted.variable) {
            Some(slot) => *slot = fitted,
            None => self.entries.push(fitted),
        }
    }

    pub fn get(&self, variable: &str) -> Option<&FittedDistribution> {
        self.entries.iter().find(|e| e.variable == variable)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.get(variable).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FittedDistribution> {
        self.entries.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.variable.as_str())
    }
}

impl FromIterator<FittedDistribution> for FittedDistributions {
    fn from_iter<I: IntoIterator<Item = FittedDistribution>>(iter: I) -> Self {
        let mut out = Self::new();
        for fitted in iter {
            out.insert(fitted);
        }
        out
    }
}

/// One-sample Kolmogorov–Smirnov distance between `data` and `cdf`.
///
/// D = maxᵢ max(i/n − F(x₍ᵢ₎), F(x₍ᵢ₎) − (i−1)/n) over the sorted sample.
/// Returns `None` for empty data or when `cdf` yields a non-finite value.
///
/// # Examples
/// ```
/// use u_costsim::fit::ks_statistic;
/// let d = ks_statistic(&[0.25, 0.75], |x| x.clamp(0.0, 1.0)).unwrap();
/// assert!((d - 0.25).abs() < 1e-15);
/// ```
pub fn ks_statistic<F>(data: &[f64], cdf: F) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let sorted = stats::sorted(data)?;
    let n = sorted.len() as f64;
    let mut d = 0.0_f64;
    for (i, &x) in sorted.iter().enumerate() {
        let f = cdf(x);
        if !f.is_finite() {
            return None;
        }
        let above = (i + 1) as f64 / n - f;
        let below = f - i as f64 / n;
        d = d.max(above).max(below);
    }
    Some(d)
}

/// Asymptotic p-value for a KS distance `d` from `n` observations.
///
/// Uses Stephens' small-sample correction
/// `Q_KS((√n + 0.12 + 0.11/√n)·d)`.
pub fn ks_pvalue(d: f64, n: usize) -> f64 {
    let sqrt_n = (n as f64).sqrt();
    special::kolmogorov_survival((sqrt_n + 0.12 + 0.11 / sqrt_n) * d)
}

/// Estimates the parameters of one family from `data`.
///
/// # Errors
/// Fails without side effects when the family's support excludes the
/// data, the data has no spread, or the estimator breaks down.
pub fn fit_family(family: Family, data: &[f64]) -> Result<FittedFamily, FitError> {
    if data.len() < 2 {
        return Err(FitError::NotEnoughData { got: data.len() });
    }
    if family.requires_positive() {
        if let Some(&value) = data.iter().find(|&&x| x <= 0.0) {
            return Err(FitError::NonPositiveSupport { family, value });
        }
    }
    let (low, high) = match (stats::min(data), stats::max(data)) {
        (Some(lo), Some(hi)) if hi > lo => (lo, hi),
        _ => return Err(FitError::Degenerate { family }),
    };

    let fitted = match family {
        Family::Normal => FittedFamily::Normal(Normal::fit(data)?),
        Family::LogNormal => FittedFamily::LogNormal(LogNormal::fit(data)?),
        Family::Gamma => FittedFamily::Gamma(Gamma::fit(data)?),
        Family::Beta => {
            let range = high - low;
            let scaled: Vec<f64> = data
                .iter()
                .map(|x| ((x - low) / range).clamp(0.0, 1.0))
                .collect();
            FittedFamily::Beta {
                dist: Beta::fit_unit(&scaled)?,
                low,
                high,
            }
        }
        Family::Uniform => FittedFamily::Uniform(Uniform::fit(data)?),
    };
    Ok(fitted)
}

/// Fits one variable: best candidate by KS distance, or the fallback.
///
/// Non-finite values are ignored. Returns `None` only when no finite
/// value remains.
pub fn fit_variable(variable: &str, data: &[f64], families: &[Family]) -> Option<FittedDistribution> {
    let finite: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
    let data = finite.as_slice();
    let mut best: Option<(FittedFamily, f64)> = None;
    for &family in families {
        let candidate = fit_family(family, data).and_then(|fitted| {
            ks_statistic(data, |x| fitted.cdf(x).unwrap_or(f64::NAN))
                .map(|d| (fitted, d))
                .ok_or(FitError::NonFiniteStatistic { family })
        });
        match candidate {
            Ok((fitted, d)) => {
                debug!(variable, family = %family, ks = d, "candidate fitted");
                if best.as_ref().map_or(true, |(_, best_d)| d < *best_d) {
                    best = Some((fitted, d));
                }
            }
            Err(err @ FitError::NonPositiveSupport { .. }) => {
                debug!(variable, family = %family, error = %err, "family excluded");
            }
            Err(err) => {
                warn!(variable, family = %family, error = %err, "family skipped");
            }
        }
    }

    match best {
        Some((family, d)) => FittedDistribution::scored(variable.to_string(), family, d, data),
        None => {
            warn!(
                variable,
                observations = data.len(),
                "no family fitted, falling back to empirical normal"
            );
            FittedDistribution::new(variable, FittedFamily::EmpiricalFallback, data)
        }
    }
}

/// Fits every variable in `variables` present in `dataset`.
///
/// Missing and non-finite cells are dropped per column. Variables absent from the
/// dataset or without a single observation are skipped with a warning.
/// No failure is fatal.
pub fn fit<S: AsRef<str>>(
    dataset: &HistoricalDataset,
    variables: &[S],
    families: &[Family],
) -> FittedDistributions {
    let mut fitted = FittedDistributions::new();
    for variable in variables.iter().map(AsRef::as_ref) {
        let Some(data) = dataset.values(variable) else {
            warn!(variable, "variable not in dataset, skipped");
            continue;
        };
        match fit_variable(variable, &data, families) {
            Some(result) => {
                info!(
                    variable,
                    family = result.family.name(),
                    ks = result.ks_statistic,
                    observations = result.observations,
                    "distribution fitted"
                );
                fitted.insert(result);
            }
            None => warn!(variable, "no observations, skipped"),
        }
    }
    fitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LABOR_COST, MATERIAL_COST, TOTAL_ESTIMATE};
    use crate::random::{create_rng, draw};

    fn dataset_from(name: &str, values: &[f64]) -> HistoricalDataset {
        HistoricalDataset::new().with_values(name, values).unwrap()
    }

    #[test]
    fn test_ks_statistic_known_value() {
        let d = ks_statistic(&[0.5], |x| x).unwrap();
        assert!((d - 0.5).abs() < 1e-15);
        assert_eq!(ks_statistic(&[], |x| x), None);
        assert_eq!(ks_statistic(&[1.0], |_| f64::NAN), None);
    }

    #[test]
    fn test_ks_pvalue_range() {
        assert!(ks_pvalue(0.0, 100) > 0.999);
        assert!(ks_pvalue(0.5, 100) < 1e-10);
    }

    #[test]
    fn test_family_serde_names() {
        assert_eq!(serde_json::to_string(&Family::LogNormal).unwrap(), "\"log-normal\"");
        let f: Family = serde_json::from_str("\"gamma\"").unwrap();
        assert_eq!(f, Family::Gamma);
        assert_eq!(Family::Beta.to_string(), "beta");
    }

    #[test]
    fn test_negative_values_exclude_positive_families() {
        assert!(matches!(
            fit_family(Family::LogNormal, &[-1.0, 2.0, 3.0]),
            Err(FitError::NonPositiveSupport { .. })
        ));
        assert!(matches!(
            fit_family(Family::Gamma, &[0.0, 2.0, 3.0]),
            Err(FitError::NonPositiveSupport { .. })
        ));

        let data = draw(&rand_distr::Normal::new(50.0, 40.0).unwrap(), 500, &mut create_rng(3));
        assert!(data.iter().any(|&x| x < 0.0));
        let fitted = fit_variable("Discount_or_Markup", &data, &Family::ALL).unwrap();
        assert!(!matches!(
            fitted.family,
            FittedFamily::LogNormal(_) | FittedFamily::Gamma(_)
        ));
    }

    #[test]
    fn test_best_family_has_smallest_ks() {
        let data = draw(&rand_distr::Normal::new(1.0e6, 1.0e5).unwrap(), 1_000, &mut create_rng(42));
        let fitted = fit_variable(TOTAL_ESTIMATE, &data, &Family::ALL).unwrap();
        for family in Family::ALL {
            if let Ok(candidate) = fit_family(family, &data) {
                let d = ks_statistic(&data, |x| candidate.cdf(x).unwrap()).unwrap();
                assert!(fitted.ks_statistic <= d, "{family} beat the selection");
            }
        }
        assert!(fitted.ks_pvalue.unwrap() > 0.01);
        assert_eq!(fitted.observations, 1_000);
    }

    #[test]
    fn test_skewed_data_prefers_skewed_family() {
        let data = draw(&rand_distr::LogNormal::new(10.0, 1.0).unwrap(), 2_000, &mut create_rng(8));
        let fitted = fit_variable(MATERIAL_COST, &data, &Family::ALL).unwrap();
        assert!(
            matches!(fitted.family, FittedFamily::LogNormal(_) | FittedFamily::Gamma(_)),
            "selected {}",
            fitted.family.name()
        );
    }

    #[test]
    fn test_beta_stores_original_range() {
        let data = [10.0, 12.0, 15.0, 15.0, 18.0, 20.0];
        match fit_family(Family::Beta, &data).unwrap() {
            FittedFamily::Beta { low, high, .. } => assert_eq!((low, high), (10.0, 20.0)),
            other => panic!("expected beta, got {}", other.name()),
        }
    }

    #[test]
    fn test_constant_column_falls_back() {
        let fitted = fit_variable(LABOR_COST, &[250.0; 6], &Family::ALL).unwrap();
        assert!(fitted.family.is_fallback());
        assert_eq!(fitted.ks_statistic, f64::INFINITY);
        assert_eq!(fitted.ks_pvalue, None);
        assert_eq!(fitted.mean, 250.0);
        assert_eq!(fitted.std, 0.0);
    }

    #[test]
    fn test_single_observation_falls_back() {
        let fitted = fit_variable(LABOR_COST, &[7.0], &Family::ALL).unwrap();
        assert!(fitted.family.is_fallback());
        assert_eq!(fitted.std, 0.0);
        assert_eq!(fit_variable(LABOR_COST, &[], &Family::ALL), None);
    }

    #[test]
    fn test_fit_skips_missing_and_empty_columns() {
        let ds = HistoricalDataset::new()
            .with_values(MATERIAL_COST, &[1.0, 2.0, 4.0])
            .unwrap()
            .with_column(LABOR_COST, [None, None, Some(f64::NAN)])
            .unwrap();
        let fitted = fit(&ds, &[MATERIAL_COST, LABOR_COST, "Unknown"], &Family::ALL);
        assert_eq!(fitted.variables().collect::<Vec<_>>(), vec![MATERIAL_COST]);
    }

    #[test]
    fn test_infinite_cell_does_not_drop_variable() {
        let ds = HistoricalDataset::new()
            .with_values(MATERIAL_COST, &[100.0, 120.0, 130.0, f64::INFINITY])
            .unwrap()
            .with_values(LABOR_COST, &[40.0, 55.0, 47.0, 61.0])
            .unwrap();
        let fitted = fit(&ds, &[MATERIAL_COST, LABOR_COST], &Family::ALL);
        assert_eq!(
            fitted.variables().collect::<Vec<_>>(),
            vec![MATERIAL_COST, LABOR_COST]
        );
        let material = fitted.get(MATERIAL_COST).unwrap();
        assert_eq!(material.observations, 3);
        assert!(!material.family.is_fallback());
        assert_eq!(material.data_max, 130.0);

        // called directly, the infinite value is ignored the same way
        let data = [100.0, f64::NEG_INFINITY, 120.0, 130.0];
        let direct = fit_variable(MATERIAL_COST, &data, &Family::ALL).unwrap();
        assert_eq!(direct.observations, 3);
        assert!(fit_variable(MATERIAL_COST, &[f64::INFINITY, f64::NAN], &Family::ALL).is_none());
    }

    #[test]
    fn test_fit_preserves_variable_order() {
        let ds = dataset_from(LABOR_COST, &[3.0, 5.0, 4.0, 8.0])
            .with_values(MATERIAL_COST, &[10.0, 11.0, 15.0, 9.0])
            .unwrap();
        let fitted = fit(&ds, &[MATERIAL_COST, LABOR_COST], &[Family::Normal]);
        assert_eq!(
            fitted.variables().collect::<Vec<_>>(),
            vec![MATERIAL_COST, LABOR_COST]
        );
        let material = fitted.get(MATERIAL_COST).unwrap();
        assert!(matches!(material.family, FittedFamily::Normal(_)));
        assert_eq!((material.data_min, material.data_max), (9.0, 15.0));
    }

    #[test]
    fn test_record_scores_given_family() {
        let data = [0.2, 0.4, 0.6, 0.8];
        let uniform = FittedFamily::Uniform(Uniform::new(0.0, 1.0).unwrap());
        let record = FittedDistribution::new("x", uniform, &data).unwrap();
        assert!((record.ks_statistic - 0.2).abs() < 1e-12);
        assert!(record.ks_pvalue.is_some());
        assert!((record.mean - 0.5).abs() < 1e-12);

        let fallback = FittedDistribution::new("x", FittedFamily::EmpiricalFallback, &data).unwrap();
        assert_eq!(fallback.ks_statistic, f64::INFINITY);
        assert_eq!(fallback.ks_pvalue, None);
        assert!(FittedDistribution::new("x", FittedFamily::EmpiricalFallback, &[]).is_none());
    }

    #[test]
    fn test_fitted_family_serializes_tagged() {
        let family = FittedFamily::Normal(Normal::new(1.0, 2.0).unwrap());
        let json = serde_json::to_value(&family).unwrap();
        assert_eq!(json["family"], "normal");
        assert_eq!(json["mu"], 1.0);
    }
}
