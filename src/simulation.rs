//! Scenario orchestration.
//!
//! [`run`] samples every scenario in declaration order from one generator,
//! describes every column, then scores the total-estimate columns against
//! the baseline scenario's means.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{LABOR_COST, MATERIAL_COST, TOTAL_ESTIMATE};
use crate::error::{Result, SimulationError};
use crate::fit::FittedDistributions;
use crate::risk::{self, ColumnStatistics, RiskMetrics};
use crate::sampler::{self, SampleTable, ScenarioSpec};

/// Name of the mandatory reference scenario.
pub const BASELINE: &str = "baseline";

/// A scenario as declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedScenario {
    pub name: String,
    #[serde(default)]
    pub multipliers: ScenarioSpec,
}

/// Ordered, uniquely named scenarios that always include [`BASELINE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<NamedScenario>", into = "Vec<NamedScenario>")]
pub struct ScenarioSet {
    scenarios: Vec<NamedScenario>,
}

impl ScenarioSet {
    /// Empty set, to be filled with [`insert`](Self::insert).
    pub fn new() -> Self {
        Self {
            scenarios: Vec::new(),
        }
    }

    /// Appends a scenario.
    ///
    /// # Errors
    /// [`SimulationError::DuplicateScenario`] if `name` is already declared.
    pub fn insert(&mut self, name: impl Into<String>, spec: ScenarioSpec) -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(SimulationError::DuplicateScenario { name });
        }
        self.scenarios.push(NamedScenario {
            name,
            multipliers: spec,
        });
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, spec: ScenarioSpec) -> Result<Self> {
        self.insert(name, spec)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ScenarioSpec> {
        self.scenarios
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.multipliers)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScenarioSpec)> {
        self.scenarios.iter().map(|s| (s.name.as_str(), &s.multipliers))
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// # Errors
    /// [`SimulationError::MissingBaseline`] without a `baseline` entry.
    pub fn validate(&self) -> Result<()> {
        if self.get(BASELINE).is_none() {
            return Err(SimulationError::MissingBaseline);
        }
        Ok(())
    }

    /// Eight-scenario sensitivity study: two material shocks, two labor
    /// shocks, two combined shocks and a cost reduction.
    pub fn extended() -> Self {
        Self::preset(&[
            (BASELINE, &[]),
            ("material_increase_10pct", &[(MATERIAL_COST, 1.1)]),
            ("material_increase_20pct", &[(MATERIAL_COST, 1.2)]),
            ("labor_increase_15pct", &[(LABOR_COST, 1.15)]),
            ("labor_increase_25pct", &[(LABOR_COST, 1.25)]),
            ("combined_moderate", &[(MATERIAL_COST, 1.1), (LABOR_COST, 1.15)]),
            ("combined_aggressive", &[(MATERIAL_COST, 1.2), (LABOR_COST, 1.25)]),
            ("cost_reduction", &[(MATERIAL_COST, 0.9), (LABOR_COST, 0.95)]),
        ])
    }

    fn preset(entries: &[(&str, &[(&str, f64)])]) -> Self {
        Self {
            scenarios: entries
                .iter()
                .map(|&(name, multipliers)| NamedScenario {
                    name: name.to_string(),
                    multipliers: ScenarioSpec::preset(multipliers),
                })
                .collect(),
        }
    }
}

impl Default for ScenarioSet {
    fn default() -> Self {
        Self::preset(&[
            (BASELINE, &[]),
            ("material_increase_10pct", &[(MATERIAL_COST, 1.1)]),
            ("labor_increase_15pct", &[(LABOR_COST, 1.15)]),
            ("combined_increase", &[(MATERIAL_COST, 1.1), (LABOR_COST, 1.15)]),
        ])
    }
}

impl TryFrom<Vec<NamedScenario>> for ScenarioSet {
    type Error = SimulationError;

    fn try_from(scenarios: Vec<NamedScenario>) -> Result<Self> {
        let set = scenarios
            .into_iter()
            .try_fold(Self::new(), |set, s| set.with(s.name, s.multipliers))?;
        set.validate()?;
        Ok(set)
    }
}

impl From<ScenarioSet> for Vec<NamedScenario> {
    fn from(set: ScenarioSet) -> Self {
        set.scenarios
    }
}

/// Everything produced for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    name: String,
    spec: ScenarioSpec,
    samples: SampleTable,
    statistics: Vec<(String, ColumnStatistics)>,
    risk_metrics: BTreeMap<String, RiskMetrics>,
}

impl ScenarioResult {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ScenarioSpec {
        &self.spec
    }

    pub fn samples(&self) -> &SampleTable {
        &self.samples
    }

    /// Statistics of `column`, if the table has it.
    pub fn statistics(&self, column: &str) -> Option<&ColumnStatistics> {
        self.statistics
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, stats)| stats)
    }

    /// Per-column statistics in table column order.
    pub fn all_statistics(&self) -> impl Iterator<Item = (&str, &ColumnStatistics)> {
        self.statistics.iter().map(|(name, s)| (name.as_str(), s))
    }

    /// Risk metrics for the total-estimate columns.
    pub fn risk_metrics(&self) -> &BTreeMap<String, RiskMetrics> {
        &self.risk_metrics
    }
}

/// Results of a run, in scenario declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SimulationResults {
    scenarios: Vec<ScenarioResult>,
}

impl SimulationResults {
    /// # Errors
    /// [`SimulationError::UnknownScenario`] if no scenario is named `name`.
    pub fn get(&self, name: &str) -> Result<&ScenarioResult> {
        self.scenarios
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SimulationError::UnknownScenario {
                name: name.to_string(),
            })
    }

    pub fn baseline(&self) -> Result<&ScenarioResult> {
        self.get(BASELINE)
    }

    /// Risk metrics of one scenario.
    pub fn risk_metrics(&self, name: &str) -> Result<&BTreeMap<String, RiskMetrics>> {
        self.get(name).map(ScenarioResult::risk_metrics)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.scenarios.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.iter().map(ScenarioResult::name)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Columns scored for risk: the fitted total and the derived total.
pub fn is_risk_column(name: &str) -> bool {
    name.starts_with(TOTAL_ESTIMATE)
}

/// Runs every scenario against the same fitted distributions.
///
/// Scenarios are sampled in declaration order from `rng`, so a seeded
/// generator reproduces the whole result set. `prob_loss` of every
/// scenario, baseline included, is measured against the baseline mean of
/// the same column.
///
/// # Errors
/// - [`SimulationError::MissingBaseline`] if `scenarios` lacks a baseline
/// - [`SimulationError::MissingDistributions`] if `fitted` is empty
/// - [`SimulationError::InvalidSampleCount`] if `n == 0`
pub fn run<R>(
    fitted: &FittedDistributions,
    n: usize,
    scenarios: &ScenarioSet,
    rng: &mut R,
) -> Result<SimulationResults>
where
    R: Rng + ?Sized,
{
    scenarios.validate()?;
    info!(
        scenarios = scenarios.len(),
        variables = fitted.len(),
        n,
        "starting simulation"
    );

    let mut results = Vec::with_capacity(scenarios.len());
    for (name, spec) in scenarios.iter() {
        let samples = sampler::sample(fitted, n, spec, rng)?;
        let statistics = samples
            .columns()
            .map(|c| risk::describe(c.values()).map(|s| (c.name().to_string(), s)))
            .collect::<Result<Vec<_>>>()?;
        debug!(scenario = name, columns = statistics.len(), "scenario sampled");
        results.push(ScenarioResult {
            name: name.to_string(),
            spec: spec.clone(),
            samples,
            statistics,
            risk_metrics: BTreeMap::new(),
        });
    }

    let baseline_means: BTreeMap<String, f64> = results
        .iter()
        .find(|r| r.name == BASELINE)
        .ok_or(SimulationError::MissingBaseline)?
        .all_statistics()
        .filter(|(column, _)| is_risk_column(column))
        .map(|(column, s)| (column.to_string(), s.mean))
        .collect();

    for result in &mut results {
        let mut metrics = BTreeMap::new();
        for column in result.samples.columns().filter(|c| is_risk_column(c.name())) {
            let reference = match baseline_means.get(column.name()) {
                Some(&mean) => mean,
                None => result
                    .statistics(column.name())
                    .map_or(f64::NAN, |s| s.mean),
            };
            metrics.insert(
                column.name().to_string(),
                risk::assess(column.values(), reference)?,
            );
        }
        info!(
            scenario = %result.name,
            risk_columns = metrics.len(),
            "scenario complete"
        );
        result.risk_metrics = metrics;
    }

    Ok(SimulationResults { scenarios: results })
}
