//! Read-only views over simulation output for reporting collaborators.

use serde::Serialize;

use crate::error::{Result, SimulationError};
use crate::sampler::SampleTable;
use crate::simulation::{SimulationResults, BASELINE};
use crate::stats;

/// One line of a scenario's summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub variable: String,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Change of one variable's mean relative to the baseline scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioImpact {
    pub scenario: String,
    pub base_mean: f64,
    pub scenario_mean: f64,
    pub absolute_change: f64,
    /// `None` when the baseline mean is zero.
    pub percent_change: Option<f64>,
}

impl SimulationResults {
    /// Summary table of one scenario in sample column order.
    ///
    /// # Errors
    /// [`SimulationError::UnknownScenario`] if `name` was not run.
    pub fn summary_statistics(&self, name: &str) -> Result<Vec<SummaryRow>> {
        let result = self.get(name)?;
        Ok(result
            .all_statistics()
            .map(|(variable, s)| SummaryRow {
                variable: variable.to_string(),
                mean: s.mean,
                median: s.median,
                std: s.std,
                min: s.min,
                max: s.max,
                p95: s.q95,
                p99: s.q99,
            })
            .collect())
    }

    /// Sensitivity of `variable` to each non-baseline scenario.
    ///
    /// # Errors
    /// - [`SimulationError::UnknownScenario`] if there is no baseline result
    /// - [`SimulationError::UnknownColumn`] if the baseline has no such column
    pub fn impact_versus_baseline(&self, variable: &str) -> Result<Vec<ScenarioImpact>> {
        let base_mean = self
            .baseline()?
            .statistics(variable)
            .ok_or_else(|| SimulationError::UnknownColumn {
                name: variable.to_string(),
            })?
            .mean;

        Ok(self
            .iter()
            .filter(|r| r.name() != BASELINE)
            .filter_map(|r| {
                let scenario_mean = r.statistics(variable)?.mean;
                let absolute_change = scenario_mean - base_mean;
                Some(ScenarioImpact {
                    scenario: r.name().to_string(),
                    base_mean,
                    scenario_mean,
                    absolute_change,
                    percent_change: (base_mean != 0.0).then(|| absolute_change / base_mean * 100.0),
                })
            })
            .collect())
    }
}

/// Pearson correlations between the columns of a sample table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    columns: Vec<String>,
    /// Row-major; `None` where a column has no variance.
    values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

/// Correlation matrix of every column in `table`.
pub fn correlation_matrix(table: &SampleTable) -> CorrelationMatrix {
    let columns: Vec<&[f64]> = table.columns().map(|c| c.values()).collect();
    let values = columns
        .iter()
        .map(|x| columns.iter().map(|y| stats::correlation(x, y)).collect())
        .collect();
    CorrelationMatrix {
        columns: table.column_names().map(str::to_string).collect(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LABOR_COST, MATERIAL_COST, TOTAL_ESTIMATE_CALCULATED};
    use crate::fit::{FittedDistributions, FittedFamily};
    use crate::random::create_rng;
    use crate::sampler::tests::{components, normal, record};
    use crate::sampler::{sample, ScenarioSpec};
    use crate::simulation::{run, ScenarioSet};

    #[test]
    fn test_summary_rows_follow_column_order() {
        let results = run(&components(), 500, &ScenarioSet::default(), &mut create_rng(1)).unwrap();
        let rows = results.summary_statistics(BASELINE).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.variable.as_str()).collect();
        let columns: Vec<&str> = results.baseline().unwrap().samples().column_names().collect();
        assert_eq!(names, columns);
        for row in &rows {
            assert!(row.min <= row.median && row.median <= row.p95 && row.p95 <= row.p99);
            assert!(row.p99 <= row.max);
        }
        assert!(matches!(
            results.summary_statistics("nope"),
            Err(SimulationError::UnknownScenario { .. })
        ));
    }

    #[test]
    fn test_impact_versus_baseline() {
        let results = run(&components(), 5_000, &ScenarioSet::default(), &mut create_rng(4)).unwrap();
        let impacts = results.impact_versus_baseline(MATERIAL_COST).unwrap();
        let names: Vec<&str> = impacts.iter().map(|i| i.scenario.as_str()).collect();
        assert_eq!(
            names,
            vec!["material_increase_10pct", "labor_increase_15pct", "combined_increase"]
        );
        let material = &impacts[0];
        assert!((material.percent_change.unwrap() - 10.0).abs() < 1.0);
        assert!((material.absolute_change - (material.scenario_mean - material.base_mean)).abs() < 1e-9);
        // labor shock leaves material untouched
        assert!(impacts[1].percent_change.unwrap().abs() < 1.0);

        let totals = results.impact_versus_baseline(TOTAL_ESTIMATE_CALCULATED).unwrap();
        assert!(totals.iter().all(|i| i.absolute_change > 0.0));
        assert!(matches!(
            results.impact_versus_baseline("Overhead"),
            Err(SimulationError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_correlation_matrix() {
        let table = sample(&components(), 2_000, &ScenarioSpec::baseline(), &mut create_rng(12)).unwrap();
        let m = correlation_matrix(&table);
        assert_eq!(m.columns().len(), 6);
        assert!((m.get(MATERIAL_COST, MATERIAL_COST).unwrap() - 1.0).abs() < 1e-12);
        // independently drawn components
        assert!(m.get(MATERIAL_COST, LABOR_COST).unwrap().abs() < 0.1);
        // the derived total is driven by its components
        assert!(m.get(MATERIAL_COST, TOTAL_ESTIMATE_CALCULATED).unwrap() > 0.5);
        assert_eq!(m.get(MATERIAL_COST, "missing"), None);
    }

    #[test]
    fn test_correlation_with_constant_column() {
        let fitted: FittedDistributions = [
            record(MATERIAL_COST, FittedFamily::EmpiricalFallback, 5.0, 0.0),
            normal(LABOR_COST, 10.0, 1.0),
        ]
        .into_iter()
        .collect();
        let table = sample(&fitted, 100, &ScenarioSpec::baseline(), &mut create_rng(0)).unwrap();
        let m = correlation_matrix(&table);
        assert_eq!(m.get(MATERIAL_COST, LABOR_COST), None);
        assert!(m.get(LABOR_COST, LABOR_COST).is_some());
    }
}
