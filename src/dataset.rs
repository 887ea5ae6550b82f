//! Historical project data fed to the fitter.
//!
//! A column-oriented table of optional numeric values. Missing entries
//! are kept per cell so that a gap in one column never removes the row
//! from another column's fit.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, SimulationError};

pub const MATERIAL_COST: &str = "Material_Cost";
pub const LABOR_COST: &str = "Labor_Cost";
pub const PROFIT_RATE: &str = "Profit_Rate";
pub const DISCOUNT_OR_MARKUP: &str = "Discount_or_Markup";
pub const TOTAL_ESTIMATE: &str = "Total_Estimate";
/// Bottom-up total rebuilt from sampled components.
pub const TOTAL_ESTIMATE_CALCULATED: &str = "Total_Estimate_Calculated";

/// The four components the derived total is rebuilt from.
pub const COST_COMPONENTS: [&str; 4] = [MATERIAL_COST, LABOR_COST, PROFIT_RATE, DISCOUNT_OR_MARKUP];

/// Columns modeled by default.
pub const DEFAULT_VARIABLES: [&str; 5] = [
    MATERIAL_COST,
    LABOR_COST,
    PROFIT_RATE,
    DISCOUNT_OR_MARKUP,
    TOTAL_ESTIMATE,
];

/// Name fragments marking a column as a monetary amount that should not
/// go negative.
const MONETARY_MARKERS: [&str; 4] = ["cost", "price", "estimate", "total"];

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

/// Immutable-by-convention table of historical projects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoricalDataset {
    columns: Vec<Column>,
    rows: usize,
}

/// What [`HistoricalDataset::clean`] found and changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub duplicates_removed: usize,
    /// `(column, missing or non-finite cells)` for columns with gaps.
    pub missing: Vec<(String, usize)>,
    /// `(column, negative values)` for monetary columns; flagged only.
    pub negatives: Vec<(String, usize)>,
}

impl HistoricalDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a column that may contain missing cells.
    ///
    /// # Errors
    /// [`SimulationError::ColumnLength`] if the column length disagrees
    /// with columns already present.
    pub fn with_column<I>(mut self, name: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let name = name.into();
        let values: Vec<Option<f64>> = values.into_iter().collect();
        let replacing = self.columns.iter().position(|c| c.name == name);
        let others = self.columns.len() - usize::from(replacing.is_some());
        if others > 0 && values.len() != self.rows {
            return Err(SimulationError::ColumnLength {
                column: name,
                expected: self.rows,
                got: values.len(),
            });
        }
        self.rows = values.len();
        let column = Column { name, values };
        match replacing {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }

    /// Adds a fully observed column.
    pub fn with_values(self, name: impl Into<String>, values: &[f64]) -> Result<Self> {
        self.with_column(name, values.iter().copied().map(Some))
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Observed values of `name`, with missing, NaN and infinite cells
    /// dropped.
    ///
    /// Returns `None` if the column does not exist.
    pub fn values(&self, name: &str) -> Option<Vec<f64>> {
        self.columns.iter().find(|c| c.name == name).map(|c| {
            c.values
                .iter()
                .filter_map(|v| v.filter(|x| x.is_finite()))
                .collect()
        })
    }

    /// Removes exact duplicate rows, keeping the first occurrence.
    ///
    /// Returns the number of rows removed.
    pub fn drop_duplicate_rows(&mut self) -> usize {
        let mut seen = HashSet::new();
        let keep: Vec<bool> = (0..self.rows)
            .map(|row| {
                let key: Vec<Option<u64>> = self
                    .columns
                    .iter()
                    .map(|c| c.values[row].map(f64::to_bits))
                    .collect();
                seen.insert(key)
            })
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            for column in &mut self.columns {
                let mut flags = keep.iter();
                column.values.retain(|_| flags.next().copied().unwrap_or(true));
            }
            self.rows -= removed;
        }
        removed
    }

    /// Counts missing or non-finite cells per column, omitting complete
    /// columns.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .filter_map(|c| {
                let missing = c
                    .values
                    .iter()
                    .filter(|v| v.map_or(true, |x| !x.is_finite()))
                    .count();
                (missing > 0).then(|| (c.name.clone(), missing))
            })
            .collect()
    }

    /// Counts negative values in monetary columns (cost, price, estimate,
    /// total). Anomalies are reported, never corrected.
    pub fn negative_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .filter(|c| {
                let lower = c.name.to_lowercase();
                MONETARY_MARKERS.iter().any(|m| lower.contains(m))
            })
            .filter_map(|c| {
                let negative = c.values.iter().flatten().filter(|&&x| x < 0.0).count();
                (negative > 0).then(|| (c.name.clone(), negative))
            })
            .collect()
    }

    /// Basic cleaning pass: drop duplicates, tally gaps, flag negatives.
    pub fn clean(&mut self) -> CleaningReport {
        let duplicates_removed = self.drop_duplicate_rows();
        let missing = self.missing_counts();
        let negatives = self.negative_counts();

        for (column, count) in &missing {
            warn!(column = %column, missing = count, "column has missing values");
        }
        for (column, count) in &negatives {
            warn!(column = %column, negatives = count, "negative values in monetary column");
        }
        info!(
            rows = self.rows,
            columns = self.columns.len(),
            duplicates_removed,
            "dataset cleaned"
        );

        CleaningReport {
            duplicates_removed,
            missing,
            negatives,
        }
    }
}
