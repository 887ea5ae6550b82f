//! Run configuration.

use serde::{Deserialize, Serialize};

use crate::dataset::DEFAULT_VARIABLES;
use crate::error::{Result, SimulationError};
use crate::fit::Family;
use crate::simulation::ScenarioSet;

pub const DEFAULT_N_SIMULATIONS: usize = 10_000;

/// Settings for one simulation study. Missing keys take their defaults.
///
/// ```toml
/// n_simulations = 5000
/// seed = 42
/// candidate_families = ["normal", "gamma"]
///
/// [[scenarios]]
/// name = "baseline"
///
/// [[scenarios]]
/// name = "material_increase_10pct"
/// multipliers = { Material_Cost = 1.1 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Rows generated per scenario.
    pub n_simulations: usize,
    /// Fixed seed for reproducible runs; OS entropy when absent.
    pub seed: Option<u64>,
    /// Dataset columns to fit and sample, in this order.
    pub variables: Vec<String>,
    pub candidate_families: Vec<Family>,
    pub scenarios: ScenarioSet,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_simulations: DEFAULT_N_SIMULATIONS,
            seed: None,
            variables: DEFAULT_VARIABLES.iter().map(|v| v.to_string()).collect(),
            candidate_families: Family::ALL.to_vec(),
            scenarios: ScenarioSet::default(),
        }
    }
}

impl SimulationConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    /// [`SimulationError::Config`] for malformed TOML or rejected
    /// scenarios, plus anything [`validate`](Self::validate) reports.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| SimulationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_scenarios(mut self, scenarios: ScenarioSet) -> Self {
        self.scenarios = scenarios;
        self
    }

    /// # Errors
    /// - [`SimulationError::InvalidSampleCount`] if `n_simulations` is zero
    /// - [`SimulationError::Config`] without variables or candidate families
    /// - [`SimulationError::MissingBaseline`] without a baseline scenario
    pub fn validate(&self) -> Result<()> {
        if self.n_simulations == 0 {
            return Err(SimulationError::InvalidSampleCount);
        }
        if self.variables.is_empty() {
            return Err(SimulationError::Config("no variables to model".into()));
        }
        if self.candidate_families.is_empty() {
            return Err(SimulationError::Config("no candidate families".into()));
        }
        self.scenarios.validate()
    }
}
