//! # u-costsim
//!
//! Monte Carlo simulation of construction cost totals.
//!
//! Distributions are fitted to historical cost components, resampled under
//! material and labor shock scenarios, and summarized with quantile-based
//! risk metrics. Loading data and rendering reports are left to callers.
//!
//! ## Modules
//!
//! - [`special`] — Special functions (normal CDF, gamma and beta families, Kolmogorov)
//! - [`stats`] — Descriptive statistics with numerical stability guarantees
//! - [`distributions`] — Parametric families and their estimators
//! - [`random`] — Seeded generators and draw helpers
//! - [`dataset`] — Historical project table and cleaning pass
//! - [`fit`] — Family selection by Kolmogorov–Smirnov distance
//! - [`sampler`] — Scenario-conditioned sample tables
//! - [`risk`] — VaR, CVaR and loss probability
//! - [`simulation`] — Scenario orchestration
//! - [`analysis`] — Summary tables, sensitivity and correlations
//! - [`config`] — TOML-loadable run settings
//! - [`engine`] — [`PricingSimulation`] front end
//!
//! ## Design Philosophy
//!
//! - **Explicit randomness**: every draw takes the generator as an argument,
//!   so a seed reproduces a whole study
//! - **Fallbacks over failures**: a variable that cannot be fitted or
//!   sampled degrades to an empirical normal and is flagged, never dropped
//! - **Property-based testing**: statistical invariants verified via proptest

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod distributions;
pub mod engine;
pub mod error;
pub mod fit;
pub mod random;
pub mod risk;
pub mod sampler;
pub mod simulation;
pub mod special;
pub mod stats;

pub use config::SimulationConfig;
pub use dataset::HistoricalDataset;
pub use engine::PricingSimulation;
pub use error::{Result, SimulationError};
pub use fit::{Family, FittedDistribution, FittedDistributions, FittedFamily};
pub use risk::{ColumnStatistics, RiskMetrics};
pub use sampler::{SampleTable, ScenarioSpec};
pub use simulation::{ScenarioResult, ScenarioSet, SimulationResults};
