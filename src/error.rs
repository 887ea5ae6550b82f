//! Structural errors surfaced to callers.
//!
//! Per-family and per-variable failures ([`FitError`](crate::fit::FitError),
//! [`SampleError`](crate::sampler::SampleError)) are absorbed with an
//! empirical-normal fallback and never reach this type.

/// Caller misuse or input that makes a computation meaningless.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("no fitted distributions: run the fitter before sampling")]
    MissingDistributions,

    #[error("cannot compute statistics on an empty column")]
    EmptyInput,

    #[error("column contains NaN or infinite values")]
    NonFiniteInput,

    #[error("unknown scenario '{name}'")]
    UnknownScenario { name: String },

    #[error("no column named '{name}' in the sample table")]
    UnknownColumn { name: String },

    #[error("scenario set has no 'baseline' entry")]
    MissingBaseline,

    #[error("scenario '{name}' declared more than once")]
    DuplicateScenario { name: String },

    #[error("multiplier for '{variable}' must be a positive finite number, got {multiplier}")]
    InvalidMultiplier { variable: String, multiplier: f64 },

    #[error("sample count must be at least 1")]
    InvalidSampleCount,

    #[error("column '{column}' has {got} rows, dataset has {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
