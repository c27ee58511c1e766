//! Error types for the grouping solver.

use thiserror::Error;

/// Errors raised while configuring or running the genetic algorithm.
#[derive(Debug, Error)]
pub enum GaError {
    /// Parameters or input data that cannot produce a meaningful run
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The composite cost was zero, negative or not finite, so its reciprocal
    /// cannot serve as a fitness
    #[error("Non-finite fitness: composite cost {cost} is not strictly positive")]
    NonFiniteFitness { cost: f64 },

    /// Stochastic universal sampling could not be performed
    #[error("Selection failed: {0}")]
    Selection(String),

    /// A replacement generation did not match the configured population size
    #[error("Population size mismatch: expected {expected}, got {actual}")]
    PopulationSizeMismatch { expected: usize, actual: usize },

    /// A crossover or mutation index fell outside the permutation
    #[error("Index {index} out of range for permutation of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GaError>;

impl GaError {
    /// Shorthand for [`GaError::InvalidConfiguration`]
    pub fn config(msg: impl Into<String>) -> Self {
        GaError::InvalidConfiguration(msg.into())
    }
}
