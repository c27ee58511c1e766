//! Genetic algorithm over member permutations.
//!
//! This module exports the genome operators, selection, the population and
//! the generational driver.

pub mod genome;
pub mod selection;
pub mod population;
pub mod algorithm;

pub use genome::*;
pub use selection::*;
pub use population::*;
pub use algorithm::*;
