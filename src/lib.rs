//! Grouping GA Library
//!
//! A genetic algorithm that partitions a roster of members into a fixed number
//! of groups.
//!
//! # Features
//!
//! - Composite fitness: divergent/convergent attribute mix, group balance,
//!   pairwise preferences and aggregate/separate co-location constraints
//! - Permutation genomes with PMX crossover, swap and greedy inversion mutation
//! - Stochastic universal sampling with elitist generational replacement
//! - Seeded, reproducible runs and parallel multi-seed benchmarking
//!
//! # Example
//!
//! ```no_run
//! use grouping_ga::genetic::{GAConfig, GeneticAlgorithm};
//! use grouping_ga::instance::GroupingInstance;
//! use grouping_ga::weights::AttributeWeights;
//!
//! let instance = GroupingInstance::demo();
//! let context = instance.context(&AttributeWeights::uniform(3, 3)).unwrap();
//!
//! let config = GAConfig { max_generations: 200, ..Default::default() };
//! let mut ga = GeneticAlgorithm::new(context, config).unwrap();
//! let solution = ga.run().unwrap();
//!
//! println!("{}", solution);
//! ```

pub mod error;
pub mod weights;
pub mod member;
pub mod context;
pub mod fitness;
pub mod genetic;
pub mod instance;
pub mod solution;
pub mod benchmark;

pub use error::{GaError, Result};
pub use weights::AttributeWeights;
pub use member::{Member, MemberId};
pub use context::{DistributionConstraints, GroupLayout, RunContext};
pub use fitness::{FitnessBreakdown, FitnessEvaluator};
pub use genetic::{GAConfig, GeneticAlgorithm, Genome, Population, StochasticUniversalSampling};
pub use instance::GroupingInstance;
pub use solution::Solution;
