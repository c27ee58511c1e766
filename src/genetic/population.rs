//! Fixed-size collection of genomes for one generation.

use crate::error::{GaError, Result};
use crate::fitness::FitnessEvaluator;
use crate::genetic::genome::Genome;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rayon::prelude::*;

/// The genomes of the current generation
#[derive(Debug, Clone)]
pub struct Population {
    genomes: Vec<Genome>,
    size: usize,
}

impl Population {
    /// `size` uniformly random permutations of the roster.
    ///
    /// Permutations are drawn sequentially from `rng`, then evaluated in
    /// parallel.
    pub fn random<R: Rng + ?Sized>(evaluator: &FitnessEvaluator, size: usize, rng: &mut R) -> Result<Self> {
        if size < 2 {
            return Err(GaError::config(format!("population size must be at least 2, got {}", size)));
        }

        let n = evaluator.context().member_count();
        let orders: Vec<Vec<usize>> = (0..size).map(|_| Genome::shuffled_order(n, rng)).collect();

        let genomes = orders
            .into_par_iter()
            .map(|order| {
                let fitness = evaluator.evaluate(&order)?;
                Ok(Genome::with_fitness(order, fitness))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Population { genomes, size })
    }

    /// Wrap existing genomes; their count becomes the fixed size
    pub fn from_genomes(genomes: Vec<Genome>) -> Result<Self> {
        if genomes.len() < 2 {
            return Err(GaError::config(format!(
                "population size must be at least 2, got {}",
                genomes.len()
            )));
        }
        let size = genomes.len();
        Ok(Population { genomes, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    pub fn total_fitness(&self) -> f64 {
        self.genomes.iter().map(Genome::fitness).sum()
    }

    /// The `k` fittest genomes, best first. Sorts the population in place.
    pub fn fittest_genomes(&mut self, k: usize) -> Vec<Genome> {
        self.genomes.sort_by_key(|g| OrderedFloat(-g.fitness()));
        self.genomes.iter().take(k).cloned().collect()
    }

    /// The fittest genome, without reordering
    pub fn fittest(&self) -> Option<&Genome> {
        self.genomes.iter().max_by_key(|g| OrderedFloat(g.fitness()))
    }

    /// Swap in a new generation. A batch of the wrong size is rejected and
    /// the current generation is kept.
    pub fn replace(&mut self, genomes: Vec<Genome>) -> Result<()> {
        if genomes.len() != self.size {
            log::warn!(
                "Rejected replacement generation of {} genomes (population size {})",
                genomes.len(),
                self.size
            );
            return Err(GaError::PopulationSizeMismatch { expected: self.size, actual: genomes.len() });
        }
        self.genomes = genomes;
        Ok(())
    }

    /// Fitness of every genome in population order
    pub fn fitness_values(&self) -> Vec<f64> {
        self.genomes.iter().map(Genome::fitness).collect()
    }
}
