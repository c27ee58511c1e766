//! Stochastic Universal Sampling.
//!
//! `count` equally spaced pointers are laid over the cumulative fitness of the
//! population, starting from a single random offset in `[0, spacing)`. Each
//! pointer selects the genome whose fitness slice it falls into, so a genome
//! is picked roughly `fitness / total * count` times and may be picked more
//! than once.

use crate::error::{GaError, Result};
use crate::genetic::genome::Genome;
use rand::prelude::*;

/// Fitness-proportional, low-variance selection with repeats allowed
#[derive(Debug, Clone, Copy, Default)]
pub struct StochasticUniversalSampling;

impl StochasticUniversalSampling {
    pub fn new() -> Self {
        StochasticUniversalSampling
    }

    /// Select `count` genomes (cloned) from `genomes`
    pub fn select<R: Rng + ?Sized>(&self, genomes: &[Genome], count: usize, rng: &mut R) -> Result<Vec<Genome>> {
        Ok(self.select_indices(genomes, count, rng)?
            .into_iter()
            .map(|i| genomes[i].clone())
            .collect())
    }

    /// Positions in `genomes` of the `count` selected entries, in walk order
    pub fn select_indices<R: Rng + ?Sized>(&self, genomes: &[Genome], count: usize, rng: &mut R) -> Result<Vec<usize>> {
        if count == 0 {
            return Err(GaError::Selection("selection count must be at least 1".to_string()));
        }
        if let Some(g) = genomes.iter().find(|g| !g.fitness().is_finite() || g.fitness() < 0.0) {
            return Err(GaError::Selection(format!("genome fitness {} is not a finite non-negative value", g.fitness())));
        }

        let total_fitness: f64 = genomes.iter().map(Genome::fitness).sum();
        if !total_fitness.is_finite() || total_fitness <= 0.0 {
            return Err(GaError::Selection(format!(
                "total fitness must be strictly positive, got {}",
                total_fitness
            )));
        }

        let spacing = total_fitness / count as f64;
        let mut pointer = rng.gen::<f64>() * spacing;
        let mut cumulative = 0.0;
        let mut selected = Vec::with_capacity(count);

        // One pass suffices in exact arithmetic; the second only absorbs
        // rounding drift on the last pointer.
        for pass in 0..2 {
            if pass > 0 {
                log::debug!("SUS rewalking population, {} of {} selected", selected.len(), count);
            }
            for (i, genome) in genomes.iter().enumerate() {
                cumulative += genome.fitness();
                while cumulative > pointer && selected.len() < count {
                    selected.push(i);
                    pointer += spacing;
                }
                if selected.len() == count {
                    return Ok(selected);
                }
            }
        }

        Err(GaError::Selection(format!("only {} of {} pointers resolved", selected.len(), count)))
    }
}
