//! Generational loop of the grouping genetic algorithm.
//!
//! Each generation:
//! 1. selects `offspring_count` parents with stochastic universal sampling
//! 2. crosses each consecutive pair with PMX (two random cut points) with
//!    probability `crossover_prob`
//! 3. applies, independently and each with probability `mutation_prob`, a
//!    swap mutation and then a greedy inversion mutation to every offspring
//! 4. keeps the `population_size - offspring_count` fittest genomes of the
//!    previous generation and appends the offspring

use crate::context::RunContext;
use crate::error::{GaError, Result};
use crate::fitness::FitnessEvaluator;
use crate::genetic::genome::Genome;
use crate::genetic::population::Population;
use crate::genetic::selection::StochasticUniversalSampling;
use crate::solution::Solution;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::time::Instant;

/// Genetic Algorithm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GAConfig {
    /// Population size
    pub population_size: usize,
    /// Number of generations
    pub max_generations: usize,
    /// Share of the population replaced by offspring each generation, in (0, 1]
    pub generation_gap: f64,
    /// Crossover probability per parent pair
    pub crossover_prob: f64,
    /// Probability of each of the two mutations per offspring
    pub mutation_prob: f64,
    /// Stop once the population's total fitness reaches this value
    pub fitness_limit: Option<f64>,
    /// Stop after this many generations without a new best genome
    pub max_no_improve: Option<usize>,
    /// Time limit in seconds
    pub time_limit: Option<f64>,
    /// Random seed
    pub seed: u64,
}

impl Default for GAConfig {
    fn default() -> Self {
        GAConfig {
            population_size: 50,
            max_generations: 500,
            generation_gap: 0.9,
            crossover_prob: 0.9,
            mutation_prob: 0.09,
            fitness_limit: None,
            max_no_improve: None,
            time_limit: None,
            seed: 42,
        }
    }
}

impl GAConfig {
    /// `population_size * generation_gap` rounded up to the next even number
    pub fn offspring_count(&self) -> usize {
        // the product can land a few ulps above an integer (50 * 0.28 is
        // 14.000000000000002), which must not round up to the next one
        let raw = (self.population_size as f64 * self.generation_gap - 1e-9).ceil().max(0.0) as usize;
        if raw % 2 == 0 { raw } else { raw + 1 }
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(GaError::config(format!(
                "population size must be at least 2, got {}",
                self.population_size
            )));
        }
        if !(self.generation_gap > 0.0 && self.generation_gap <= 1.0) {
            return Err(GaError::config(format!(
                "generation gap must be in (0, 1], got {}",
                self.generation_gap
            )));
        }
        for (name, p) in [("crossover", self.crossover_prob), ("mutation", self.mutation_prob)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(GaError::config(format!("{} probability must be in [0, 1], got {}", name, p)));
            }
        }
        let offspring = self.offspring_count();
        if offspring < 2 || offspring > self.population_size {
            return Err(GaError::config(format!(
                "offspring count {} must be even and between 2 and the population size {}",
                offspring, self.population_size
            )));
        }
        Ok(())
    }
}

/// Summary of one generation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub total_fitness: f64,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub std_dev_fitness: f64,
}

impl GenerationStats {
    fn from_population(generation: usize, population: &Population) -> Self {
        let values = population.fitness_values();
        GenerationStats {
            generation,
            total_fitness: population.total_fitness(),
            best_fitness: population.fittest().map_or(0.0, Genome::fitness),
            mean_fitness: values.iter().mean(),
            std_dev_fitness: values.iter().population_std_dev(),
        }
    }
}

/// Genetic Algorithm implementation
pub struct GeneticAlgorithm {
    config: GAConfig,
    context: RunContext,
    population: Option<Population>,
    best: Option<Genome>,
    selector: StochasticUniversalSampling,
    rng: ChaCha8Rng,
    offspring_count: usize,
    generation: usize,
    no_improve_count: usize,
    history: Vec<GenerationStats>,
}

impl GeneticAlgorithm {
    pub fn new(context: RunContext, config: GAConfig) -> Result<Self> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let offspring_count = config.offspring_count();

        Ok(GeneticAlgorithm {
            config,
            context,
            population: None,
            best: None,
            selector: StochasticUniversalSampling::new(),
            rng,
            offspring_count,
            generation: 0,
            no_improve_count: 0,
            history: Vec::new(),
        })
    }

    /// Build the initial random population
    pub fn initialize(&mut self) -> Result<()> {
        let evaluator = FitnessEvaluator::new(&self.context);
        let population = Population::random(&evaluator, self.config.population_size, &mut self.rng)?;

        self.best = population.fittest().cloned();
        self.generation = 0;
        self.no_improve_count = 0;
        self.history.clear();

        log::info!(
            "Initialized population: {} genomes of {} members in {} groups (total fitness {:.4}, best {:.4})",
            population.size(),
            self.context.member_count(),
            self.context.layout().group_count(),
            population.total_fitness(),
            self.best.as_ref().map_or(0.0, Genome::fitness)
        );

        self.population = Some(population);
        Ok(())
    }

    /// Produce the next generation
    pub fn step(&mut self) -> Result<GenerationStats> {
        if self.population.is_none() {
            self.initialize()?;
        }

        let evaluator = FitnessEvaluator::new(&self.context);
        let population = self.population
            .as_mut()
            .ok_or_else(|| GaError::config("population was not initialized"))?;
        let n = self.context.member_count();

        let mut offspring = self.selector.select(population.genomes(), self.offspring_count, &mut self.rng)?;

        for pair in offspring.chunks_mut(2) {
            if pair.len() < 2 || self.rng.gen::<f64>() >= self.config.crossover_prob {
                continue;
            }
            let a = self.rng.gen_range(0..n);
            let b = self.rng.gen_range(0..n);
            let (start, end) = (a.min(b), a.max(b));

            let first = pair[0].crossover(&pair[1], start, end, &evaluator)?;
            let second = pair[1].crossover(&pair[0], start, end, &evaluator)?;
            pair[0] = first;
            pair[1] = second;
        }

        let mut children = Vec::with_capacity(offspring.len());
        for mut child in offspring {
            if self.rng.gen::<f64>() < self.config.mutation_prob {
                let i = self.rng.gen_range(0..n);
                let j = self.rng.gen_range(0..n);
                child = child.mutate_swap(i, j, &evaluator)?;
            }
            if self.rng.gen::<f64>() < self.config.mutation_prob {
                let i = self.rng.gen_range(0..n);
                let j = self.rng.gen_range(0..n);
                child = child.mutate_invert(i, j, &evaluator)?;
            }
            children.push(child);
        }

        let mut next = population.fittest_genomes(self.config.population_size - self.offspring_count);
        next.extend(children);
        population.replace(next)?;

        self.generation += 1;
        let stats = GenerationStats::from_population(self.generation, population);

        let improved = match (population.fittest(), &self.best) {
            (Some(candidate), Some(best)) => candidate.fitness() > best.fitness(),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if improved {
            self.best = population.fittest().cloned();
            self.no_improve_count = 0;
        } else {
            self.no_improve_count += 1;
        }

        log::debug!(
            "Gen {}  total {:.4}  best {:.4}  mean {:.4}  std {:.4}",
            stats.generation,
            stats.total_fitness,
            stats.best_fitness,
            stats.mean_fitness,
            stats.std_dev_fitness
        );

        self.history.push(stats);
        Ok(stats)
    }

    fn should_stop(&self, start: &Instant) -> bool {
        if self.generation >= self.config.max_generations {
            return true;
        }
        if let (Some(limit), Some(population)) = (self.config.fitness_limit, &self.population) {
            if population.total_fitness() >= limit {
                return true;
            }
        }
        if let Some(limit) = self.config.max_no_improve {
            if self.no_improve_count >= limit {
                return true;
            }
        }
        if let Some(limit) = self.config.time_limit {
            if start.elapsed().as_secs_f64() >= limit {
                return true;
            }
        }
        false
    }

    /// Run the genetic algorithm
    pub fn run(&mut self) -> Result<Solution> {
        self.run_with(|_| {})
    }

    /// Run the genetic algorithm, calling `observer` after every generation
    pub fn run_with<F: FnMut(&GenerationStats)>(&mut self, mut observer: F) -> Result<Solution> {
        let start = Instant::now();

        self.initialize()?;

        while !self.should_stop(&start) {
            let stats = self.step()?;
            observer(&stats);
        }

        let best = self.best
            .as_ref()
            .ok_or_else(|| GaError::config("no genome was evaluated"))?;

        let mut solution = Solution::from_genome(&self.context, best, "GeneticAlgorithm")?;
        solution.computation_time = start.elapsed().as_secs_f64();
        solution.generations = Some(self.generation);
        solution.seed = Some(self.config.seed);

        log::info!(
            "Finished after {} generations in {:.2}s, best fitness {:.4}",
            self.generation,
            solution.computation_time,
            solution.fitness
        );

        Ok(solution)
    }

    /// The `k` fittest genomes of the current population as solutions
    pub fn top_solutions(&mut self, k: usize) -> Result<Vec<Solution>> {
        let genomes = match self.population.as_mut() {
            Some(population) => population.fittest_genomes(k),
            None => return Ok(Vec::new()),
        };
        genomes.iter()
            .map(|g| {
                let mut solution = Solution::from_genome(&self.context, g, "GeneticAlgorithm")?;
                solution.generations = Some(self.generation);
                solution.seed = Some(self.config.seed);
                Ok(solution)
            })
            .collect()
    }

    /// Best genome seen so far across all generations
    pub fn best(&self) -> Option<&Genome> {
        self.best.as_ref()
    }

    pub fn population(&self) -> Option<&Population> {
        self.population.as_ref()
    }

    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    pub fn current_generation(&self) -> usize {
        self.generation
    }

    pub fn offspring_count(&self) -> usize {
        self.offspring_count
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn config(&self) -> &GAConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DistributionConstraints;
    use crate::member::Member;
    use crate::weights::AttributeWeights;
    use std::collections::HashSet;

    fn create_test_context() -> RunContext {
        let members = (0..12)
            .map(|id| {
                let x = (id % 4) as f64 / 3.0;
                let y = (id / 4) as f64 / 2.0;
                Member::new(id, vec![x, 1.0 - x], vec![y])
            })
            .collect();
        RunContext::new(members, 4, AttributeWeights::uniform(2, 1), DistributionConstraints::new([0, 1], [2, 3])).unwrap()
    }

    #[test]
    fn test_offspring_count_rounds_up_to_even() {
        let config = GAConfig { population_size: 50, generation_gap: 0.9, ..Default::default() };
        assert_eq!(config.offspring_count(), 46);

        let config = GAConfig { population_size: 10, generation_gap: 0.3, ..Default::default() };
        assert_eq!(config.offspring_count(), 4);

        let config = GAConfig { population_size: 10, generation_gap: 0.4, ..Default::default() };
        assert_eq!(config.offspring_count(), 4);
    }

    #[test]
    fn test_offspring_count_ignores_float_error() {
        let config = GAConfig { population_size: 50, generation_gap: 0.28, ..Default::default() };
        assert_eq!(config.offspring_count(), 14);

        let config = GAConfig { population_size: 100, generation_gap: 0.14, ..Default::default() };
        assert_eq!(config.offspring_count(), 14);
    }

    #[test]
    fn test_config_validation() {
        assert!(GAConfig::default().validate().is_ok());
        assert!(GAConfig { population_size: 1, ..Default::default() }.validate().is_err());
        assert!(GAConfig { generation_gap: 0.0, ..Default::default() }.validate().is_err());
        assert!(GAConfig { mutation_prob: 1.5, ..Default::default() }.validate().is_err());
        // 7 * 1.0 rounds up to 8 offspring, more than the population
        assert!(GAConfig { population_size: 7, generation_gap: 1.0, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_step_keeps_population_size_and_permutations() {
        let config = GAConfig { population_size: 20, seed: 5, ..Default::default() };
        let mut ga = GeneticAlgorithm::new(create_test_context(), config).unwrap();
        ga.initialize().unwrap();

        for _ in 0..10 {
            ga.step().unwrap();
            let population = ga.population().unwrap();
            assert_eq!(population.genomes().len(), 20);
            for g in population.genomes() {
                let ids: HashSet<usize> = g.order().iter().copied().collect();
                assert_eq!(ids.len(), 12);
            }
        }
        assert_eq!(ga.history().len(), 10);
        assert_eq!(ga.current_generation(), 10);
    }

    #[test]
    fn test_elitism_never_loses_best() {
        let config = GAConfig { population_size: 16, generation_gap: 0.5, seed: 8, ..Default::default() };
        let mut ga = GeneticAlgorithm::new(create_test_context(), config).unwrap();
        ga.initialize().unwrap();

        let mut previous = ga.population().unwrap().fittest().unwrap().fitness();
        for _ in 0..15 {
            let stats = ga.step().unwrap();
            assert!(stats.best_fitness >= previous);
            previous = stats.best_fitness;
        }
    }

    #[test]
    fn test_run_is_reproducible() {
        let config = GAConfig { population_size: 12, max_generations: 20, seed: 99, ..Default::default() };

        let a = GeneticAlgorithm::new(create_test_context(), config.clone()).unwrap().run().unwrap();
        let b = GeneticAlgorithm::new(create_test_context(), config).unwrap().run().unwrap();

        assert_eq!(a.groups, b.groups);
        assert_eq!(a.fitness, b.fitness);
        assert_eq!(a.generations, Some(20));
        assert!(a.is_complete(&create_test_context()));
    }

    #[test]
    fn test_fitness_limit_stops_early() {
        let config = GAConfig {
            population_size: 10,
            max_generations: 1000,
            fitness_limit: Some(0.0),
            ..Default::default()
        };
        let mut ga = GeneticAlgorithm::new(create_test_context(), config).unwrap();
        let solution = ga.run().unwrap();
        assert_eq!(solution.generations, Some(0));
    }

    #[test]
    fn test_stagnation_limit() {
        let config = GAConfig {
            population_size: 10,
            max_generations: 10_000,
            max_no_improve: Some(5),
            ..Default::default()
        };
        let mut ga = GeneticAlgorithm::new(create_test_context(), config).unwrap();
        let solution = ga.run().unwrap();
        assert!(solution.generations.unwrap() < 10_000);
    }

    #[test]
    fn test_top_solutions_ranked() {
        let config = GAConfig { population_size: 10, max_generations: 5, ..Default::default() };
        let mut ga = GeneticAlgorithm::new(create_test_context(), config).unwrap();
        ga.run().unwrap();

        let top = ga.top_solutions(3).unwrap();
        assert_eq!(top.len(), 3);
        assert!(top[0].fitness >= top[1].fitness && top[1].fitness >= top[2].fitness);
        assert_eq!(top[0].groups.len(), 4);
    }

    #[test]
    fn test_fully_aggregated_roster_runs() {
        let members = vec![
            Member::new(0, vec![0.0], vec![]).with_preferences([1]),
            Member::new(1, vec![1.0], vec![]).with_preferences([0]),
            Member::new(2, vec![0.0], vec![]).with_preferences([3]),
            Member::new(3, vec![1.0], vec![]).with_preferences([2]),
        ];
        let constraints = DistributionConstraints::new([0, 1, 2, 3], []);
        let context = RunContext::new(members, 2, AttributeWeights::new(vec![1.0], vec![]), constraints).unwrap();

        let config = GAConfig { population_size: 10, ..Default::default() };
        let mut ga = GeneticAlgorithm::new(context, config).unwrap();
        let solution = ga.run().unwrap();

        assert!(solution.fitness.is_finite() && solution.fitness > 0.0);
        assert!(solution.shares_group(0, 1));
        assert!(solution.shares_group(2, 3));
    }
}
