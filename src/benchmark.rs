//! Benchmarking and experimentation module.
//!
//! Runs the genetic algorithm repeatedly on an instance with consecutive
//! seeds, collects per-run results and summarizes them.

use crate::error::Result;
use crate::genetic::{GAConfig, GeneticAlgorithm};
use crate::instance::GroupingInstance;
use crate::solution::Solution;
use crate::weights::AttributeWeights;

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Result of a single run on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Instance name
    pub instance: String,
    /// Number of members
    pub members: usize,
    /// Number of groups
    pub groups: usize,
    /// Run index within the benchmark
    pub run: usize,
    /// Seed of the run
    pub seed: u64,
    /// Best fitness found
    pub fitness: f64,
    /// Cost behind that fitness
    pub cost: f64,
    /// Generations executed
    pub generations: usize,
    /// Computation time in seconds
    pub time: f64,
}

/// Aggregated statistics over the runs on one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Instance name
    pub instance: String,
    /// Number of runs
    pub num_runs: usize,
    /// Average fitness
    pub mean_fitness: f64,
    /// Standard deviation of fitness
    pub std_fitness: f64,
    /// Best fitness
    pub best_fitness: f64,
    /// Worst fitness
    pub worst_fitness: f64,
    /// Seed of the best run
    pub best_seed: u64,
    /// Average generations executed
    pub mean_generations: f64,
    /// Average time
    pub mean_time: f64,
    /// Total time
    pub total_time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of runs per instance
    pub num_runs: usize,
    /// Run `i` uses seed `base_seed + i`
    pub base_seed: u64,
    /// Run in parallel
    pub parallel: bool,
    /// Settings shared by every run; its seed is overridden
    pub ga: GAConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 10,
            base_seed: 0,
            parallel: true,
            ga: GAConfig::default(),
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunResult>,
    best: HashMap<String, Solution>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
            best: HashMap::new(),
        }
    }

    /// Run the genetic algorithm `num_runs` times on `instance`
    pub fn run(&mut self, instance: &GroupingInstance, weights: &AttributeWeights) -> Result<()> {
        log::info!(
            "Running benchmark on instance: {} ({} runs, seeds {}..{})",
            instance.name,
            self.config.num_runs,
            self.config.base_seed,
            self.config.base_seed + self.config.num_runs as u64
        );

        let context = instance.context(weights)?;
        let base_seed = self.config.base_seed;
        let ga = &self.config.ga;

        let run_one = |run: usize| -> Result<Solution> {
            let config = GAConfig { seed: base_seed + run as u64, ..ga.clone() };
            GeneticAlgorithm::new(context.clone(), config)?.run()
        };

        let solutions = if self.config.parallel {
            (0..self.config.num_runs).into_par_iter().map(run_one).collect::<Result<Vec<_>>>()?
        } else {
            (0..self.config.num_runs).map(run_one).collect::<Result<Vec<_>>>()?
        };

        for (run, solution) in solutions.into_iter().enumerate() {
            self.record_result(instance, run, solution);
        }

        Ok(())
    }

    fn record_result(&mut self, instance: &GroupingInstance, run: usize, solution: Solution) {
        log::debug!("{} run {}: fitness {:.6}", instance.name, run, solution.fitness);

        self.results.push(RunResult {
            instance: instance.name.clone(),
            members: instance.members.len(),
            groups: instance.group_count,
            run,
            seed: solution.seed.unwrap_or(self.config.base_seed + run as u64),
            fitness: solution.fitness,
            cost: solution.breakdown.cost,
            generations: solution.generations.unwrap_or(0),
            time: solution.computation_time,
        });

        let improves = self.best
            .get(&instance.name)
            .map_or(true, |best| solution.fitness > best.fitness);
        if improves {
            self.best.insert(instance.name.clone(), solution);
        }
    }

    /// Compute statistics for each instance
    pub fn compute_statistics(&self) -> Vec<RunStatistics> {
        let mut stats_map: HashMap<&str, Vec<&RunResult>> = HashMap::new();
        for result in &self.results {
            stats_map.entry(result.instance.as_str()).or_default().push(result);
        }

        let mut statistics: Vec<RunStatistics> = stats_map.into_iter()
            .filter_map(|(instance, runs)| {
                let best = runs.iter().max_by_key(|r| OrderedFloat(r.fitness))?;
                let fitness: Vec<f64> = runs.iter().map(|r| r.fitness).collect();
                let generations: Vec<f64> = runs.iter().map(|r| r.generations as f64).collect();
                let times: Vec<f64> = runs.iter().map(|r| r.time).collect();

                Some(RunStatistics {
                    instance: instance.to_string(),
                    num_runs: runs.len(),
                    mean_fitness: fitness.iter().mean(),
                    std_fitness: fitness.iter().population_std_dev(),
                    best_fitness: best.fitness,
                    worst_fitness: fitness.iter().cloned().fold(f64::INFINITY, f64::min),
                    best_seed: best.seed,
                    mean_generations: generations.iter().mean(),
                    mean_time: times.iter().mean(),
                    total_time: times.iter().sum(),
                })
            })
            .collect();

        statistics.sort_by(|a, b| a.instance.cmp(&b.instance));
        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       Grouping GA Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!("Generated: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
        report.push_str(&format!(
            "Population {}, gap {}, crossover {}, mutation {}, max generations {}\n\n",
            self.config.ga.population_size,
            self.config.ga.generation_gap,
            self.config.ga.crossover_prob,
            self.config.ga.mutation_prob,
            self.config.ga.max_generations
        ));

        report.push_str("Fitness Summary:\n");
        report.push_str("-".repeat(96).as_str());
        report.push('\n');
        report.push_str(&format!("{:<20} {:>6} {:>12} {:>12} {:>12} {:>12} {:>8} {:>10}\n",
            "Instance", "Runs", "Mean", "Std", "Best", "Worst", "Gens", "Avg Time"));
        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            report.push_str(&format!("{:<20} {:>6} {:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>8.1} {:>10.4}\n",
                stat.instance,
                stat.num_runs,
                stat.mean_fitness,
                stat.std_fitness,
                stat.best_fitness,
                stat.worst_fitness,
                stat.mean_generations,
                stat.mean_time));
        }

        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        report.push_str("\nBest Grouping per Instance:\n");
        let mut names: Vec<&String> = self.best.keys().collect();
        names.sort();
        for name in names {
            let best = &self.best[name];
            report.push_str(&format!("  {}: {:.6} (seed {})\n",
                name, best.fitness, best.seed.unwrap_or_default()));
            for (g, group) in best.groups.iter().enumerate() {
                report.push_str(&format!("    Group {}: {:?}\n", g + 1, group));
            }
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    /// Best solution found on `instance`
    pub fn best_solution(&self, instance: &str) -> Option<&Solution> {
        self.best.get(instance)
    }
}
