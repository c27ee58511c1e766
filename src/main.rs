//! Grouping GA - Command Line Interface
//!
//! Splits a roster into balanced groups with a genetic algorithm.

use clap::{Args, Parser, Subcommand};
use grouping_ga::benchmark::{Benchmark, BenchmarkConfig};
use grouping_ga::error::{GaError, Result};
use grouping_ga::fitness::FitnessEvaluator;
use grouping_ga::genetic::{GAConfig, GeneticAlgorithm, Population};
use grouping_ga::instance::GroupingInstance;
use grouping_ga::solution::Solution;
use grouping_ga::weights::AttributeWeights;

use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "grouping-ga")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Partition a roster into balanced groups with a genetic algorithm")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the genetic algorithm once
    Solve {
        #[command(flatten)]
        roster: RosterArgs,

        #[command(flatten)]
        ga: GaArgs,

        /// Number of ranked groupings to report
        #[arg(short, long, default_value = "1")]
        top: usize,

        /// Output solutions to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the genetic algorithm with consecutive seeds and summarize
    Benchmark {
        #[command(flatten)]
        roster: RosterArgs,

        #[command(flatten)]
        ga: GaArgs,

        /// Number of runs
        #[arg(long, default_value = "10")]
        runs: usize,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Run one seed at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Analyze a roster
    Analyze {
        #[command(flatten)]
        roster: RosterArgs,

        /// Number of random groupings sampled for the fitness baseline
        #[arg(long, default_value = "200")]
        samples: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

#[derive(Args)]
struct RosterArgs {
    /// Path to a roster CSV file
    #[arg(short, long)]
    roster: Option<PathBuf>,

    /// Use the built-in 20-member demo roster
    #[arg(long)]
    demo: bool,

    /// Generate a random roster with this many members
    #[arg(long)]
    random: Option<usize>,

    /// Divergent attributes per member of a random roster
    #[arg(long, default_value = "3")]
    divergent: usize,

    /// Convergent attributes per member of a random roster
    #[arg(long, default_value = "3")]
    convergent: usize,

    /// Seed of a random roster
    #[arg(long, default_value = "0")]
    roster_seed: u64,

    /// Number of groups
    #[arg(short, long)]
    groups: Option<usize>,

    /// Weights JSON file (uniform weights when absent)
    #[arg(short, long)]
    weights: Option<PathBuf>,

    /// Member ids that should share a group
    #[arg(long, value_delimiter = ',')]
    aggregate: Vec<usize>,

    /// Member ids that should not share a group
    #[arg(long, value_delimiter = ',')]
    separate: Vec<usize>,
}

#[derive(Args)]
struct GaArgs {
    /// Population size
    #[arg(short, long, default_value = "50")]
    population: usize,

    /// Maximum number of generations
    #[arg(long, default_value = "500")]
    generations: usize,

    /// Share of the population replaced each generation
    #[arg(long, default_value = "0.9")]
    gap: f64,

    /// Crossover probability
    #[arg(long, default_value = "0.9")]
    crossover: f64,

    /// Mutation probability
    #[arg(long, default_value = "0.09")]
    mutation: f64,

    /// Stop once the population's total fitness reaches this value
    #[arg(long)]
    fitness_limit: Option<f64>,

    /// Stop after this many generations without improvement
    #[arg(long)]
    max_no_improve: Option<usize>,

    /// Time limit in seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// Random seed
    #[arg(short, long, default_value = "42")]
    seed: u64,
}

impl GaArgs {
    fn config(&self) -> GAConfig {
        GAConfig {
            population_size: self.population,
            max_generations: self.generations,
            generation_gap: self.gap,
            crossover_prob: self.crossover,
            mutation_prob: self.mutation,
            fitness_limit: self.fitness_limit,
            max_no_improve: self.max_no_improve,
            time_limit: self.time_limit,
            seed: self.seed,
        }
    }
}

#[derive(Serialize)]
struct SolveOutput<'a> {
    instance: &'a str,
    config: &'a GAConfig,
    weights: &'a AttributeWeights,
    solutions: &'a [Solution],
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve { roster, ga, top, output, verbose } => {
            solve_instance(&roster, &ga, top, output, verbose)
        }

        Commands::Benchmark { roster, ga, runs, output, sequential } => {
            run_benchmark(&roster, &ga, runs, &output, sequential)
        }

        Commands::Analyze { roster, samples, seed } => {
            analyze_instance(&roster, samples, seed)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_instance(args: &RosterArgs) -> Result<(GroupingInstance, AttributeWeights)> {
    let instance = if args.demo {
        let mut demo = GroupingInstance::demo();
        if let Some(groups) = args.groups {
            demo.group_count = groups;
        }
        demo
    } else if let Some(count) = args.random {
        let groups = args.groups.unwrap_or_else(|| (count / 4).max(1));
        GroupingInstance::random(count, args.divergent, args.convergent, groups, args.roster_seed)
    } else if let Some(path) = &args.roster {
        let groups = args.groups
            .ok_or_else(|| GaError::config("--groups is required with --roster"))?;
        println!("Loading roster from {:?}...", path);
        GroupingInstance::from_csv(path, groups)?
    } else {
        return Err(GaError::config("one of --roster, --demo or --random is required"));
    };

    let instance = instance
        .with_aggregate(args.aggregate.iter().copied())
        .with_separate(args.separate.iter().copied());

    let weights = match &args.weights {
        Some(path) => AttributeWeights::from_json_file(path)?,
        None => AttributeWeights::uniform(instance.divergent_len(), instance.convergent_len()),
    };

    Ok((instance, weights))
}

fn solve_instance(args: &RosterArgs, ga: &GaArgs, top: usize, output: Option<PathBuf>, verbose: bool) -> Result<()> {
    let (instance, weights) = load_instance(args)?;
    let config = ga.config();

    if verbose {
        println!("{}", instance.statistics());
    }

    let context = instance.context(&weights)?;
    let mut algorithm = GeneticAlgorithm::new(context, config.clone())?;

    println!(
        "Solving {} ({} members, {} groups) with population {} and {} offspring per generation...",
        instance.name,
        instance.members.len(),
        instance.group_count,
        config.population_size,
        algorithm.offspring_count()
    );

    let progress = ProgressBar::new(config.max_generations as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} gens  best {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let start = Instant::now();
    let best = algorithm.run_with(|stats| {
        progress.set_message(format!("{:.6}", stats.best_fitness));
        progress.inc(1);
    })?;
    progress.finish_and_clear();
    let elapsed = start.elapsed();

    let solutions = if top > 1 { algorithm.top_solutions(top)? } else { vec![best.clone()] };

    println!("\n========== Results ==========");
    println!("{}", best);
    println!("Total time: {:.4}s", elapsed.as_secs_f64());

    if top > 1 {
        println!("\nTop {} groupings in the final population:", solutions.len());
        for (rank, solution) in solutions.iter().enumerate() {
            println!("  #{}: fitness {:.6}  groups {:?}", rank + 1, solution.fitness, solution.groups);
        }
    }

    if verbose {
        let history = algorithm.history();
        if let (Some(first), Some(last)) = (history.first(), history.last()) {
            println!("\nGeneration {}: total {:.4}, mean {:.6}, std {:.6}",
                first.generation, first.total_fitness, first.mean_fitness, first.std_dev_fitness);
            println!("Generation {}: total {:.4}, mean {:.6}, std {:.6}",
                last.generation, last.total_fitness, last.mean_fitness, last.std_dev_fitness);
        }
    }

    if let Some(out_path) = output {
        let report = SolveOutput {
            instance: &instance.name,
            config: &config,
            weights: &weights,
            solutions: &solutions,
        };
        std::fs::write(&out_path, serde_json::to_string_pretty(&report)?)?;
        println!("\nSolution saved to {:?}", out_path);
    }

    Ok(())
}

fn run_benchmark(args: &RosterArgs, ga: &GaArgs, runs: usize, output: &Path, sequential: bool) -> Result<()> {
    let (instance, weights) = load_instance(args)?;

    std::fs::create_dir_all(output)?;

    let config = BenchmarkConfig {
        num_runs: runs,
        base_seed: ga.seed,
        parallel: !sequential,
        ga: ga.config(),
    };

    println!("Running {} seeds on {} ({} members, {} groups)...",
        runs, instance.name, instance.members.len(), instance.group_count);

    let mut benchmark = Benchmark::new(config);
    benchmark.run(&instance, &weights)?;

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}

fn analyze_instance(args: &RosterArgs, samples: usize, seed: u64) -> Result<()> {
    let (instance, weights) = load_instance(args)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let context = instance.context(&weights)?;
    let evaluator = FitnessEvaluator::new(&context);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let population = Population::random(&evaluator, samples.max(2), &mut rng)?;

    let values = population.fitness_values();
    let best = population.fittest().map(|g| g.fitness()).unwrap_or_default();
    let worst = values.iter().cloned().fold(f64::INFINITY, f64::min);

    println!("Random Grouping Baseline ({} samples):", values.len());
    println!("  Mean fitness: {:.6}", values.iter().mean());
    println!("  Std fitness: {:.6}", values.iter().std_dev());
    println!("  Best: {:.6}", best);
    println!("  Worst: {:.6}", worst);

    Ok(())
}
