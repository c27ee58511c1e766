//! Solution representation for the grouping problem.
//!
//! A [`Solution`] is the decoded form of a genome: the member ids of every
//! group, the fitness and its breakdown, and run metadata.

use crate::context::RunContext;
use crate::error::Result;
use crate::fitness::{FitnessBreakdown, FitnessEvaluator};
use crate::genetic::Genome;
use crate::member::MemberId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A grouping of the roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Member ids of every group, in layout order
    pub groups: Vec<Vec<MemberId>>,
    /// Fitness of the grouping (higher is better)
    pub fitness: f64,
    /// Terms the fitness is built from
    pub breakdown: FitnessBreakdown,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Generations the run lasted (if applicable)
    pub generations: Option<usize>,
    /// Seed of the run that produced it
    pub seed: Option<u64>,
}

impl Solution {
    /// Decode `genome` against `context`, recomputing its breakdown
    pub fn from_genome(context: &RunContext, genome: &Genome, algorithm: &str) -> Result<Self> {
        let breakdown = FitnessEvaluator::new(context).breakdown(genome.order())?;

        Ok(Solution {
            groups: genome.groups(context),
            fitness: breakdown.fitness,
            breakdown,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            generations: None,
            seed: None,
        })
    }

    /// Check that every roster member appears in exactly one group and the
    /// group sizes follow the context's layout
    pub fn is_complete(&self, context: &RunContext) -> bool {
        let layout = context.layout();
        if self.groups.len() != layout.group_count() {
            return false;
        }
        if self.groups.iter().enumerate().any(|(g, group)| group.len() != layout.group_size(g)) {
            return false;
        }

        let ids: HashSet<MemberId> = self.groups.iter().flatten().copied().collect();
        ids.len() == context.member_count()
            && context.members().iter().all(|m| ids.contains(&m.id))
    }

    /// Index of the group holding `member`
    pub fn group_of(&self, member: MemberId) -> Option<usize> {
        self.groups.iter().position(|group| group.contains(&member))
    }

    /// Whether `a` and `b` were placed in the same group
    pub fn shares_group(&self, a: MemberId, b: MemberId) -> bool {
        match (self.group_of(a), self.group_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(Vec::len).collect()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Fitness: {:.6}", self.fitness)?;
        writeln!(
            f,
            "  Cost: {:.4} (mix {:.4}, balance {:.4}, preference {:.1}, distribution {:.0})",
            self.breakdown.cost,
            self.breakdown.mix,
            self.breakdown.balance,
            self.breakdown.preference,
            self.breakdown.distribution
        )?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(generations) = self.generations {
            writeln!(f, "  Generations: {}", generations)?;
        }
        if let Some(seed) = self.seed {
            writeln!(f, "  Seed: {}", seed)?;
        }
        for (g, group) in self.groups.iter().enumerate() {
            writeln!(f, "  Group {}: {:?}", g + 1, group)?;
        }
        Ok(())
    }
}
